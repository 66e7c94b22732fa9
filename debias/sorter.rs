//! Reversible row permutation driven by a per-row covariate.
//!
//! `sort` reorders matrix rows (and the covariate) by ascending covariate value and remembers
//! the permutation; `unsort` consumes it and puts everything back. The permutation maps
//! sorted position to original position: after `sort`, row `i` of the matrix is the row that
//! used to live at `permutation[i]`.

use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::DebiasError;
use crate::scratch::ScratchBuffer;
use ndarray::Array2;

/// Stable ascending argsort. Ties keep their original relative order and NaN sorts last.
pub fn stable_argsort(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}

pub fn is_identity(permutation: &[usize]) -> bool {
    permutation
        .iter()
        .enumerate()
        .all(|(position, &source)| position == source)
}

/// Holds the covariate, the pending permutation and the scratch buffer used to move rows.
///
/// A sorter is tied to one matrix between `sort` and `unsort`; it is not meant to be shared.
#[derive(Debug, Default)]
pub struct CovariateSorter {
    covariate: Vec<f64>,
    permutation: Option<Vec<usize>>,
    scratch: ScratchBuffer,
}

impl CovariateSorter {
    pub fn new(covariate: Vec<f64>) -> Self {
        Self {
            covariate,
            permutation: None,
            scratch: ScratchBuffer::new(),
        }
    }

    /// Current covariate, in sorted order while a permutation is pending.
    pub fn covariate(&self) -> &[f64] {
        &self.covariate
    }

    /// Installs a covariate for the next matrix. Any pending permutation is dropped.
    pub fn set_covariate(&mut self, covariate: Vec<f64>) {
        self.covariate = covariate;
        self.permutation = None;
    }

    pub fn permutation(&self) -> Option<&[usize]> {
        self.permutation.as_deref()
    }

    pub fn is_sorted(&self) -> bool {
        self.permutation.is_some()
    }

    pub fn scratch(&self) -> &ScratchBuffer {
        &self.scratch
    }

    pub fn sort<D: DiagnosticSink + ?Sized>(
        &mut self,
        matrix: &mut Array2<f64>,
        sink: &mut D,
    ) -> Result<(), DebiasError> {
        let (rows, cols) = matrix.dim();
        if self.covariate.len() != rows {
            return Err(DebiasError::CovariateLength {
                covariate: self.covariate.len(),
                rows,
            });
        }

        let order = stable_argsort(&self.covariate);
        if is_identity(&order) {
            sink.on_event(DiagnosticEvent::IdentityPermutation { rows });
        }

        let scratch = self.scratch.ensure(rows, cols);
        for (position, &source) in order.iter().enumerate() {
            scratch.row_mut(position).assign(&matrix.row(source));
        }
        matrix.assign(scratch);

        self.covariate = order.iter().map(|&source| self.covariate[source]).collect();

        // A second sort before unsort composes with the first so unsort still reaches the
        // original order.
        let composed = match self.permutation.take() {
            Some(previous) => order.iter().map(|&source| previous[source]).collect(),
            None => order,
        };
        log::debug!("sorted {rows} rows by covariate across {cols} columns");
        self.permutation = Some(composed);
        Ok(())
    }

    pub fn unsort(&mut self, matrix: &mut Array2<f64>) -> Result<(), DebiasError> {
        let permutation = self
            .permutation
            .take()
            .ok_or(DebiasError::UnsortWithoutSort)?;
        let (rows, cols) = matrix.dim();
        if permutation.len() != rows {
            let expected = permutation.len();
            self.permutation = Some(permutation);
            return Err(DebiasError::RowCountMismatch {
                expected,
                found: rows,
            });
        }

        let scratch = self.scratch.ensure(rows, cols);
        scratch.assign(matrix);
        let mut restored = vec![0.0; rows];
        for (position, &original) in permutation.iter().enumerate() {
            matrix.row_mut(original).assign(&scratch.row(position));
            restored[original] = self.covariate[position];
        }
        self.covariate = restored;
        log::debug!("restored original order of {rows} rows");
        Ok(())
    }
}
