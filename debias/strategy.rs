//! The debiasing capability: one strategy chosen at construction, plus the sort/unsort
//! bookkeeping the covariate-ordered strategies depend on.

use crate::chunk::{normalize_by_chunk_median, validate_score_window};
use crate::diagnostics::{DiagnosticSink, LogDiagnostics};
use crate::error::DebiasError;
use crate::moving_median::subtract_moving_median;
use crate::sorter::CovariateSorter;
use crate::spectral::{truncate_leading_variance, validate_min_variance_pct};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Removes bias from a matrix in place.
pub trait Debias {
    fn debias(&mut self, matrix: &mut Array2<f64>) -> Result<(), DebiasError>;
}

/// Reorders matrix rows by a covariate and puts them back.
pub trait Sortable {
    fn sort(&mut self, matrix: &mut Array2<f64>) -> Result<(), DebiasError>;
    fn unsort(&mut self, matrix: &mut Array2<f64>) -> Result<(), DebiasError>;
}

/// Which bias model to remove.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DebiasStrategy {
    /// Subtract a centred moving median of `window` rows from each sample.
    MovingMedian { window: usize },
    /// Divide each covariate chunk spanning at most `score_window` by its median.
    ChunkedRatio { score_window: f64 },
    /// Zero the leading SVD components whose variance share exceeds `min_variance_pct`.
    VarianceTruncation { min_variance_pct: f64 },
}

impl DebiasStrategy {
    /// `true` for strategies that read rows in covariate order.
    pub fn requires_sorting(&self) -> bool {
        match self {
            Self::MovingMedian { .. } | Self::ChunkedRatio { .. } => true,
            Self::VarianceTruncation { .. } => false,
        }
    }

    /// Checks the parameters that do not depend on the matrix. The moving-median window is
    /// checked against the row count when the strategy runs.
    pub fn validate(&self) -> Result<(), DebiasError> {
        match *self {
            Self::MovingMedian { window } => {
                if window == 0 {
                    return Err(DebiasError::EmptyWindow);
                }
                Ok(())
            }
            Self::ChunkedRatio { score_window } => validate_score_window(score_window),
            Self::VarianceTruncation { min_variance_pct } => {
                validate_min_variance_pct(min_variance_pct)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MovingMedian { .. } => "moving-median",
            Self::ChunkedRatio { .. } => "chunked-ratio",
            Self::VarianceTruncation { .. } => "variance-truncation",
        }
    }
}

impl fmt::Display for DebiasStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MovingMedian { window } => write!(f, "{} (window {window})", self.name()),
            Self::ChunkedRatio { score_window } => {
                write!(f, "{} (score window {score_window})", self.name())
            }
            Self::VarianceTruncation { min_variance_pct } => {
                write!(f, "{} (min variance {min_variance_pct}%)", self.name())
            }
        }
    }
}

/// A configured debiasing strategy together with its covariate and sort state.
///
/// Usage for covariate-ordered strategies is `sort`, `debias`, `unsort` on the same matrix, or
/// [`Debiaser::apply`] which does all three. The permutation stored by `sort` belongs to that
/// one matrix: an instance must not be shared between matrices or threads while a sort is
/// pending, and no internal locking is done.
#[derive(Debug)]
pub struct Debiaser<D: DiagnosticSink = LogDiagnostics> {
    strategy: DebiasStrategy,
    sorter: CovariateSorter,
    sink: D,
}

impl Debiaser<LogDiagnostics> {
    pub fn new(strategy: DebiasStrategy, covariate: Vec<f64>) -> Result<Self, DebiasError> {
        Self::with_sink(strategy, covariate, LogDiagnostics)
    }
}

impl<D: DiagnosticSink> Debiaser<D> {
    pub fn with_sink(
        strategy: DebiasStrategy,
        covariate: Vec<f64>,
        sink: D,
    ) -> Result<Self, DebiasError> {
        strategy.validate()?;
        Ok(Self {
            strategy,
            sorter: CovariateSorter::new(covariate),
            sink,
        })
    }

    pub fn strategy(&self) -> DebiasStrategy {
        self.strategy
    }

    pub fn covariate(&self) -> &[f64] {
        self.sorter.covariate()
    }

    /// Installs the covariate for the next matrix, discarding any pending sort.
    pub fn set_covariate(&mut self, covariate: Vec<f64>) {
        self.sorter.set_covariate(covariate);
    }

    pub fn permutation(&self) -> Option<&[usize]> {
        self.sorter.permutation()
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn into_sink(self) -> D {
        self.sink
    }

    /// Runs the whole pipeline: sort, debias and unsort when the strategy needs covariate
    /// order, debias alone otherwise. On error the matrix keeps its original row order.
    pub fn apply(&mut self, matrix: &mut Array2<f64>) -> Result<(), DebiasError> {
        log::info!(
            "debiasing {} x {} matrix with {}",
            matrix.nrows(),
            matrix.ncols(),
            self.strategy
        );
        if !self.strategy.requires_sorting() {
            return self.debias(matrix);
        }
        self.sort(matrix)?;
        if let Err(err) = self.debias(matrix) {
            // Leave the caller's rows in their original order on failure.
            self.unsort(matrix)?;
            return Err(err);
        }
        self.unsort(matrix)
    }
}

impl<D: DiagnosticSink> Sortable for Debiaser<D> {
    fn sort(&mut self, matrix: &mut Array2<f64>) -> Result<(), DebiasError> {
        self.sorter.sort(matrix, &mut self.sink)
    }

    fn unsort(&mut self, matrix: &mut Array2<f64>) -> Result<(), DebiasError> {
        self.sorter.unsort(matrix)
    }
}

impl<D: DiagnosticSink> Debias for Debiaser<D> {
    fn debias(&mut self, matrix: &mut Array2<f64>) -> Result<(), DebiasError> {
        if self.strategy.requires_sorting() && !self.sorter.is_sorted() {
            return Err(DebiasError::NotSorted);
        }
        match self.strategy {
            DebiasStrategy::MovingMedian { window } => subtract_moving_median(matrix, window),
            DebiasStrategy::ChunkedRatio { score_window } => normalize_by_chunk_median(
                matrix,
                self.sorter.covariate(),
                score_window,
                &mut self.sink,
            ),
            DebiasStrategy::VarianceTruncation { min_variance_pct } => {
                truncate_leading_variance(matrix, min_variance_pct, &mut self.sink).map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingDiagnostics, DiagnosticEvent, NoopDiagnostics};
    use ndarray::array;

    #[test]
    fn only_spectral_strategy_skips_sorting() {
        assert!(DebiasStrategy::MovingMedian { window: 3 }.requires_sorting());
        assert!(DebiasStrategy::ChunkedRatio { score_window: 0.1 }.requires_sorting());
        assert!(
            !DebiasStrategy::VarianceTruncation {
                min_variance_pct: 5.0
            }
            .requires_sorting()
        );
    }

    #[test]
    fn construction_rejects_unset_parameters() {
        assert!(matches!(
            Debiaser::new(DebiasStrategy::ChunkedRatio { score_window: 0.0 }, vec![]),
            Err(DebiasError::InvalidScoreWindow(_))
        ));
        assert!(matches!(
            Debiaser::new(DebiasStrategy::MovingMedian { window: 0 }, vec![]),
            Err(DebiasError::EmptyWindow)
        ));
        assert!(matches!(
            Debiaser::new(
                DebiasStrategy::VarianceTruncation {
                    min_variance_pct: -2.0
                },
                vec![]
            ),
            Err(DebiasError::InvalidMinVariancePct(_))
        ));
    }

    #[test]
    fn sorted_strategies_refuse_unsorted_input() {
        let mut matrix = array![[1.0], [2.0], [3.0]];
        let mut debiaser = Debiaser::with_sink(
            DebiasStrategy::MovingMedian { window: 3 },
            vec![0.3, 0.2, 0.1],
            NoopDiagnostics,
        )
        .unwrap();
        assert!(matches!(
            debiaser.debias(&mut matrix),
            Err(DebiasError::NotSorted)
        ));
    }

    #[test]
    fn apply_runs_in_covariate_order_and_restores_rows() {
        // Rows listed out of covariate order; chunk [0.0, 0.05] holds rows 2 and 0.
        let mut matrix = array![[4.0], [10.0], [2.0], [30.0]];
        let covariate = vec![0.05, 0.5, 0.0, 0.55];
        let mut debiaser = Debiaser::with_sink(
            DebiasStrategy::ChunkedRatio { score_window: 0.1 },
            covariate.clone(),
            NoopDiagnostics,
        )
        .unwrap();

        debiaser.apply(&mut matrix).unwrap();

        // chunk medians: {2, 4} -> 4, {10, 30} -> 30.
        assert_eq!(matrix, array![[1.0], [10.0 / 30.0], [0.5], [1.0]]);
        assert_eq!(debiaser.covariate(), covariate.as_slice());
        assert!(debiaser.permutation().is_none());
    }

    #[test]
    fn manual_sort_debias_unsort_matches_apply() {
        let original = array![[1.0, 2.0], [4.0, 3.0], [2.0, 8.0], [7.0, 1.0], [5.0, 5.0]];
        let covariate = vec![0.9, 0.1, 0.5, 0.3, 0.7];
        let strategy = DebiasStrategy::MovingMedian { window: 3 };

        let mut applied = original.clone();
        Debiaser::with_sink(strategy, covariate.clone(), NoopDiagnostics)
            .unwrap()
            .apply(&mut applied)
            .unwrap();

        let mut manual = original.clone();
        let mut debiaser = Debiaser::with_sink(strategy, covariate, NoopDiagnostics).unwrap();
        debiaser.sort(&mut manual).unwrap();
        debiaser.debias(&mut manual).unwrap();
        debiaser.unsort(&mut manual).unwrap();

        assert_eq!(applied, manual);
    }

    #[test]
    fn spectral_strategy_reports_through_injected_sink() {
        let mut matrix = array![[10.0, 0.0], [0.0, 1.0], [0.0, 0.0]];
        let mut debiaser = Debiaser::with_sink(
            DebiasStrategy::VarianceTruncation {
                min_variance_pct: 50.0,
            },
            Vec::new(),
            CollectingDiagnostics::new(),
        )
        .unwrap();
        debiaser.apply(&mut matrix).unwrap();

        let sink = debiaser.into_sink();
        assert!(matches!(
            sink.events.as_slice(),
            [DiagnosticEvent::VarianceRemoved { percentages }] if percentages.len() == 1
        ));
    }

    #[test]
    fn identity_warning_reaches_sink() {
        let mut matrix = array![[1.0], [1.0], [1.0]];
        let mut debiaser = Debiaser::with_sink(
            DebiasStrategy::MovingMedian { window: 1 },
            vec![0.1, 0.2, 0.3],
            CollectingDiagnostics::new(),
        )
        .unwrap();
        debiaser.apply(&mut matrix).unwrap();
        assert_eq!(debiaser.sink().identity_warnings(), 1);
    }

    #[test]
    fn display_names_the_strategy() {
        assert_eq!(
            DebiasStrategy::MovingMedian { window: 5 }.to_string(),
            "moving-median (window 5)"
        );
        assert_eq!(
            DebiasStrategy::ChunkedRatio { score_window: 0.25 }.to_string(),
            "chunked-ratio (score window 0.25)"
        );
    }
}
