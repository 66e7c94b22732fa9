use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::DebiasError;
use ndarray::{Array2, ArrayView1};
use ndarray_linalg::{JobSvd, SVDDC};

/// No more than this many leading components are ever removed.
pub const MAX_REMOVED_COMPONENTS: usize = 15;

pub fn validate_min_variance_pct(min_variance_pct: f64) -> Result<(), DebiasError> {
    if !min_variance_pct.is_finite() || min_variance_pct < 0.0 {
        return Err(DebiasError::InvalidMinVariancePct(min_variance_pct));
    }
    Ok(())
}

/// Each singular value as a percentage of the summed singular values.
pub fn variance_percentages(singular_values: ArrayView1<'_, f64>) -> Vec<f64> {
    let total = singular_values.sum();
    singular_values
        .iter()
        .map(|&value| 100.0 * value / total)
        .collect()
}

/// Number of leading components whose share exceeds `min_variance_pct`, capped at
/// [`MAX_REMOVED_COMPONENTS`]. Counting stops at the first component that falls short.
pub fn leading_component_count(percentages: &[f64], min_variance_pct: f64) -> usize {
    percentages
        .iter()
        .take(MAX_REMOVED_COMPONENTS)
        .take_while(|&&pct| pct > min_variance_pct)
        .count()
}

/// Removes the dominant spectral components of `matrix` in place and returns how many were
/// removed.
///
/// The matrix is factorized with a thin SVD; leading singular values whose variance share
/// exceeds `min_variance_pct` are set to zero and the matrix is rebuilt from the remaining
/// ones. The removed shares are reported to `sink`.
pub fn truncate_leading_variance<D: DiagnosticSink + ?Sized>(
    matrix: &mut Array2<f64>,
    min_variance_pct: f64,
    sink: &mut D,
) -> Result<usize, DebiasError> {
    validate_min_variance_pct(min_variance_pct)?;
    if matrix.is_empty() {
        return Ok(0);
    }

    let (u, singular_values, vt) = matrix.svddc(JobSvd::Some)?;
    let (Some(u), Some(vt)) = (u, vt) else {
        return Err(DebiasError::MissingSingularVectors);
    };

    let percentages = variance_percentages(singular_values.view());
    let removed = leading_component_count(&percentages, min_variance_pct);
    sink.on_event(DiagnosticEvent::VarianceRemoved {
        percentages: percentages[..removed].to_vec(),
    });

    let mut kept = singular_values;
    kept.iter_mut().take(removed).for_each(|value| *value = 0.0);

    let scaled = &u * &kept;
    matrix.assign(&scaled.dot(&vt));
    log::debug!(
        "removed {removed} of {} spectral components",
        percentages.len()
    );
    Ok(removed)
}
