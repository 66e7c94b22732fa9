use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::DebiasError;
use ndarray::Array2;
use std::ops::Range;

pub fn validate_score_window(score_window: f64) -> Result<(), DebiasError> {
    if !score_window.is_finite() || score_window <= 0.0 {
        return Err(DebiasError::InvalidScoreWindow(score_window));
    }
    Ok(())
}

/// Splits a sorted covariate into contiguous chunks.
///
/// A chunk starts at row 0 and at every row whose covariate exceeds the current chunk's first
/// covariate by more than `score_window`. An empty covariate yields no chunks.
pub fn chunk_ranges(
    covariate: &[f64],
    score_window: f64,
) -> Result<Vec<Range<usize>>, DebiasError> {
    validate_score_window(score_window)?;
    let Some(&first) = covariate.first() else {
        return Ok(Vec::new());
    };

    let mut ranges = Vec::new();
    let mut start = 0;
    let mut reference = first;
    for (row, &value) in covariate.iter().enumerate() {
        if value - reference > score_window {
            ranges.push(start..row);
            start = row;
            reference = value;
        }
    }
    ranges.push(start..covariate.len());
    Ok(ranges)
}

/// Element at index `len / 2` of the sorted values; even-length input is not averaged.
/// Sorts `values` in place.
pub fn chunk_median(values: &mut Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(values[values.len() / 2])
}

/// Divides each chunk of every column by that chunk's median.
///
/// Rows must already be sorted by `covariate`. A zero median is reported to `sink` and the
/// division still happens.
pub fn normalize_by_chunk_median<D: DiagnosticSink + ?Sized>(
    matrix: &mut Array2<f64>,
    covariate: &[f64],
    score_window: f64,
    sink: &mut D,
) -> Result<(), DebiasError> {
    let rows = matrix.nrows();
    if covariate.len() != rows {
        return Err(DebiasError::CovariateLength {
            covariate: covariate.len(),
            rows,
        });
    }
    let ranges = chunk_ranges(covariate, score_window)?;
    log::debug!(
        "normalizing {} columns over {} covariate chunks (score window {score_window})",
        matrix.ncols(),
        ranges.len()
    );

    let mut subset = Vec::with_capacity(rows);
    for (column_index, mut column) in matrix.columns_mut().into_iter().enumerate() {
        for range in &ranges {
            subset.clear();
            subset.extend(column.iter().skip(range.start).take(range.len()).copied());
            let Some(median) = chunk_median(&mut subset) else {
                continue;
            };
            if median == 0.0 {
                sink.on_event(DiagnosticEvent::ZeroChunkMedian {
                    column: column_index,
                    start: range.start,
                    end: range.end,
                });
            }
            for row in range.clone() {
                column[row] /= median;
            }
        }
    }
    Ok(())
}
