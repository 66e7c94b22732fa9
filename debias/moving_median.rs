use crate::error::DebiasError;
use crate::window::MovingMedian;
use ndarray::{Array2, ArrayViewMut1};

/// Offset from a row to the far edge of its centred window.
pub fn half_span(window: usize) -> usize {
    (window - 1) / 2 + 1
}

pub fn validate_window(window: usize, rows: usize) -> Result<(), DebiasError> {
    if window == 0 {
        return Err(DebiasError::EmptyWindow);
    }
    if window > rows {
        return Err(DebiasError::InvalidWindow { window, rows });
    }
    Ok(())
}

/// Subtracts a running median from every column of a covariate-sorted matrix.
///
/// The first `mid = (window - 1) / 2 + 1` rows are corrected against a window that grows one
/// value at a time. Row `i` in `mid..rows - mid` is then corrected after pushing the value
/// `mid` rows ahead. The last rows reuse the final median without advancing the window.
pub fn subtract_moving_median(matrix: &mut Array2<f64>, window: usize) -> Result<(), DebiasError> {
    let rows = matrix.nrows();
    validate_window(window, rows)?;
    for column in matrix.columns_mut() {
        detrend_column(column, window);
    }
    log::debug!(
        "subtracted moving median (window {window}) from {} columns",
        matrix.ncols()
    );
    Ok(())
}

fn detrend_column(mut column: ArrayViewMut1<'_, f64>, window: usize) {
    let rows = column.len();
    let mid = half_span(window);
    let mut medians = MovingMedian::new(window);
    let mut median = 0.0;

    for row in 0..mid {
        medians.push(column[row]);
        median = medians.median().unwrap_or(median);
        column[row] -= median;
    }

    let mut row = mid;
    while row + mid < rows {
        medians.push(column[row + mid]);
        median = medians.median().unwrap_or(median);
        column[row] -= median;
        row += 1;
    }

    for value in column.iter_mut().skip(row) {
        *value -= median;
    }
}
