use ndarray::Array2;

/// Reusable row-permutation buffer owned by a single sorter.
///
/// The buffer is allocated on first use and kept for as long as callers keep asking for the
/// same shape. A request with different dimensions drops the old allocation.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    buffer: Option<Array2<f64>>,
    allocations: usize,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the cached buffer already has shape `rows x cols`.
    pub fn matches(&self, rows: usize, cols: usize) -> bool {
        self.buffer
            .as_ref()
            .is_some_and(|buffer| buffer.dim() == (rows, cols))
    }

    /// Hands out a buffer of shape `rows x cols`, reallocating only on a shape mismatch.
    /// Contents are whatever the previous user left behind.
    pub fn ensure(&mut self, rows: usize, cols: usize) -> &mut Array2<f64> {
        if !self.matches(rows, cols) {
            self.buffer = None;
        }
        let allocations = &mut self.allocations;
        self.buffer.get_or_insert_with(|| {
            *allocations += 1;
            Array2::zeros((rows, cols))
        })
    }

    /// Number of times the buffer has been (re)allocated.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn dim(&self) -> Option<(usize, usize)> {
        self.buffer.as_ref().map(Array2::dim)
    }
}
