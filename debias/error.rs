use thiserror::Error;

/// Failures raised by the sorter and the debiasing strategies.
///
/// Every variant is fatal for the stage that produced it. Conditions that only deserve a
/// warning (identity permutation, zero chunk median) go to the diagnostics sink instead.
#[derive(Error, Debug)]
pub enum DebiasError {
    #[error("unsort was called without a preceding sort; no permutation is available")]
    UnsortWithoutSort,

    #[error("this strategy expects covariate-sorted rows; call sort before debias")]
    NotSorted,

    #[error("covariate has {covariate} values but the matrix has {rows} rows")]
    CovariateLength { covariate: usize, rows: usize },

    #[error("stored permutation covers {expected} rows but the matrix has {found} rows")]
    RowCountMismatch { expected: usize, found: usize },

    #[error("moving-median window must be at least 1 row")]
    EmptyWindow,

    #[error("moving-median window must be between 1 and the row count ({rows}), but was {window}")]
    InvalidWindow { window: usize, rows: usize },

    #[error("score window must be a positive, finite covariate span, but was {0}")]
    InvalidScoreWindow(f64),

    #[error("minimum variance percentage must be finite and non-negative, but was {0}")]
    InvalidMinVariancePct(f64),

    #[error("SVD factorization failed: {0}")]
    Factorization(#[from] ndarray_linalg::error::LinalgError),

    #[error("SVD factorization returned no singular vectors")]
    MissingSingularVectors,
}
