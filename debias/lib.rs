#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
//! Removal of covariate-correlated bias from depth matrices.
//!
//! Rows are genomic positions (or bins), columns are samples, and values are assumed to be
//! scaled already. A [`Debiaser`] sorts rows by an external covariate such as GC content,
//! applies one [`DebiasStrategy`], and restores the original row order.

pub mod chunk;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod moving_median;
pub mod scratch;
pub mod sorter;
pub mod spectral;
pub mod strategy;
pub mod window;

pub use config::{ConfigError, DebiasConfig};
pub use diagnostics::{
    CollectingDiagnostics, DiagnosticEvent, DiagnosticSink, LogDiagnostics, NoopDiagnostics,
};
pub use error::DebiasError;
pub use sorter::CovariateSorter;
pub use strategy::{Debias, DebiasStrategy, Debiaser, Sortable};
