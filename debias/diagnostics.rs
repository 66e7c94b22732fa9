use std::fmt;

/// Non-fatal conditions observed while sorting or debiasing.
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticEvent {
    /// Sorting left every row in place, which usually means the covariate is unset or was
    /// already applied to this matrix.
    IdentityPermutation { rows: usize },
    /// A chunk median was zero, so the chunk's values became non-finite after division.
    ZeroChunkMedian {
        column: usize,
        start: usize,
        end: usize,
    },
    /// Variance shares (percent) of the spectral components that were zeroed, in order.
    VarianceRemoved { percentages: Vec<f64> },
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityPermutation { rows } => write!(
                f,
                "no change after sorting {rows} rows; the covariate is probably unset or the same as the previous run"
            ),
            Self::ZeroChunkMedian { column, start, end } => write!(
                f,
                "column {column}: chunk [{start}, {end}) has a zero median; its values are no longer finite"
            ),
            Self::VarianceRemoved { percentages } => {
                f.write_str("variance:")?;
                for pct in percentages {
                    write!(f, " {pct:.2}")?;
                }
                Ok(())
            }
        }
    }
}

/// Receiver for diagnostics emitted by the sorter and the strategies.
///
/// Injected into [`crate::Debiaser`] so that nothing in the core writes to process-wide state
/// unless the caller asks for it.
pub trait DiagnosticSink {
    fn on_event(&mut self, event: DiagnosticEvent) {
        let _ = event;
    }
}

impl<D: DiagnosticSink + ?Sized> DiagnosticSink for &mut D {
    fn on_event(&mut self, event: DiagnosticEvent) {
        (**self).on_event(event);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDiagnostics;

impl DiagnosticSink for NoopDiagnostics {}

/// Forwards diagnostics to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl DiagnosticSink for LogDiagnostics {
    fn on_event(&mut self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::VarianceRemoved { .. } => log::info!("{event}"),
            DiagnosticEvent::IdentityPermutation { .. }
            | DiagnosticEvent::ZeroChunkMedian { .. } => log::warn!("{event}"),
        }
    }
}

/// Keeps every event in arrival order.
#[derive(Clone, Debug, Default)]
pub struct CollectingDiagnostics {
    pub events: Vec<DiagnosticEvent>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity_warnings(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, DiagnosticEvent::IdentityPermutation { .. }))
            .count()
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn on_event(&mut self, event: DiagnosticEvent) {
        self.events.push(event);
    }
}
