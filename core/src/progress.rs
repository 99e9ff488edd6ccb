use std::fmt;
use std::sync::Arc;

/// The measurement phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Latency,
    Download,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Latency => f.write_str("latency"),
            Phase::Download => f.write_str("download"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { phase: Phase, total: usize },
    Advanced { phase: Phase },
    Finished { phase: Phase },
}

/// Callback invoked from worker tasks as candidates complete.
pub type Progress = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

pub(crate) fn report(progress: &Option<Progress>, event: ProgressEvent) {
    if let Some(cb) = progress {
        cb(event);
    }
}
