use thiserror::Error;

/// Failures surfaced by the OS-facing components.
///
/// None of these are fatal to the detection loop: the worker logs them and
/// moves on to the next tick.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no monitors found")]
    NoMonitorsFound,

    #[error("monitor {0} not found")]
    MonitorNotFound(u32),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("window enumeration failed: {0}")]
    WindowEnumeration(String),

    #[error("focus step `{step}` failed: {reason}")]
    FocusStep { step: &'static str, reason: String },

    #[error("input injection failed: {0}")]
    Input(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn focus_step(step: &'static str, reason: impl ToString) -> Self {
        Error::FocusStep {
            step,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
