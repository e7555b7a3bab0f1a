use thiserror::Error;

/// Failures surfaced by the trial runner.
///
/// Decode problems are deliberately absent: they never abort a trial and
/// only show up as `img_decode_failed` in the emitted record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrialError {
    #[error("invalid trial parameters: {0}")]
    InvalidParameters(String),
    #[error("a trial is already running")]
    AlreadyRunning,
    #[error("key source closed while the trial was waiting for a key")]
    InputClosed,
}

impl TrialError {
    pub(crate) fn missing(name: &str) -> Self {
        TrialError::InvalidParameters(format!("missing required parameter: {name}"))
    }
}
