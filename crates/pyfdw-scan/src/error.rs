use pyfdw_common::error::CommonError;
use thiserror::Error;

pub type ScanResult<T> = Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("resolution error: {0}")]
    Resolution(String),
    #[error("marshalling error: missing key for column \"{0}\"")]
    MissingColumn(String),
    #[error("marshalling error: {0}")]
    Marshalling(String),
    #[error("iteration fault: {0}")]
    IterationFault(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ScanError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ScanError::Configuration(message.into())
    }

    /// A configuration error with a hint on how to fix it.
    pub fn configuration_with_hint(message: impl Into<String>, hint: impl AsRef<str>) -> Self {
        ScanError::Configuration(format!("{}\nHint: {}", message.into(), hint.as_ref()))
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        ScanError::Resolution(message.into())
    }

    pub fn marshalling(message: impl Into<String>) -> Self {
        ScanError::Marshalling(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ScanError::InvalidState(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ScanError::Internal(message.into())
    }

    pub fn is_marshalling(&self) -> bool {
        matches!(self, ScanError::MissingColumn(_) | ScanError::Marshalling(_))
    }
}
