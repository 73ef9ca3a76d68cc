use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Unauthorized caller {caller}: {reason}")]
    UnauthorizedCaller { caller: String, reason: String },

    #[error("Invalid fee setting: {0}")]
    InvalidSetting(String),

    #[error("Fund not registered: {0}")]
    UnknownFund(String),

    #[error("Fund already configured: {0}")]
    AlreadyConfigured(String),

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Collaborator error: {source_name}: {message}")]
    Collaborator { source_name: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl FeeError {
    pub(crate) fn only_fee_manager(caller: &str) -> Self {
        FeeError::UnauthorizedCaller {
            caller: caller.to_string(),
            reason: "Only the FeeManager can make this call".into(),
        }
    }
}

impl From<serde_json::Error> for FeeError {
    fn from(e: serde_json::Error) -> Self {
        FeeError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for FeeError {
    fn from(e: std::io::Error) -> Self {
        FeeError::Io(e.to_string())
    }
}
