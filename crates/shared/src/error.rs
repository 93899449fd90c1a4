use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    DeviceAccess,
    CapabilityUnsupported,
    InvalidCredentials,
    Storage,
    Internal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{0}")]
    DeviceAccess(String),
    #[error("capability unsupported: {0}")]
    CapabilityUnsupported(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Validation(_) => ErrorCode::Validation,
            CoreError::NotFound { .. } => ErrorCode::NotFound,
            CoreError::DeviceAccess(_) => ErrorCode::DeviceAccess,
            CoreError::CapabilityUnsupported(_) => ErrorCode::CapabilityUnsupported,
            CoreError::InvalidCredentials => ErrorCode::InvalidCredentials,
            CoreError::Storage(_) => ErrorCode::Storage,
            CoreError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Serializable form of a [`CoreError`] handed to presentation code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorNotice {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&CoreError> for ErrorNotice {
    fn from(value: &CoreError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<CoreError> for ErrorNotice {
    fn from(value: CoreError) -> Self {
        Self::from(&value)
    }
}
