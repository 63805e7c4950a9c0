//! Wire protocol for the control surface.

use farmctl_core::{ConfigError, SessionSnapshot, StatsRecord, StorageError};
use farmctl_login::{AdvanceError, LoginError, LoginStatus};
use farmctl_session::ControllerError;
use serde::{Deserialize, Serialize};

/// Uniform response envelope.
///
/// `{"success": true, "data": ...}` or
/// `{"success": false, "code": ..., "error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            code: None,
            error: None,
        }
    }

    #[must_use]
    pub fn err(error: &ApiError) -> Self {
        Self {
            success: false,
            data: None,
            code: Some(error.code),
            error: Some(error.message.clone()),
        }
    }
}

/// Machine-readable failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    AlreadyRunning,
    NotRunning,
    ConnectionFailed,
    IssuanceError,
    PollError,
    ExchangeError,
    PersistenceError,
    ValidationError,
    NotFound,
    Internal,
}

/// Failure returned by a control-plane operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }
}

impl From<ControllerError> for ApiError {
    fn from(e: ControllerError) -> Self {
        let code = match &e {
            ControllerError::AlreadyRunning => ErrorCode::AlreadyRunning,
            ControllerError::NotRunning => ErrorCode::NotRunning,
            ControllerError::ConnectionFailed(_) => ErrorCode::ConnectionFailed,
            ControllerError::UnknownLoop(_) => ErrorCode::NotFound,
            ControllerError::LoopFailed { .. } => ErrorCode::Internal,
        };
        Self::new(code, e.to_string())
    }
}

impl From<LoginError> for ApiError {
    fn from(e: LoginError) -> Self {
        let code = match &e {
            LoginError::Issuance(_) => ErrorCode::IssuanceError,
            LoginError::Poll(_) => ErrorCode::PollError,
            LoginError::Exchange(_) => ErrorCode::ExchangeError,
        };
        Self::new(code, e.to_string())
    }
}

impl From<AdvanceError<ControllerError>> for ApiError {
    fn from(e: AdvanceError<ControllerError>) -> Self {
        match e {
            AdvanceError::Login(e) => e.into(),
            AdvanceError::Completion(e) => e.into(),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        Self::validation(e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self::new(ErrorCode::PersistenceError, e.to_string())
    }
}

/// Body of `POST session/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub credential: String,
    #[serde(default = "default_platform")]
    pub platform: String,
}

fn default_platform() -> String {
    "qq".to_string()
}

/// Body of a `POST session/stop` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResponse {
    /// False if no session was running.
    pub stopped: bool,
}

/// Body of a `GET login/status/{code}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginStatusResponse {
    pub status: LoginStatus,
    pub message: String,
}

impl From<LoginStatus> for LoginStatusResponse {
    fn from(status: LoginStatus) -> Self {
        Self {
            status,
            message: status.message().to_string(),
        }
    }
}

/// Body of a `GET stats` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StatsRecord,
    /// Last persisted session identity, if any.
    pub user: Option<SessionSnapshot>,
}

/// Query of `GET logs`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}
