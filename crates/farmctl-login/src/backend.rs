//! Remote login service interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a login code as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginStatus {
    /// Not scanned yet.
    Wait,
    /// Confirmed; a ticket is available.
    #[serde(rename = "OK")]
    Ok,
    /// The code expired or was already consumed.
    Used,
    /// The remote service reported a failure.
    Error,
}

impl LoginStatus {
    /// Whether polling can stop.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Wait)
    }

    /// Short user-facing description.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Wait => "Waiting for scan",
            Self::Ok => "Login succeeded",
            Self::Used => "Login code expired",
            Self::Error => "Login status query failed",
        }
    }
}

/// A freshly issued login code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCode {
    /// Opaque token identifying the attempt.
    pub code: String,
    /// Verification URL to show the user.
    pub url: String,
}

/// Result of one status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: LoginStatus,
    /// Present only when `status` is `OK`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
}

/// Login error.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Failed to issue login code: {0}")]
    Issuance(String),
    #[error("Failed to query login status: {0}")]
    Poll(String),
    #[error("Failed to exchange ticket: {0}")]
    Exchange(String),
}

/// Trait for the remote login service.
#[async_trait]
pub trait LoginBackend: Send + Sync {
    /// Issue a new login code.
    async fn request_code(&self) -> Result<LoginCode, LoginError>;

    /// Check the status of `code` once.
    async fn query_status(&self, code: &str) -> Result<StatusReport, LoginError>;

    /// Trade an `OK` ticket for the credential used to connect.
    async fn exchange(&self, ticket: &str) -> Result<String, LoginError>;
}
