//! Remote login handshake for the farm agent.
//!
//! Provides:
//! - `LoginBackend` - Remote code issuance, status and exchange endpoints
//! - `LoginFlow` - Monotonic per-code login state machine
//! - `HttpLoginBackend` - JSON/HTTP backend (feature: http)

pub mod backend;
pub mod flow;

#[cfg(feature = "http")]
pub mod http;

pub use backend::{LoginBackend, LoginCode, LoginError, LoginStatus, StatusReport};
pub use flow::{AdvanceError, LoginAttempt, LoginFlow, Poll};

#[cfg(feature = "http")]
pub use http::HttpLoginBackend;
