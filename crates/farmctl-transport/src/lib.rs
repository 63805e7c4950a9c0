//! Control surface and live event channel for the farm agent.
//!
//! Provides:
//! - Wire protocol (uniform JSON envelope, error taxonomy)
//! - `ControlPlane` - Transport-agnostic control operations
//! - HTTP + SSE binding (feature: http)
//! - Reconnecting observer client (feature: observer)

pub mod app;
pub mod observer;
pub mod protocol;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub mod sse;

pub use app::ControlPlane;
pub use protocol::{ApiError, ApiResponse, ErrorCode};

#[cfg(feature = "http")]
pub use http::router;
