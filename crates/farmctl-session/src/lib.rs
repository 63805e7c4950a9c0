//! Session lifecycle and snapshot storage for the farm agent.
//!
//! Provides:
//! - `SessionController` - Start/stop the single agent session
//! - Storage implementations (memory, JSON files)

pub mod controller;
pub mod storage;

pub use controller::{ControllerError, SessionController};
