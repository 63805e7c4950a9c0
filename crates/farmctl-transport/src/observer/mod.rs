//! Observer side of the live event channel.

pub mod policy;

#[cfg(feature = "observer")]
pub mod client;

pub use policy::{ConnectionState, MAX_RECONNECT_ATTEMPTS, ReconnectPolicy};

#[cfg(feature = "observer")]
pub use client::{ByteStream, ConnectError, Connector, GaveUp, HttpConnector, ObserverClient, decode_events};
