//! Storage implementations.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "json-file")]
pub mod json_file;

#[cfg(feature = "memory")]
pub use memory::MemoryStorage;

#[cfg(feature = "json-file")]
pub use json_file::JsonFileStorage;
