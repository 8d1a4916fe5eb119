//! ull-relay - low-latency relay for live segmented media
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod error;
pub mod server;
pub mod streaming;
pub mod transcoder;

pub use error::{Error, Result};
