//! Core library for the access-point locator.
//! This crate defines the capability traits and data structures for talking
//! to the host's Wi-Fi stack, and provides per-platform backends
//! (NetworkManager on Linux, netsh on Windows) plus the TCP status client
//! used to query the embedded device once its network has been joined.

pub mod backends;
pub mod config;
pub mod device;
pub mod traits;

// Define a shared Error and Result type for the entire crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;
