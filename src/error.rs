//! # Core Error Types
//!
//! Centralized error definitions for the ledger-mux crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for ledger-mux operations.
///
/// This enum wraps all specific error types and provides a unified
/// error interface for the application layer.
#[derive(Error, Debug)]
pub enum MuxError {
    #[error(transparent)]
    Config(ConfigError),

    #[error(transparent)]
    Network(NetworkError),

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl From<ConfigError> for MuxError {
    fn from(e: ConfigError) -> Self {
        MuxError::Config(e)
    }
}

impl From<NetworkError> for MuxError {
    fn from(e: NetworkError) -> Self {
        MuxError::Network(e)
    }
}

/// Configuration-related errors.
///
/// These are fatal: a caller that hits one of these has a broken setup
/// or an unresolvable precondition, and retrying will not help.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid RPC URL format: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Can't resolve decimals for token {address}")]
    UnresolvableDecimals { address: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Network and RPC-related errors.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("{label}: timed out after {timeout_ms} ms")]
    Timeout { label: String, timeout_ms: u64 },

    #[error("Push subscription to {endpoint} closed: {reason}")]
    SubscriptionClosed { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

impl NetworkError {
    /// True when the error is a single-attempt deadline miss.
    ///
    /// Timeouts are transient and non-punitive: the dispatcher moves on to
    /// the next candidate without touching the handle's error counter.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout { .. })
    }
}

/// Checks an opaque error chain for the distinguished timeout failure.
pub fn is_timeout_error(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<NetworkError>()
        .map(NetworkError::is_timeout)
        .unwrap_or(false)
}
