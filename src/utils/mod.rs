//! # Utilities Module
//!
//! Internal utility modules for the ledger-mux crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

// Internal modules - not part of public API
pub(crate) mod logger;
pub(crate) mod pmap;
pub(crate) mod retry;
pub(crate) mod timeout;

// Selective exports - only public utilities
pub use logger::setup_logger;
pub use pmap::pmap;
pub use retry::{with_retry, with_retry_notify, RetryOptions};
pub use timeout::with_timeout;
