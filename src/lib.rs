//! # Ledger Mux - Multi-Provider Ledger Access
//!
//! This crate presents one logical ledger session backed by many redundant
//! JSON-RPC providers. Queries fail over across a randomized candidate
//! pool with per-endpoint health tracking; push subscriptions fan out to
//! every websocket-capable provider and merge into one de-duplicated,
//! enriched stream.
//!
//! ## Modules
//!
//! - [`config`] - Endpoint configuration structures and loading
//! - [`dedup`] - Bounded FIFO duplicate suppression for push events
//! - [`dispatch`] - Per-operation failover dispatcher
//! - [`error`] - Typed error handling with thiserror
//! - [`mux`] - The `LedgerMux` library surface
//! - [`pool`] - Per-endpoint handles with health state and cooldowns
//! - [`session`] - The `LedgerSession` capability trait for wire clients
//! - [`subscribe`] - Push subscription multiplexing
//! - [`units`] - Precise token amount scaling
//! - `utils` - Timeout guard, retry helper, bounded-concurrency map, logger

// Module declarations - internal modules marked pub(crate)
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod error;
pub mod mux;
pub mod pool;
pub mod session;
pub mod subscribe;
pub mod units;
pub(crate) mod utils;

// Selective exports - only public API types
pub use config::{load_endpoints, parse_endpoints, EndpointConfig, EndpointRoles};
pub use dedup::{DedupBuffer, DedupRecord, DEDUP_CAPACITY};
pub use dispatch::{
    DispatchOptions, Dispatched, Dispatcher, DEFAULT_RETRY_LIMIT, OPERATION_TIMEOUT_MS,
};
pub use error::{is_timeout_error, ConfigError, MuxError, NetworkError};
pub use mux::LedgerMux;
pub use pool::{ClientHandle, ClientPool, PoolConfig, Role, CLIENT_COOLDOWN, MAX_CLIENT_ERRORS};
pub use session::{EventClass, LedgerSession, PushEvent};
pub use subscribe::{Multiplexer, SubscriptionHandle};
pub use units::{from_base_units, to_base_units};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{pmap, setup_logger, with_retry, with_retry_notify, with_timeout, RetryOptions};
