//! # Operation Dispatcher
//!
//! One logical request, attempted against several candidate endpoints in
//! sequence. Every attempt races the session call against a fixed deadline;
//! slow providers are skipped without penalty, broken ones optionally get
//! their error counter bumped, and the first success wins. Running out of
//! candidates is an ordinary outcome, not an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::is_timeout_error;
use crate::pool::{ClientHandle, ClientPool, Role};
use crate::session::LedgerSession;
use crate::utils::with_timeout;

/// If a call takes longer, we will try with another provider.
pub const OPERATION_TIMEOUT_MS: u64 = 2100;

/// Default cap on candidates tried per dispatch.
pub const DEFAULT_RETRY_LIMIT: usize = 5;

/// Per-dispatch options.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Diagnostic label carried into timeout errors and log lines.
    pub label: String,
    pub role: Role,
    /// Explicit allow-list of endpoint names; empty allows all.
    pub allow: Vec<String>,
    /// Upper bound on candidates tried.
    pub retry_limit: usize,
    /// Treat non-timeout failures as health-affecting.
    pub count_failures: bool,
    /// Fold successful call duration into the handle's latency average.
    pub record_latency: bool,
}

impl DispatchOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            role: Role::Generic,
            allow: Vec::new(),
            retry_limit: DEFAULT_RETRY_LIMIT,
            count_failures: false,
            record_latency: false,
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn allow(mut self, names: Vec<String>) -> Self {
        self.allow = names;
        self
    }

    pub fn retry_limit(mut self, limit: usize) -> Self {
        self.retry_limit = limit;
        self
    }

    pub fn count_failures(mut self, enabled: bool) -> Self {
        self.count_failures = enabled;
        self
    }

    pub fn record_latency(mut self, enabled: bool) -> Self {
        self.record_latency = enabled;
        self
    }
}

/// Explicit two-variant dispatch outcome. Callers must handle absence;
/// `Exhausted` means "try later", never "crash".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched<T> {
    Found(T),
    Exhausted,
}

impl<T> Dispatched<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Dispatched::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Dispatched::Found(value) => Some(value),
            Dispatched::Exhausted => None,
        }
    }
}

impl<T> From<Dispatched<T>> for Option<T> {
    fn from(outcome: Dispatched<T>) -> Self {
        outcome.into_option()
    }
}

/// Tries candidates from an injected pool in snapshot order.
#[derive(Debug)]
pub struct Dispatcher<S> {
    pool: Arc<ClientPool<S>>,
    timeout_ms: u64,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            timeout_ms: self.timeout_ms,
        }
    }
}

impl<S: LedgerSession> Dispatcher<S> {
    pub fn new(pool: Arc<ClientPool<S>>) -> Self {
        Self {
            pool,
            timeout_ms: OPERATION_TIMEOUT_MS,
        }
    }

    /// Overrides the per-attempt deadline (tests use short ones).
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn pool(&self) -> &Arc<ClientPool<S>> {
        &self.pool
    }

    /// Runs `operation` against up to `retry_limit` candidates and returns
    /// the first success.
    ///
    /// The candidate order is snapshotted at call start and not
    /// re-randomized mid-flight. A timed-out attempt is transient and
    /// non-punitive; any other failure optionally counts against the
    /// candidate's health.
    pub async fn dispatch<T, F, Fut>(&self, options: &DispatchOptions, operation: F) -> Dispatched<T>
    where
        F: Fn(Arc<ClientHandle<S>>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let candidates = self.pool.pool_filtered(options.role, &options.allow);
        let count = options.retry_limit.min(candidates.len());

        for (attempt, handle) in candidates.into_iter().take(count).enumerate() {
            let label = format!("{}: {}", options.label, handle.name());
            let start = Instant::now();

            match with_timeout(operation(Arc::clone(&handle)), self.timeout_ms, &label).await {
                Ok(result) => {
                    if options.record_latency {
                        self.pool
                            .report_latency(&handle, start.elapsed().as_millis() as u64);
                    }
                    return Dispatched::Found(result);
                }
                Err(e) if is_timeout_error(&e) => {
                    // slow, not broken: skip without penalty
                    debug!("{} timed out, trying next candidate", label);
                }
                Err(e) => {
                    if options.count_failures {
                        self.pool.report_error(&handle);
                        warn!(
                            "client operation error {} {}: {}, {}",
                            options.label,
                            handle.name(),
                            handle.errors(),
                            e
                        );
                    }
                    if attempt == count - 1 {
                        debug!("{}: all {} candidates returned error, last: {}", options.label, count, e);
                    }
                }
            }
        }

        Dispatched::Exhausted
    }
}
