//! # Client Pool Manager
//!
//! Owns one [`ClientHandle`] per configured endpoint and yields a
//! randomized, filtered candidate ordering per call. Health state lives in
//! atomics on the handle; a disabled handle is re-admitted lazily when its
//! cooldown deadline has passed, so no background timer is needed.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::config::{EndpointConfig, EndpointRoles};
use crate::error::ConfigError;
use crate::session::LedgerSession;

/// After a handle reaches this many counted errors, stop using it.
pub const MAX_CLIENT_ERRORS: u32 = 50;

/// Retry a disabled handle after a long time, maybe it works again.
pub const CLIENT_COOLDOWN: Duration = Duration::from_secs(60 * 60 * 2);

/// Which pool a dispatch draws candidates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Query-capable endpoints used for bulk reads.
    Generic,
    /// Endpoints reserved for transaction traffic.
    Transaction,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Generic => "generic",
            Role::Transaction => "transaction",
        }
    }
}

/// Pool tuning knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_errors: u32,
    pub cooldown: Duration,
    /// Shuffle candidate order per call. Disable to preserve configured
    /// endpoint order (deterministic selection).
    pub randomize: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_errors: MAX_CLIENT_ERRORS,
            cooldown: CLIENT_COOLDOWN,
            randomize: true,
        }
    }
}

/// Runtime wrapper around one endpoint's session plus its health state.
///
/// Created once at startup and `Arc`-shared for the process lifetime.
/// A handle cycles between Active and Disabled forever; there is no
/// terminal state.
#[derive(Debug)]
pub struct ClientHandle<S> {
    name: String,
    url: String,
    roles: EndpointRoles,
    session: S,
    errors: AtomicU32,
    latency_ms: AtomicU64,
    /// Epoch ms after which a disabled handle becomes eligible again;
    /// 0 means no re-enable is scheduled.
    disabled_until: AtomicU64,
}

impl<S> ClientHandle<S> {
    fn new(endpoint: &EndpointConfig, session: S) -> Self {
        Self {
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            roles: endpoint.roles.clone(),
            session,
            errors: AtomicU32::new(0),
            latency_ms: AtomicU64::new(0),
            disabled_until: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn roles(&self) -> &EndpointRoles {
        &self.roles
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn errors(&self) -> u32 {
        self.errors.load(Ordering::SeqCst)
    }

    /// Two-point running-average latency in ms; 0 until the first sample.
    pub fn latency_ms(&self) -> u64 {
        self.latency_ms.load(Ordering::SeqCst)
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Manager for the per-endpoint handles of one logical ledger session.
///
/// Explicitly constructed and injected into the dispatcher and the
/// multiplexer, so independent pools (e.g. isolated test pools) never share
/// state.
#[derive(Debug)]
pub struct ClientPool<S> {
    handles: Vec<Arc<ClientHandle<S>>>,
    config: PoolConfig,
}

impl<S: LedgerSession> ClientPool<S> {
    /// Builds one handle per endpoint using the external session factory.
    pub fn new<F>(
        endpoints: &[EndpointConfig],
        config: PoolConfig,
        factory: F,
    ) -> Result<Self>
    where
        F: Fn(&EndpointConfig) -> Result<S>,
    {
        if endpoints.is_empty() {
            return Err(ConfigError::MissingField {
                field: "endpoints".to_string(),
            }
            .into());
        }

        let mut handles = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            endpoint.validate()?;
            let session = factory(endpoint)?;
            handles.push(Arc::new(ClientHandle::new(endpoint, session)));
        }

        Ok(Self { handles, config })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// All handles regardless of role or health, in configured order.
    pub fn handles(&self) -> &[Arc<ClientHandle<S>>] {
        &self.handles
    }

    /// All push-capable handles. Subscriptions fan out to every one of
    /// these; the duplicate suppressor copes with the redundancy.
    pub fn push_handles(&self) -> Vec<Arc<ClientHandle<S>>> {
        self.handles
            .iter()
            .filter(|h| h.roles.push_capable)
            .cloned()
            .collect()
    }

    /// Eligible handles for a role in a freshly randomized order, so
    /// repeated calls spread load across providers.
    pub fn pool(&self, role: Role) -> Vec<Arc<ClientHandle<S>>> {
        self.pool_filtered(role, &[])
    }

    /// Like [`pool`](Self::pool) with an explicit allow-list of endpoint
    /// names; an empty list allows everything.
    pub fn pool_filtered(&self, role: Role, allow: &[String]) -> Vec<Arc<ClientHandle<S>>> {
        let now = now_ms();
        let mut candidates: Vec<Arc<ClientHandle<S>>> = self
            .handles
            .iter()
            .filter(|h| match role {
                Role::Generic => h.roles.generic,
                Role::Transaction => h.roles.transaction_only,
            })
            .filter(|h| allow.is_empty() || allow.iter().any(|name| name == &h.name))
            .filter(|h| self.is_eligible(h, now))
            .cloned()
            .collect();

        if self.config.randomize {
            candidates.shuffle(&mut rand::thread_rng());
        }
        candidates
    }

    /// Eligible iff the error counter is below the limit. An expired
    /// cooldown resets the counter right here, at selection time.
    fn is_eligible(&self, handle: &ClientHandle<S>, now: u64) -> bool {
        if handle.errors.load(Ordering::SeqCst) < self.config.max_errors {
            return true;
        }

        let deadline = handle.disabled_until.load(Ordering::SeqCst);
        if deadline != 0 && now >= deadline {
            handle.errors.store(0, Ordering::SeqCst);
            handle.disabled_until.store(0, Ordering::SeqCst);
            info!(
                "re-enabling client {} after cooldown, errors reset",
                handle.name
            );
            return true;
        }
        false
    }

    /// Counts one health-affecting failure. The increment that reaches the
    /// limit schedules exactly one re-enable after the cooldown.
    pub fn report_error(&self, handle: &ClientHandle<S>) {
        let errors = handle.errors.fetch_add(1, Ordering::SeqCst) + 1;

        if errors == self.config.max_errors {
            let deadline = now_ms() + self.config.cooldown.as_millis() as u64;
            handle.disabled_until.store(deadline, Ordering::SeqCst);
            warn!(
                "disabling client {} errors: {} latency {}",
                handle.name,
                errors,
                handle.latency_ms()
            );
        }
    }

    /// Folds a latency sample into the handle's two-point running average
    /// `(previous + new) / 2`. Cheap and lossy; informational only, never
    /// used for scheduling.
    pub fn report_latency(&self, handle: &ClientHandle<S>, elapsed_ms: u64) {
        let previous = handle.latency_ms.load(Ordering::SeqCst);
        let updated = if previous == 0 {
            elapsed_ms
        } else {
            (previous + elapsed_ms) / 2
        };
        handle.latency_ms.store(updated, Ordering::SeqCst);
    }
}
