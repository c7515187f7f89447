//! # Ledger Session Capability Trait
//!
//! The core never talks to the wire directly. Any concrete transport client
//! (HTTP JSON-RPC, websocket, a test double) implements [`LedgerSession`]
//! and is plugged in through the session factory at pool construction.

use anyhow::Result;
use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, Log, Transaction, TransactionReceipt, TxHash};
use futures::stream::BoxStream;

/// Push event classes a session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// Confirmed log events (each carries the hash of its transaction).
    Logs,
    /// Pending transaction hashes from the mempool.
    PendingTransactions,
}

impl EventClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventClass::Logs => "logs",
            EventClass::PendingTransactions => "pending_transactions",
        }
    }
}

/// One inbound push notification from a single source.
#[derive(Debug, Clone)]
pub enum PushEvent {
    Log(Log),
    Pending(TxHash),
}

impl PushEvent {
    /// The identity key used to collapse redundant notifications.
    ///
    /// Log events without a transaction hash (pending logs) yield `None`
    /// and are dropped by the multiplexer.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            PushEvent::Log(log) => log.transaction_hash,
            PushEvent::Pending(hash) => Some(*hash),
        }
    }
}

/// Capability interface over one endpoint's wire client.
///
/// Methods mirror exactly what the core calls, nothing more. Failures are
/// opaque (`anyhow`): the dispatcher only distinguishes timeouts, which it
/// injects itself, from everything else.
#[async_trait]
pub trait LedgerSession: Send + Sync {
    /// Fetch a transaction by hash. `Ok(None)` means the node does not
    /// know the hash, which is a successful outcome, not a failure.
    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>>;

    /// Fetch a transaction receipt by hash.
    async fn get_transaction_receipt(&self, hash: TxHash)
        -> Result<Option<TransactionReceipt>>;

    /// Execute a read-only contract call and return the decoded output
    /// tokens.
    async fn call_contract(
        &self,
        abi: &Abi,
        address: Address,
        method: &str,
        args: &[Token],
    ) -> Result<Vec<Token>>;

    /// Open a persistent push subscription for the given event class.
    ///
    /// The stream lives until the remote side closes it or the consumer
    /// drops it; the multiplexer handles both.
    async fn subscribe(&self, class: EventClass) -> Result<BoxStream<'static, PushEvent>>;
}
