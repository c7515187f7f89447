//! # Ledger Mux
//!
//! The library surface: one logical ledger session backed by many
//! unreliable physical providers. Queries fail over across the pool;
//! subscriptions fan out to every push-capable provider and come back
//! de-duplicated.

use std::sync::Arc;

use anyhow::Result;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, Transaction, TransactionReceipt, TxHash, U256};
use once_cell::sync::Lazy;

use crate::config::EndpointConfig;
use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::error::{ConfigError, NetworkError};
use crate::pool::{ClientPool, PoolConfig};
use crate::session::{EventClass, LedgerSession};
use crate::subscribe::{Multiplexer, SubscriptionHandle};
use crate::units::from_base_units;

/// The two ERC-20 views the query surface needs.
static ERC20_ABI: Lazy<Abi> = Lazy::new(|| {
    let abi_json = r#"[
        {"type":"function","name":"decimals","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"uint8"}]},
        {"type":"function","name":"totalSupply","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"uint256"}]}
    ]"#;
    serde_json::from_str(abi_json).expect("static ERC-20 ABI parses")
});

/// Multi-provider ledger client.
///
/// Explicitly constructed; two instances never share pool state, so
/// isolated pools (e.g. in tests) come for free.
pub struct LedgerMux<S> {
    dispatcher: Dispatcher<S>,
    multiplexer: Multiplexer<S>,
}

impl<S> Clone for LedgerMux<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            multiplexer: self.multiplexer.clone(),
        }
    }
}

impl<S: LedgerSession + 'static> LedgerMux<S> {
    /// Builds a pool from endpoint configuration, creating one session per
    /// endpoint through the external session factory.
    pub fn new<F>(endpoints: &[EndpointConfig], factory: F) -> Result<Self>
    where
        F: Fn(&EndpointConfig) -> Result<S>,
    {
        Self::with_pool_config(endpoints, PoolConfig::default(), factory)
    }

    pub fn with_pool_config<F>(
        endpoints: &[EndpointConfig],
        config: PoolConfig,
        factory: F,
    ) -> Result<Self>
    where
        F: Fn(&EndpointConfig) -> Result<S>,
    {
        let pool = Arc::new(ClientPool::new(endpoints, config, factory)?);
        Ok(Self::from_pool(pool))
    }

    /// Wraps an already-built pool (injection seam).
    pub fn from_pool(pool: Arc<ClientPool<S>>) -> Self {
        let dispatcher = Dispatcher::new(pool);
        let multiplexer = Multiplexer::new(dispatcher.clone());
        Self {
            dispatcher,
            multiplexer,
        }
    }

    /// Overrides the per-attempt dispatch deadline (tests use short ones).
    pub fn with_dispatch_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.dispatcher = self.dispatcher.with_timeout_ms(timeout_ms);
        self.multiplexer = Multiplexer::new(self.dispatcher.clone())
            .with_dedup_capacity(self.multiplexer.dedup_capacity());
        self
    }

    /// Overrides the duplicate-suppression buffer bound.
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.multiplexer = self.multiplexer.with_dedup_capacity(capacity);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    pub fn pool(&self) -> &Arc<ClientPool<S>> {
        self.dispatcher.pool()
    }

    /// Fetches a transaction by hash from the first provider that answers.
    /// `None` covers both "no provider answered" and "hash unknown".
    pub async fn get_transaction(&self, hash: TxHash) -> Option<Transaction> {
        let options = DispatchOptions::new(format!("get_transaction: {:?}", hash));
        self.dispatcher
            .dispatch(&options, move |handle| async move {
                handle.session().get_transaction(hash).await
            })
            .await
            .into_option()
            .flatten()
    }

    /// Fetches a transaction receipt by hash. This is the hot call of the
    /// receipt subscription path, so it counts failures against provider
    /// health and keeps the latency benchmark fresh.
    pub async fn get_transaction_receipt(&self, hash: TxHash) -> Option<TransactionReceipt> {
        let options = DispatchOptions::new(format!("get_transaction_receipt: {:?}", hash))
            .count_failures(true)
            .record_latency(true);
        self.dispatcher
            .dispatch(&options, move |handle| async move {
                handle.session().get_transaction_receipt(hash).await
            })
            .await
            .into_option()
            .flatten()
    }

    /// Reads a token's `decimals()`.
    pub async fn get_decimals(&self, address: Address) -> Option<u8> {
        let options = DispatchOptions::new("decimals");
        self.dispatcher
            .dispatch(&options, move |handle| async move {
                let tokens = handle
                    .session()
                    .call_contract(&ERC20_ABI, address, "decimals", &[])
                    .await?;
                let value = single_uint(tokens, handle.name())?;
                Ok(value.low_u64() as u8)
            })
            .await
            .into_option()
    }

    /// Reads a token's `totalSupply()` scaled to a human decimal string.
    ///
    /// Unresolvable decimals is a configuration failure: fatal, never
    /// retried. Provider exhaustion on the supply call itself is `None`.
    pub async fn get_total_supply(
        &self,
        address: Address,
        decimals: Option<u8>,
    ) -> Result<Option<String>> {
        let decimals = match decimals {
            Some(d) => d,
            None => match self.get_decimals(address).await {
                Some(d) => d,
                None => {
                    return Err(ConfigError::UnresolvableDecimals {
                        address: format!("{:?}", address),
                    }
                    .into())
                }
            },
        };

        let options = DispatchOptions::new("total_supply");
        let outcome = self
            .dispatcher
            .dispatch(&options, move |handle| async move {
                let tokens = handle
                    .session()
                    .call_contract(&ERC20_ABI, address, "totalSupply", &[])
                    .await?;
                let supply = single_uint(tokens, handle.name())?;
                from_base_units(supply, decimals as u32)
            })
            .await;

        Ok(outcome.into_option())
    }

    /// Delivers every confirmed transaction receipt seen by any
    /// push-capable provider, at most once per transaction hash.
    pub fn subscribe_to_receipts<C>(&self, on_receipt: C) -> SubscriptionHandle
    where
        C: Fn(TransactionReceipt) + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        self.multiplexer.multiplex(
            EventClass::Logs,
            move |hash| {
                let dispatcher = dispatcher.clone();
                async move {
                    let options =
                        DispatchOptions::new(format!("get_transaction_receipt: {:?}", hash))
                            .count_failures(true)
                            .record_latency(true);
                    dispatcher
                        .dispatch(&options, move |handle| async move {
                            handle.session().get_transaction_receipt(hash).await
                        })
                        .await
                        .into_option()
                        .flatten()
                }
            },
            on_receipt,
        )
    }

    /// Delivers every pending transaction seen by any push-capable
    /// provider, at most once per transaction hash.
    pub fn subscribe_to_pending_transactions<C>(&self, on_transaction: C) -> SubscriptionHandle
    where
        C: Fn(Transaction) + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        self.multiplexer.multiplex(
            EventClass::PendingTransactions,
            move |hash| {
                let dispatcher = dispatcher.clone();
                async move {
                    let options = DispatchOptions::new(format!("get_transaction: {:?}", hash));
                    dispatcher
                        .dispatch(&options, move |handle| async move {
                            handle.session().get_transaction(hash).await
                        })
                        .await
                        .into_option()
                        .flatten()
                }
            },
            on_transaction,
        )
    }
}

fn single_uint(tokens: Vec<Token>, endpoint: &str) -> Result<U256> {
    match tokens.into_iter().next() {
        Some(Token::Uint(value)) => Ok(value),
        other => Err(NetworkError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: format!("expected a single uint, got {:?}", other),
        }
        .into()),
    }
}
