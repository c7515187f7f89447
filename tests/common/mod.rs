#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, Transaction, TransactionReceipt, TxHash, U256};
use futures::stream::BoxStream;
use futures::StreamExt;

use ledger_mux::{
    ClientPool, EndpointConfig, EndpointRoles, EventClass, LedgerSession, PoolConfig, PushEvent,
};

/// Scripted stand-in for a wire client.
#[derive(Default)]
pub struct MockSession {
    /// Every query fails with an opaque error.
    pub fail_queries: bool,
    /// Added before every query answers (for timeout tests).
    pub query_delay: Option<Duration>,
    pub transactions: Mutex<HashMap<TxHash, Transaction>>,
    pub receipts: Mutex<HashMap<TxHash, TransactionReceipt>>,
    pub decimals: Option<u8>,
    pub total_supply: Option<U256>,
    /// Drained once by the first `subscribe` call.
    pub events: Mutex<Vec<PushEvent>>,
    pub query_count: AtomicU32,
}

impl MockSession {
    pub fn failing() -> Self {
        Self {
            fail_queries: true,
            ..Default::default()
        }
    }

    pub fn with_events(events: Vec<PushEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Default::default()
        }
    }

    pub fn queries(&self) -> u32 {
        self.query_count.load(Ordering::SeqCst)
    }

    async fn before_query(&self) -> Result<()> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_queries {
            anyhow::bail!("mock wire failure");
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerSession for MockSession {
    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>> {
        self.before_query().await?;
        Ok(self.transactions.lock().unwrap().get(&hash).cloned())
    }

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>> {
        self.before_query().await?;
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }

    async fn call_contract(
        &self,
        _abi: &Abi,
        _address: Address,
        method: &str,
        _args: &[Token],
    ) -> Result<Vec<Token>> {
        self.before_query().await?;
        match method {
            "decimals" => {
                let value = self
                    .decimals
                    .ok_or_else(|| anyhow::anyhow!("decimals not mocked"))?;
                Ok(vec![Token::Uint(U256::from(value))])
            }
            "totalSupply" => {
                let value = self
                    .total_supply
                    .ok_or_else(|| anyhow::anyhow!("totalSupply not mocked"))?;
                Ok(vec![Token::Uint(value)])
            }
            other => anyhow::bail!("unexpected contract method {}", other),
        }
    }

    async fn subscribe(&self, _class: EventClass) -> Result<BoxStream<'static, PushEvent>> {
        let events: Vec<PushEvent> = self.events.lock().unwrap().drain(..).collect();
        // keep the stream open after the scripted events run out
        Ok(futures::stream::iter(events)
            .chain(futures::stream::pending())
            .boxed())
    }
}

pub fn generic_endpoint(name: &str) -> EndpointConfig {
    EndpointConfig {
        name: name.to_string(),
        url: format!("https://{}.example.org/rpc", name),
        roles: EndpointRoles {
            generic: true,
            ..Default::default()
        },
    }
}

pub fn transaction_endpoint(name: &str) -> EndpointConfig {
    EndpointConfig {
        name: name.to_string(),
        url: format!("https://{}.example.org/rpc", name),
        roles: EndpointRoles {
            transaction_only: true,
            ..Default::default()
        },
    }
}

pub fn push_endpoint(name: &str) -> EndpointConfig {
    EndpointConfig {
        name: name.to_string(),
        url: format!("wss://{}.example.org/ws", name),
        roles: EndpointRoles {
            push_capable: true,
            ..Default::default()
        },
    }
}

/// Pool config with deterministic candidate order for assertions.
pub fn deterministic_config() -> PoolConfig {
    PoolConfig {
        randomize: false,
        ..Default::default()
    }
}

/// Builds a pool handing each scripted session to its endpoint.
pub fn build_pool(
    entries: Vec<(EndpointConfig, MockSession)>,
    config: PoolConfig,
) -> Arc<ClientPool<MockSession>> {
    let endpoints: Vec<EndpointConfig> = entries.iter().map(|(e, _)| e.clone()).collect();
    let sessions: RefCell<HashMap<String, MockSession>> = RefCell::new(
        entries
            .into_iter()
            .map(|(endpoint, session)| (endpoint.name.clone(), session))
            .collect(),
    );

    let pool = ClientPool::new(&endpoints, config, |endpoint| {
        sessions
            .borrow_mut()
            .remove(&endpoint.name)
            .ok_or_else(|| anyhow::anyhow!("no session scripted for {}", endpoint.name))
    })
    .expect("pool builds");

    Arc::new(pool)
}

pub fn hash(byte: u8) -> TxHash {
    TxHash::from([byte; 32])
}
