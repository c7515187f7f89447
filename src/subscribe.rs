//! # Subscription Multiplexer
//!
//! Opens one push subscription per push-capable endpoint, funnels every
//! inbound event into a single merge task, collapses duplicates through the
//! [`DedupBuffer`], enriches first-seen keys through the dispatcher, and
//! hands each enriched event to the caller exactly once.
//!
//! Every multiplex call returns a [`SubscriptionHandle`] carrying a
//! cancellation token; dropping interest is explicit, not process-exit.

use std::future::Future;
use std::time::Duration;

use ethers::types::TxHash;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dedup::{DedupBuffer, DEDUP_CAPACITY};
use crate::dispatch::Dispatcher;
use crate::session::{EventClass, LedgerSession, PushEvent};

/// How often the merge task logs the per-source dedup summary.
const REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Backlog of merged-but-unprocessed push events.
const MERGE_CHANNEL_DEPTH: usize = 1024;

/// Stop handle for one multiplexed subscription.
pub struct SubscriptionHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Signals all per-endpoint readers and the merge task to wind down.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels and waits for every task to finish.
    pub async fn stop(self) {
        self.token.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Fans one event class out to all push-capable endpoints and merges the
/// streams into one de-duplicated delivery path.
pub struct Multiplexer<S> {
    dispatcher: Dispatcher<S>,
    dedup_capacity: usize,
}

impl<S> Clone for Multiplexer<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            dedup_capacity: self.dedup_capacity,
        }
    }
}

impl<S: LedgerSession + 'static> Multiplexer<S> {
    pub fn new(dispatcher: Dispatcher<S>) -> Self {
        Self {
            dispatcher,
            dedup_capacity: DEDUP_CAPACITY,
        }
    }

    /// Overrides the dedup buffer bound (tests use tiny ones).
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    pub fn dedup_capacity(&self) -> usize {
        self.dedup_capacity
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    /// Subscribes every push-capable endpoint to `class`.
    ///
    /// For each inbound event: extract the transaction hash, drop silently
    /// if any source already delivered it, otherwise record it and run
    /// `enrich`; an absent enrichment result drops the event, a present one
    /// is passed to `deliver` exactly once.
    pub fn multiplex<D, E, Fut, C>(
        &self,
        class: EventClass,
        enrich: E,
        deliver: C,
    ) -> SubscriptionHandle
    where
        D: Send + 'static,
        E: Fn(TxHash) -> Fut + Send + 'static,
        Fut: Future<Output = Option<D>> + Send + 'static,
        C: Fn(D) + Send + 'static,
    {
        let token = CancellationToken::new();
        let (merge_tx, merge_rx) = mpsc::channel::<(String, PushEvent)>(MERGE_CHANNEL_DEPTH);
        let mut tasks = Vec::new();

        for handle in self.dispatcher.pool().push_handles() {
            let child = token.clone();
            let tx = merge_tx.clone();

            tasks.push(tokio::spawn(async move {
                let name = handle.name().to_string();
                info!("subscribing to {} with {}", class.as_str(), name);

                let mut stream = match handle.session().subscribe(class).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!("subscription to {} failed: {}", name, e);
                        return;
                    }
                };

                loop {
                    tokio::select! {
                        _ = child.cancelled() => break,
                        next = stream.next() => match next {
                            Some(event) => {
                                if tx.send((name.clone(), event)).await.is_err() {
                                    break;
                                }
                            }
                            None => {
                                warn!("push subscription {} ended", name);
                                break;
                            }
                        },
                    }
                }
            }));
        }
        drop(merge_tx);

        tasks.push(self.spawn_merge_task(class, token.clone(), merge_rx, enrich, deliver));

        SubscriptionHandle { token, tasks }
    }

    fn spawn_merge_task<D, E, Fut, C>(
        &self,
        class: EventClass,
        token: CancellationToken,
        mut merge_rx: mpsc::Receiver<(String, PushEvent)>,
        enrich: E,
        deliver: C,
    ) -> JoinHandle<()>
    where
        D: Send + 'static,
        E: Fn(TxHash) -> Fut + Send + 'static,
        Fut: Future<Output = Option<D>> + Send + 'static,
        C: Fn(D) + Send + 'static,
    {
        let mut dedup = DedupBuffer::new(class.as_str(), self.dedup_capacity);

        tokio::spawn(async move {
            let mut report_timer = tokio::time::interval(REPORT_INTERVAL);
            // consume the immediate first tick
            report_timer.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = report_timer.tick() => {
                        if !dedup.is_empty() {
                            info!("{}", dedup.report());
                        }
                    }
                    inbound = merge_rx.recv() => match inbound {
                        Some((source, event)) => {
                            let key = match event.tx_hash() {
                                Some(key) => key,
                                None => continue,
                            };
                            if dedup.observe(key, &source) {
                                continue;
                            }
                            dedup.insert(key, &source);

                            if let Some(detail) = enrich(key).await {
                                deliver(detail);
                            }
                        }
                        None => break,
                    },
                }
            }
        })
    }
}
