mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ethers::types::{Log, Transaction, TransactionReceipt, TxHash};
use tokio::time::sleep;

use common::{build_pool, deterministic_config, generic_endpoint, hash, push_endpoint, MockSession};
use ledger_mux::{LedgerMux, PushEvent};

fn pending(byte: u8) -> PushEvent {
    PushEvent::Pending(hash(byte))
}

fn log_event(tx_hash: Option<TxHash>) -> PushEvent {
    PushEvent::Log(Log {
        transaction_hash: tx_hash,
        ..Default::default()
    })
}

fn transaction(byte: u8) -> Transaction {
    Transaction {
        hash: hash(byte),
        ..Default::default()
    }
}

fn receipt(byte: u8) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: hash(byte),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_duplicate_pending_hashes_deliver_once() {
    let enricher = MockSession::default();
    enricher
        .transactions
        .lock()
        .unwrap()
        .insert(hash(1), transaction(1));

    let pool = build_pool(
        vec![
            (generic_endpoint("g1"), enricher),
            (push_endpoint("ws1"), MockSession::with_events(vec![pending(1)])),
            (push_endpoint("ws2"), MockSession::with_events(vec![pending(1)])),
        ],
        deterministic_config(),
    );
    let mux = LedgerMux::from_pool(pool);

    let delivered: Arc<Mutex<Vec<Transaction>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let handle = mux.subscribe_to_pending_transactions(move |tx| {
        sink.lock().unwrap().push(tx);
    });

    sleep(Duration::from_millis(200)).await;

    let delivered = delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 1, "one delivery across both sources");
    assert_eq!(delivered[0].hash, hash(1));

    handle.stop().await;
}

#[tokio::test]
async fn test_receipt_events_are_enriched_and_deduplicated() {
    let enricher = MockSession::default();
    enricher.receipts.lock().unwrap().insert(hash(5), receipt(5));

    let pool = build_pool(
        vec![
            (generic_endpoint("g1"), enricher),
            (
                push_endpoint("ws1"),
                // the hashless log is a pending log and must be dropped
                MockSession::with_events(vec![log_event(None), log_event(Some(hash(5)))]),
            ),
            (
                push_endpoint("ws2"),
                MockSession::with_events(vec![log_event(Some(hash(5)))]),
            ),
        ],
        deterministic_config(),
    );
    let mux = LedgerMux::from_pool(pool);

    let delivered: Arc<Mutex<Vec<TransactionReceipt>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let handle = mux.subscribe_to_receipts(move |receipt| {
        sink.lock().unwrap().push(receipt);
    });

    sleep(Duration::from_millis(200)).await;

    let delivered = delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].transaction_hash, hash(5));

    handle.stop().await;
}

#[tokio::test]
async fn test_failed_enrichment_drops_the_event() {
    // no generic session knows hash(9), so the detail fetch comes up empty
    let pool = build_pool(
        vec![
            (generic_endpoint("g1"), MockSession::default()),
            (push_endpoint("ws1"), MockSession::with_events(vec![pending(9)])),
        ],
        deterministic_config(),
    );
    let mux = LedgerMux::from_pool(pool);

    let delivered: Arc<Mutex<Vec<Transaction>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let handle = mux.subscribe_to_pending_transactions(move |tx| {
        sink.lock().unwrap().push(tx);
    });

    sleep(Duration::from_millis(150)).await;

    assert!(delivered.lock().unwrap().is_empty());
    handle.stop().await;
}

#[tokio::test]
async fn test_tiny_dedup_buffer_lets_duplicates_through() {
    let enricher = MockSession::default();
    enricher
        .transactions
        .lock()
        .unwrap()
        .insert(hash(1), transaction(1));

    let pool = build_pool(
        vec![
            (generic_endpoint("g1"), enricher),
            (push_endpoint("ws1"), MockSession::with_events(vec![pending(1)])),
            (push_endpoint("ws2"), MockSession::with_events(vec![pending(1)])),
        ],
        deterministic_config(),
    );
    // capacity 1 evicts every key the moment it is inserted
    let mux = LedgerMux::from_pool(pool).with_dedup_capacity(1);

    let delivered: Arc<Mutex<Vec<Transaction>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let handle = mux.subscribe_to_pending_transactions(move |tx| {
        sink.lock().unwrap().push(tx);
    });

    sleep(Duration::from_millis(200)).await;

    assert_eq!(
        delivered.lock().unwrap().len(),
        2,
        "an evicted key is treated as new again"
    );
    handle.stop().await;
}

#[tokio::test]
async fn test_stop_terminates_all_tasks() {
    let pool = build_pool(
        vec![
            (generic_endpoint("g1"), MockSession::default()),
            (push_endpoint("ws1"), MockSession::with_events(vec![pending(1)])),
        ],
        deterministic_config(),
    );
    let mux = LedgerMux::from_pool(pool);

    let handle = mux.subscribe_to_pending_transactions(|_| {});
    assert!(!handle.is_cancelled());
    handle.cancel();
    assert!(handle.is_cancelled());

    // stop() joins every reader and the merge task; reaching this line
    // without hanging is the assertion
    handle.stop().await;
}
