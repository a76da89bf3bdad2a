use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, Duration};
use tracing::{event, Level};

use crate::crypto::Hash32;
use crate::error::NodeError;
use crate::node::NodeMessage;
use crate::transaction::Transaction;

const DRAIN_IDLE_SLEEP_MS: u64 = 50;

/// The `Mempool` is the transaction ingress queue. Broadcast submissions
/// are validated and queued here under backpressure; the drain loop hands
/// accepted transactions to the rest of the node over the broadcast
/// channel. The queue is bounded, so burst submission degrades into
/// `QueueFull` errors rather than unbounded memory growth.
pub struct Mempool {
    max_payload_size: usize,
    max_queue_len: usize,
    queue: VecDeque<Transaction>,
    queued_hashes: HashSet<Hash32>,
}

impl Mempool {
    pub fn new(max_payload_size: usize, max_queue_len: usize) -> Mempool {
        Mempool {
            max_payload_size,
            max_queue_len,
            queue: VecDeque::new(),
            queued_hashes: HashSet::new(),
        }
    }

    /// Validate and queue one transaction, returning its content hash.
    ///
    /// Re-broadcasting content that is already queued is an idempotent
    /// accept returning the existing hash.
    pub fn try_enqueue(
        &mut self,
        transaction: Transaction,
    ) -> std::result::Result<Hash32, NodeError> {
        if transaction.get_timestamp() == 0 {
            return Err(NodeError::MalformedTransaction(
                "timestamp is required".to_string(),
            ));
        }
        if transaction.get_binary().is_empty() {
            return Err(NodeError::MalformedTransaction(
                "binary payload is empty".to_string(),
            ));
        }
        let size = transaction.get_binary().len();
        if size > self.max_payload_size {
            return Err(NodeError::PayloadTooLarge {
                size,
                max: self.max_payload_size,
            });
        }

        let tx_hash = transaction.get_hash();
        if self.queued_hashes.contains(&tx_hash) {
            return Ok(tx_hash);
        }
        if self.queue.len() >= self.max_queue_len {
            return Err(NodeError::QueueFull);
        }
        self.queued_hashes.insert(tx_hash);
        self.queue.push_back(transaction);
        Ok(tx_hash)
    }

    /// Pop the oldest queued transaction, releasing its slot.
    pub fn drain_next(&mut self) -> Option<Transaction> {
        let transaction = self.queue.pop_front()?;
        self.queued_hashes.remove(&transaction.get_hash());
        Some(transaction)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn get_max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    pub fn get_max_queue_len(&self) -> usize {
        self.max_queue_len
    }
}

/// Drain loop. Accepted transactions are announced on the node-wide
/// broadcast channel so downstream systems (the miner, for now) can
/// react. Processing beyond the announcement is out of scope here.
pub async fn run(
    mempool_lock: Arc<RwLock<Mempool>>,
    broadcast_channel_sender: broadcast::Sender<NodeMessage>,
) -> crate::Result<()> {
    loop {
        let drained = {
            let mut mempool = mempool_lock.write().await;
            mempool.drain_next()
        };
        match drained {
            Some(transaction) => {
                let tx_hash = transaction.get_hash();
                event!(
                    Level::DEBUG,
                    "mempool drained transaction {}",
                    hex::encode(tx_hash)
                );
                // send only fails when nobody is subscribed
                let _ = broadcast_channel_sender
                    .send(NodeMessage::MempoolNewTransaction { hash: tx_hash });
            }
            None => sleep(Duration::from_millis(DRAIN_IDLE_SLEEP_MS)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future;

    fn transaction(timestamp: u64, payload: Vec<u8>) -> Transaction {
        Transaction::new(timestamp, payload, vec![])
    }

    #[test]
    fn oversized_payload_is_rejected_and_queue_unaffected() {
        let mut mempool = Mempool::new(16, 8);
        let result = mempool.try_enqueue(transaction(1, vec![0u8; 17]));
        assert!(matches!(
            result,
            Err(NodeError::PayloadTooLarge { size: 17, max: 16 })
        ));
        assert!(mempool.is_empty());
    }

    #[test]
    fn missing_timestamp_is_malformed() {
        let mut mempool = Mempool::new(16, 8);
        assert!(matches!(
            mempool.try_enqueue(transaction(0, vec![1])),
            Err(NodeError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn empty_binary_is_malformed() {
        let mut mempool = Mempool::new(16, 8);
        assert!(matches!(
            mempool.try_enqueue(transaction(1, vec![])),
            Err(NodeError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn saturated_queue_signals_backpressure() {
        let mut mempool = Mempool::new(16, 2);
        mempool.try_enqueue(transaction(1, vec![1])).unwrap();
        mempool.try_enqueue(transaction(2, vec![2])).unwrap();
        assert!(matches!(
            mempool.try_enqueue(transaction(3, vec![3])),
            Err(NodeError::QueueFull)
        ));
        assert_eq!(mempool.len(), 2);
    }

    #[test]
    fn duplicate_content_is_an_idempotent_accept() {
        let mut mempool = Mempool::new(16, 8);
        let first = mempool.try_enqueue(transaction(1, vec![1, 2, 3])).unwrap();
        let second = mempool.try_enqueue(transaction(1, vec![1, 2, 3])).unwrap();
        assert_eq!(first, second);
        assert_eq!(mempool.len(), 1);
    }

    #[test]
    fn drain_frees_a_slot() {
        let mut mempool = Mempool::new(16, 1);
        mempool.try_enqueue(transaction(1, vec![1])).unwrap();
        assert!(matches!(
            mempool.try_enqueue(transaction(2, vec![2])),
            Err(NodeError::QueueFull)
        ));
        let drained = mempool.drain_next().unwrap();
        assert_eq!(drained.get_timestamp(), 1);
        mempool.try_enqueue(transaction(2, vec![2])).unwrap();
        assert_eq!(mempool.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_burst_respects_capacity_exactly() {
        let mempool_lock = Arc::new(RwLock::new(Mempool::new(64, 100)));

        let mut handles = vec![];
        for i in 0..1000u64 {
            let mempool_lock = mempool_lock.clone();
            handles.push(tokio::spawn(async move {
                let mut mempool = mempool_lock.write().await;
                mempool.try_enqueue(transaction(i + 1, vec![1, 2, 3]))
            }));
        }

        let mut accepted = 0;
        let mut rejected = 0;
        for result in future::join_all(handles).await {
            match result.expect("task panicked") {
                Ok(_) => accepted += 1,
                Err(NodeError::QueueFull) => rejected += 1,
                Err(err) => panic!("unexpected error: {}", err),
            }
        }

        assert_eq!(accepted, 100);
        assert_eq!(rejected, 900);
        assert_eq!(mempool_lock.read().await.len(), 100);
    }
}
