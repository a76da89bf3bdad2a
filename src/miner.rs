use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{sleep, Duration};

use crate::crypto::{hash, Hash32};
use crate::node::NodeMessage;

const MINE_TICK_MS: u64 = 100;

#[derive(Debug, Clone)]
pub enum MinerMessage {
    MineNonce,
}

/// Tracks mining status for the RPC surface.
///
/// While active, the loop hashes random nonces against the current target
/// and keeps the best digest seen. It stands in for a real work
/// algorithm, which quarry deliberately does not define; the numbers
/// exist so the mining info endpoint reports live state.
pub struct Miner {
    pub is_active: bool,
    pub n_workers: u16,
    pub target: Hash32,
    pub best_nonce: u64,
    pub best_digest: Hash32,
}

/// Snapshot returned by the mining info endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MiningStatus {
    pub is_active: bool,
    pub n_workers: u16,
    pub target: String,
    pub best_nonce: u64,
    pub best_digest: String,
}

impl Miner {
    pub fn new(n_workers: u16) -> Miner {
        Miner {
            is_active: false,
            n_workers,
            target: [0; 32],
            best_nonce: 0,
            best_digest: [0xff; 32],
        }
    }

    /// Retarget and restart the search.
    pub fn set_target(&mut self, target: Hash32) {
        self.target = target;
        self.best_nonce = 0;
        self.best_digest = [0xff; 32];
        self.is_active = true;
    }

    /// Try one nonce against the current target, keeping it if the
    /// digest improves on the best so far.
    pub fn mine(&mut self) {
        if !self.is_active {
            return;
        }
        let nonce = rand::random::<u64>();
        let mut preimage = self.target.to_vec();
        preimage.extend(&nonce.to_be_bytes());
        let digest = hash(&preimage);
        if digest < self.best_digest {
            self.best_nonce = nonce;
            self.best_digest = digest;
        }
    }

    pub fn get_status(&self) -> MiningStatus {
        MiningStatus {
            is_active: self.is_active,
            n_workers: self.n_workers,
            target: hex::encode(self.target),
            best_nonce: self.best_nonce,
            best_digest: hex::encode(self.best_digest),
        }
    }
}

pub async fn run(
    miner_lock: Arc<RwLock<Miner>>,
    mut broadcast_channel_receiver: broadcast::Receiver<NodeMessage>,
) -> crate::Result<()> {
    let (miner_channel_sender, mut miner_channel_receiver) = mpsc::channel(4);

    tokio::spawn(async move {
        loop {
            if miner_channel_sender
                .send(MinerMessage::MineNonce)
                .await
                .is_err()
            {
                break;
            }
            sleep(Duration::from_millis(MINE_TICK_MS)).await;
        }
    });

    loop {
        tokio::select! {

            //
            // Miner Channel Messages
            //
            Some(message) = miner_channel_receiver.recv() => {
                match message {
                    MinerMessage::MineNonce => {
                        let mut miner = miner_lock.write().await;
                        miner.mine();
                    }
                }
            }

            //
            // Node Channel Messages
            //
            Ok(message) = broadcast_channel_receiver.recv() => {
                if let NodeMessage::MempoolNewTransaction { hash: tx_hash } = message {
                    let mut miner = miner_lock.write().await;
                    miner.set_target(tx_hash);
                }
            }

        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mine_is_a_noop_while_inactive() {
        let mut miner = Miner::new(1);
        miner.mine();
        assert_eq!(miner.best_nonce, 0);
        assert_eq!(miner.best_digest, [0xff; 32]);
    }

    #[test]
    fn set_target_activates_and_mining_improves_the_best_digest() {
        let mut miner = Miner::new(2);
        miner.set_target([7; 32]);
        assert!(miner.is_active);

        for _ in 0..8 {
            miner.mine();
        }
        assert!(miner.best_digest < [0xff; 32]);

        let status = miner.get_status();
        assert!(status.is_active);
        assert_eq!(status.n_workers, 2);
        assert_eq!(status.target, hex::encode([7u8; 32]));
        assert_eq!(status.best_digest, hex::encode(miner.best_digest));
    }

    #[test]
    fn retargeting_resets_the_search() {
        let mut miner = Miner::new(1);
        miner.set_target([7; 32]);
        for _ in 0..8 {
            miner.mine();
        }
        miner.set_target([8; 32]);
        assert_eq!(miner.best_nonce, 0);
        assert_eq!(miner.best_digest, [0xff; 32]);
    }
}
