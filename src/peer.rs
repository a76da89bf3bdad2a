//! A Peer. i.e. another node in the network.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::connector::Connector;
use crate::error::NodeError;
use crate::node::NodeMessage;
use crate::time::create_timestamp;

/// Connection state of a peer table entry.
///
/// A peer only ever moves pending -> connected or pending -> failed. The
/// table lock is dropped while the dial is in flight and re-acquired to
/// commit, so readers may observe `pending` but never a torn record.
#[derive(Serialize, Deserialize, Debug, Copy, PartialEq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum PeerState {
    Pending,
    Connected,
    Failed,
}

/// A peer record as stored in the table and returned over the wire.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Peer {
    pub address: String,
    pub state: PeerState,
    pub last_seen: u64,
}

/// The set of peers known to this node, keyed by host:port address.
///
/// All mutation goes through the methods here so two invariants hold: the
/// node's own listen address is never present, and no two entries share
/// an address.
pub struct PeerTable {
    own_address: SocketAddr,
    peers: HashMap<String, Peer>,
}

impl PeerTable {
    pub fn new(own_address: SocketAddr) -> PeerTable {
        PeerTable {
            own_address,
            peers: HashMap::new(),
        }
    }

    pub fn get_own_address(&self) -> SocketAddr {
        self.own_address
    }

    /// Validate a connect request and stake out a `pending` entry.
    ///
    /// The caller performs the dial without holding the table lock and
    /// then commits the outcome with `commit_connect`. A second connect
    /// for an entry that is `pending` or `connected` is rejected, so at
    /// most one dial is in flight per address; a `failed` entry may be
    /// re-dialed.
    pub fn begin_connect(&mut self, address: &str) -> std::result::Result<SocketAddr, NodeError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| NodeError::InvalidAddress(address.to_string()))?;
        if addr == self.own_address {
            return Err(NodeError::SelfConnection);
        }
        let key = addr.to_string();
        if let Some(peer) = self.peers.get(&key) {
            if peer.state != PeerState::Failed {
                return Err(NodeError::AlreadyConnected(key));
            }
        }
        self.peers.insert(
            key.clone(),
            Peer {
                address: key,
                state: PeerState::Pending,
                last_seen: create_timestamp(),
            },
        );
        Ok(addr)
    }

    /// Commit the outcome of a dial staked out by `begin_connect`.
    pub fn commit_connect(&mut self, address: &SocketAddr, connected: bool) -> Peer {
        let key = address.to_string();
        let peer = self.peers.entry(key.clone()).or_insert(Peer {
            address: key,
            state: PeerState::Pending,
            last_seen: 0,
        });
        peer.state = if connected {
            PeerState::Connected
        } else {
            PeerState::Failed
        };
        peer.last_seen = create_timestamp();
        peer.clone()
    }

    /// Snapshot of the table, ordered by address.
    pub fn list(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.peers.values().cloned().collect();
        peers.sort_by(|a, b| a.address.cmp(&b.address));
        peers
    }

    pub fn poll(&self, address: &str) -> std::result::Result<Peer, NodeError> {
        self.peers
            .get(address)
            .cloned()
            .ok_or_else(|| NodeError::UnknownPeer(address.to_string()))
    }

    pub fn evict(&mut self, address: &str) -> std::result::Result<Peer, NodeError> {
        self.peers
            .remove(address)
            .ok_or_else(|| NodeError::UnknownPeer(address.to_string()))
    }

    /// Drop `failed` peers idle for at least `max_idle_ms`. Returns the
    /// number evicted.
    pub fn sweep_failed(&mut self, max_idle_ms: u64) -> usize {
        let now = create_timestamp();
        let before = self.peers.len();
        self.peers.retain(|_, peer| {
            peer.state != PeerState::Failed || now.saturating_sub(peer.last_seen) < max_idle_ms
        });
        before - self.peers.len()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Full connect flow: stake out a `pending` entry, dial without holding
/// the table lock, re-acquire it to commit the final state, and announce
/// the outcome on the broadcast channel.
///
/// The dial and commit run on a spawned task, so a caller disconnecting
/// mid-call cannot strand the entry in `pending`; the staked entry always
/// reaches `connected` or `failed`.
pub async fn connect_peer(
    address: &str,
    peers_lock: Arc<RwLock<PeerTable>>,
    connector: &Connector,
    broadcast_channel_sender: &broadcast::Sender<NodeMessage>,
) -> std::result::Result<Peer, NodeError> {
    let addr = {
        let mut peers = peers_lock.write().await;
        peers.begin_connect(address)?
    };

    let connector = connector.clone();
    let broadcast_channel_sender = broadcast_channel_sender.clone();
    let dial_task = tokio::spawn(async move {
        let dial_result = connector.dial(addr).await;

        let mut peers = peers_lock.write().await;
        let peer = peers.commit_connect(&addr, dial_result.is_ok());
        match dial_result {
            Ok(()) => {
                // send only fails when nobody is subscribed
                let _ = broadcast_channel_sender.send(NodeMessage::NetworkPeerConnected {
                    address: peer.address.clone(),
                });
                Ok(peer)
            }
            Err(err) => {
                let _ = broadcast_channel_sender.send(NodeMessage::NetworkPeerFailed {
                    address: peer.address.clone(),
                });
                Err(err)
            }
        }
    });

    dial_task
        .await
        .map_err(|err| NodeError::Internal(err.to_string()))?
}
