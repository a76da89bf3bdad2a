use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, Duration};
use tracing::{event, Level};
use warp::Rejection;

use crate::connector::Connector;
use crate::info::NodeInfo;
use crate::mempool::Mempool;
use crate::miner::Miner;
use crate::node::NodeMessage;
use crate::peer::{self, PeerTable};

use super::filters;

pub type Result<T> = std::result::Result<T, Rejection>;

const SWEEP_INTERVAL_MS: u64 = 10_000;

/// The RPC front-end.
///
/// Binds the info, peering, mining and transactions services on the
/// configured listen address and runs the peer housekeeping loop beside
/// the server.
pub struct Network {
    listen_addr: SocketAddr,
    configured_peers: Vec<String>,
    peer_max_idle_ms: u64,
    info: NodeInfo,
    peers_lock: Arc<RwLock<PeerTable>>,
    mempool_lock: Arc<RwLock<Mempool>>,
    miner_lock: Arc<RwLock<Miner>>,
    connector: Connector,
    broadcast_channel_sender: broadcast::Sender<NodeMessage>,
}

impl Network {
    pub fn new(
        listen_addr: SocketAddr,
        configured_peers: Vec<String>,
        peer_max_idle_ms: u64,
        info: NodeInfo,
        peers_lock: Arc<RwLock<PeerTable>>,
        mempool_lock: Arc<RwLock<Mempool>>,
        miner_lock: Arc<RwLock<Miner>>,
        connector: Connector,
        broadcast_channel_sender: broadcast::Sender<NodeMessage>,
    ) -> Network {
        Network {
            listen_addr,
            configured_peers,
            peer_max_idle_ms,
            info,
            peers_lock,
            mempool_lock,
            miner_lock,
            connector,
            broadcast_channel_sender,
        }
    }

    /// Connect once to each peer named in the settings file. There is no
    /// automatic reconnect; a failed entry stays in the table as `failed`
    /// until the sweep evicts it.
    async fn connect_configured_peers(&self) {
        for address in &self.configured_peers {
            match peer::connect_peer(
                address,
                self.peers_lock.clone(),
                &self.connector,
                &self.broadcast_channel_sender,
            )
            .await
            {
                Ok(peer) => {
                    event!(Level::INFO, "connected configured peer {}", peer.address)
                }
                Err(err) => {
                    event!(Level::WARN, "configured peer {} unavailable: {}", address, err)
                }
            }
        }
    }

    /// Periodically evict failed peers which have been idle too long.
    async fn run_sweeper(&self) -> crate::Result<()> {
        loop {
            sleep(Duration::from_millis(SWEEP_INTERVAL_MS)).await;
            let evicted = {
                let mut peers = self.peers_lock.write().await;
                peers.sweep_failed(self.peer_max_idle_ms)
            };
            if evicted > 0 {
                event!(Level::INFO, "evicted {} stale peers", evicted);
            }
        }
    }

    /// Runs warp::serve to listen for incoming connections.
    async fn run_server(&self) -> crate::Result<()> {
        let routes = filters::routes(
            self.info.clone(),
            self.peers_lock.clone(),
            self.mempool_lock.clone(),
            self.miner_lock.clone(),
            self.connector.clone(),
            self.broadcast_channel_sender.clone(),
        );
        warp::serve(routes).run(self.listen_addr).await;
        Ok(())
    }

    pub async fn run(&self) -> crate::Result<()> {
        self.connect_configured_peers().await;
        tokio::select! {
            res = self.run_server() => res,
            res = self.run_sweeper() => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::handlers::{
        BroadcastTransactionReply, BroadcastTransactionRequest, ConnectPeerRequest, ErrorReply,
        UptimeReply, VersionReply,
    };
    use crate::miner::MiningStatus;
    use crate::peer::{Peer, PeerState};
    use crate::time::create_timestamp;
    use tokio::net::TcpListener;
    use warp::http::StatusCode;

    struct TestNode {
        info: NodeInfo,
        peers_lock: Arc<RwLock<PeerTable>>,
        mempool_lock: Arc<RwLock<Mempool>>,
        miner_lock: Arc<RwLock<Miner>>,
        connector: Connector,
        broadcast_channel_sender: broadcast::Sender<NodeMessage>,
    }

    impl TestNode {
        fn new() -> TestNode {
            let (broadcast_channel_sender, _) = broadcast::channel(32);
            TestNode {
                info: NodeInfo::new(),
                peers_lock: Arc::new(RwLock::new(PeerTable::new(
                    "127.0.0.1:2080".parse().unwrap(),
                ))),
                mempool_lock: Arc::new(RwLock::new(Mempool::new(1024, 8))),
                miner_lock: Arc::new(RwLock::new(Miner::new(1))),
                connector: Connector::new(Duration::from_millis(500)),
                broadcast_channel_sender,
            }
        }

        fn routes(
            &self,
        ) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible>
               + Clone {
            filters::routes(
                self.info.clone(),
                self.peers_lock.clone(),
                self.mempool_lock.clone(),
                self.miner_lock.clone(),
                self.connector.clone(),
                self.broadcast_channel_sender.clone(),
            )
        }
    }

    #[tokio::test]
    async fn test_version_route() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("GET")
            .path("/info/version")
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let reply: VersionReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_uptime_route() {
        let node = TestNode::new();
        let routes = node.routes();
        let resp = warp::test::request()
            .method("GET")
            .path("/info/uptime")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let first: UptimeReply = serde_json::from_slice(resp.body()).unwrap();

        let resp = warp::test::request()
            .method("GET")
            .path("/info/uptime")
            .reply(&routes)
            .await;
        let second: UptimeReply = serde_json::from_slice(resp.body()).unwrap();
        assert!(second.uptime_ms >= first.uptime_ms);
    }

    #[tokio::test]
    async fn test_mining_info_route() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("GET")
            .path("/mining/info")
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let status: MiningStatus = serde_json::from_slice(resp.body()).unwrap();
        assert!(!status.is_active);
        assert_eq!(status.n_workers, 1);
    }

    #[tokio::test]
    async fn test_unknown_route_is_unknown_method() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("GET")
            .path("/no/such/method")
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let reply: ErrorReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.error, "unknown-method");
    }

    #[tokio::test]
    async fn test_connect_to_self_is_rejected() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("POST")
            .path("/peering/connect")
            .json(&ConnectPeerRequest {
                address: "127.0.0.1:2080".to_string(),
            })
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let reply: ErrorReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.error, "self-connection");
    }

    #[tokio::test]
    async fn test_connect_with_nothing_listening_is_a_dial_error() {
        let node = TestNode::new();
        let routes = node.routes();
        let resp = warp::test::request()
            .method("POST")
            .path("/peering/connect")
            .json(&ConnectPeerRequest {
                address: "127.0.0.1:13321".to_string(),
            })
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let reply: ErrorReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.error, "dial-error");

        // the failed dial is committed, not left pending
        let resp = warp::test::request()
            .method("GET")
            .path("/peering/poll/127.0.0.1:13321")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let peer: Peer = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(peer.state, PeerState::Failed);
    }

    #[tokio::test]
    async fn test_connect_list_and_repeat_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let reachable = listener.local_addr().unwrap().to_string();

        let node = TestNode::new();
        let routes = node.routes();
        let resp = warp::test::request()
            .method("POST")
            .path("/peering/connect")
            .json(&ConnectPeerRequest {
                address: reachable.clone(),
            })
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let peer: Peer = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(peer.state, PeerState::Connected);

        let resp = warp::test::request()
            .method("GET")
            .path("/peering/list")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let listed: Vec<Peer> = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].address, reachable);

        let resp = warp::test::request()
            .method("POST")
            .path("/peering/connect")
            .json(&ConnectPeerRequest { address: reachable })
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let reply: ErrorReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.error, "already-connected");
    }

    #[tokio::test]
    async fn test_poll_of_unknown_peer() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("GET")
            .path("/peering/poll/127.0.0.1:4000")
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let reply: ErrorReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.error, "unknown-peer");
    }

    #[tokio::test]
    async fn test_broadcast_transaction() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("POST")
            .path("/transactions/broadcast")
            .json(&BroadcastTransactionRequest {
                timestamp: Some(create_timestamp()),
                binary: hex::encode([1u8, 2, 3, 4]),
                aux_data: None,
            })
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let reply: BroadcastTransactionReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.hash.len(), 64);
        assert_eq!(node.mempool_lock.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_oversized_payload() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("POST")
            .path("/transactions/broadcast")
            .json(&BroadcastTransactionRequest {
                timestamp: Some(create_timestamp()),
                binary: hex::encode(vec![0u8; 2048]),
                aux_data: None,
            })
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let reply: ErrorReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.error, "payload-too-large");
        assert!(node.mempool_lock.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_without_timestamp_is_malformed() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("POST")
            .path("/transactions/broadcast")
            .header("content-type", "application/json")
            .body(r#"{"binary":"01020304"}"#)
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let reply: ErrorReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.error, "malformed-transaction");
        assert!(node.mempool_lock.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_with_invalid_json_body_is_a_transport_error() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("POST")
            .path("/transactions/broadcast")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let reply: ErrorReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.error, "transport-error");
    }

    #[tokio::test]
    async fn test_broadcast_with_bad_hex_is_malformed() {
        let node = TestNode::new();
        let resp = warp::test::request()
            .method("POST")
            .path("/transactions/broadcast")
            .json(&BroadcastTransactionRequest {
                timestamp: Some(create_timestamp()),
                binary: "zzzz".to_string(),
                aux_data: None,
            })
            .reply(&node.routes())
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let reply: ErrorReply = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(reply.error, "malformed-transaction");
    }
}
