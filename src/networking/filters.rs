use std::convert::Infallible;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use warp::{Filter, Rejection, Reply};

use crate::connector::Connector;
use crate::info::NodeInfo;
use crate::mempool::Mempool;
use crate::miner::Miner;
use crate::node::NodeMessage;
use crate::peer::PeerTable;

use super::handlers;

/// Transport-level cap on request bodies, above the mempool's own payload
/// cap so the mempool error is what callers normally see.
pub const TRANSPORT_BODY_LIMIT: u64 = 4 * 1024 * 1024;

/// All service routes plus rejection recovery.
pub fn routes(
    info: NodeInfo,
    peers_lock: Arc<RwLock<PeerTable>>,
    mempool_lock: Arc<RwLock<Mempool>>,
    miner_lock: Arc<RwLock<Miner>>,
    connector: Connector,
    broadcast_channel_sender: broadcast::Sender<NodeMessage>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    version_route_filter(info.clone())
        .or(uptime_route_filter(info))
        .or(mining_info_route_filter(miner_lock))
        .or(connect_peer_route_filter(
            peers_lock.clone(),
            connector,
            broadcast_channel_sender,
        ))
        .or(list_peers_route_filter(peers_lock.clone()))
        .or(poll_peer_route_filter(peers_lock))
        .or(broadcast_transaction_route_filter(mempool_lock))
        .recover(handlers::handle_rejection)
}

/// GET /info/version
pub fn version_route_filter(
    info: NodeInfo,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path("info"))
        .and(warp::path("version"))
        .and(warp::path::end())
        .and(with_info(info))
        .and_then(handlers::version_handler)
}

/// GET /info/uptime
pub fn uptime_route_filter(
    info: NodeInfo,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path("info"))
        .and(warp::path("uptime"))
        .and(warp::path::end())
        .and(with_info(info))
        .and_then(handlers::uptime_handler)
}

/// GET /mining/info
pub fn mining_info_route_filter(
    miner_lock: Arc<RwLock<Miner>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path("mining"))
        .and(warp::path("info"))
        .and(warp::path::end())
        .and(with_miner(miner_lock))
        .and_then(handlers::mining_info_handler)
}

/// POST /peering/connect
pub fn connect_peer_route_filter(
    peers_lock: Arc<RwLock<PeerTable>>,
    connector: Connector,
    broadcast_channel_sender: broadcast::Sender<NodeMessage>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::post()
        .and(warp::path("peering"))
        .and(warp::path("connect"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(TRANSPORT_BODY_LIMIT))
        .and(warp::body::json())
        .and(with_peers(peers_lock))
        .and(with_connector(connector))
        .and(with_broadcast_sender(broadcast_channel_sender))
        .and_then(handlers::connect_peer_handler)
}

/// GET /peering/list
pub fn list_peers_route_filter(
    peers_lock: Arc<RwLock<PeerTable>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path("peering"))
        .and(warp::path("list"))
        .and(warp::path::end())
        .and(with_peers(peers_lock))
        .and_then(handlers::list_peers_handler)
}

/// GET /peering/poll/<address>
pub fn poll_peer_route_filter(
    peers_lock: Arc<RwLock<PeerTable>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get()
        .and(warp::path("peering"))
        .and(warp::path("poll"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(with_peers(peers_lock))
        .and_then(handlers::poll_peer_handler)
}

/// POST /transactions/broadcast
pub fn broadcast_transaction_route_filter(
    mempool_lock: Arc<RwLock<Mempool>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::post()
        .and(warp::path("transactions"))
        .and(warp::path("broadcast"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(TRANSPORT_BODY_LIMIT))
        .and(warp::body::json())
        .and(with_mempool(mempool_lock))
        .and_then(handlers::broadcast_transaction_handler)
}

/// inject node info
fn with_info(info: NodeInfo) -> impl Filter<Extract = (NodeInfo,), Error = Infallible> + Clone {
    warp::any().map(move || info.clone())
}

/// inject peer table lock
fn with_peers(
    peers_lock: Arc<RwLock<PeerTable>>,
) -> impl Filter<Extract = (Arc<RwLock<PeerTable>>,), Error = Infallible> + Clone {
    warp::any().map(move || peers_lock.clone())
}

/// inject mempool lock
fn with_mempool(
    mempool_lock: Arc<RwLock<Mempool>>,
) -> impl Filter<Extract = (Arc<RwLock<Mempool>>,), Error = Infallible> + Clone {
    warp::any().map(move || mempool_lock.clone())
}

/// inject miner lock
fn with_miner(
    miner_lock: Arc<RwLock<Miner>>,
) -> impl Filter<Extract = (Arc<RwLock<Miner>>,), Error = Infallible> + Clone {
    warp::any().map(move || miner_lock.clone())
}

/// inject connector
fn with_connector(
    connector: Connector,
) -> impl Filter<Extract = (Connector,), Error = Infallible> + Clone {
    warp::any().map(move || connector.clone())
}

/// inject broadcast channel sender
fn with_broadcast_sender(
    broadcast_channel_sender: broadcast::Sender<NodeMessage>,
) -> impl Filter<Extract = (broadcast::Sender<NodeMessage>,), Error = Infallible> + Clone {
    warp::any().map(move || broadcast_channel_sender.clone())
}
