use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{event, Level};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::connector::Connector;
use crate::error::NodeError;
use crate::info::NodeInfo;
use crate::mempool::Mempool;
use crate::miner::Miner;
use crate::node::NodeMessage;
use crate::peer::{self, PeerTable};
use crate::transaction::Transaction;

use super::network::Result;

/// Error body returned for every failed call: a stable kind plus detail.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorReply {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VersionReply {
    pub version: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UptimeReply {
    pub uptime_ms: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConnectPeerRequest {
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BroadcastTransactionRequest {
    #[serde(default)]
    pub timestamp: Option<u64>,
    pub binary: String,
    #[serde(default)]
    pub aux_data: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BroadcastTransactionReply {
    pub hash: String,
}

fn status_for(err: &NodeError) -> StatusCode {
    match err {
        NodeError::InvalidAddress(_)
        | NodeError::SelfConnection
        | NodeError::MalformedTransaction(_)
        | NodeError::Transport(_) => StatusCode::BAD_REQUEST,
        NodeError::AlreadyConnected(_) => StatusCode::CONFLICT,
        NodeError::UnknownPeer(_) | NodeError::UnknownMethod => StatusCode::NOT_FOUND,
        NodeError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        NodeError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
        NodeError::Dial(_) => StatusCode::BAD_GATEWAY,
        NodeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(err: NodeError) -> warp::reply::Response {
    let status = status_for(&err);
    let body = ErrorReply {
        error: err.kind().to_string(),
        message: err.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn json_reply<T: Serialize>(body: &T) -> warp::reply::Response {
    warp::reply::json(body).into_response()
}

pub async fn version_handler(info: NodeInfo) -> Result<impl Reply> {
    Ok(json_reply(&VersionReply {
        version: info.get_version(),
    }))
}

pub async fn uptime_handler(info: NodeInfo) -> Result<impl Reply> {
    Ok(json_reply(&UptimeReply {
        uptime_ms: info.get_uptime().as_millis() as u64,
    }))
}

pub async fn mining_info_handler(miner_lock: Arc<RwLock<Miner>>) -> Result<impl Reply> {
    let miner = miner_lock.read().await;
    Ok(json_reply(&miner.get_status()))
}

pub async fn connect_peer_handler(
    request: ConnectPeerRequest,
    peers_lock: Arc<RwLock<PeerTable>>,
    connector: Connector,
    broadcast_channel_sender: broadcast::Sender<NodeMessage>,
) -> Result<impl Reply> {
    match peer::connect_peer(
        &request.address,
        peers_lock,
        &connector,
        &broadcast_channel_sender,
    )
    .await
    {
        Ok(peer) => Ok(json_reply(&peer)),
        Err(err) => {
            event!(Level::WARN, "connect {} failed: {}", request.address, err);
            Ok(error_reply(err))
        }
    }
}

pub async fn list_peers_handler(peers_lock: Arc<RwLock<PeerTable>>) -> Result<impl Reply> {
    let peers = peers_lock.read().await;
    Ok(json_reply(&peers.list()))
}

pub async fn poll_peer_handler(
    address: String,
    peers_lock: Arc<RwLock<PeerTable>>,
) -> Result<impl Reply> {
    let peers = peers_lock.read().await;
    match peers.poll(&address) {
        Ok(peer) => Ok(json_reply(&peer)),
        Err(err) => Ok(error_reply(err)),
    }
}

pub async fn broadcast_transaction_handler(
    request: BroadcastTransactionRequest,
    mempool_lock: Arc<RwLock<Mempool>>,
) -> Result<impl Reply> {
    let transaction = match decode_transaction(request) {
        Ok(transaction) => transaction,
        Err(err) => return Ok(error_reply(err)),
    };
    let result = {
        let mut mempool = mempool_lock.write().await;
        mempool.try_enqueue(transaction)
    };
    match result {
        Ok(tx_hash) => Ok(json_reply(&BroadcastTransactionReply {
            hash: hex::encode(tx_hash),
        })),
        Err(err) => Ok(error_reply(err)),
    }
}

fn decode_transaction(
    request: BroadcastTransactionRequest,
) -> std::result::Result<Transaction, NodeError> {
    let timestamp = request
        .timestamp
        .ok_or_else(|| NodeError::MalformedTransaction("timestamp is required".to_string()))?;
    let binary = hex::decode(&request.binary)
        .map_err(|_| NodeError::MalformedTransaction("binary is not valid hex".to_string()))?;
    let aux_data = match request.aux_data {
        Some(aux) => hex::decode(&aux)
            .map_err(|_| NodeError::MalformedTransaction("aux_data is not valid hex".to_string()))?,
        None => vec![],
    };
    Ok(Transaction::new(timestamp, binary, aux_data))
}

/// Rejection recovery. An unmatched path or method is an unknown method;
/// anything unexpected that escapes a handler is reported as an internal
/// fault instead of killing the server.
///
/// Body rejections are checked first: a matched POST route whose body
/// failed carries a method-not-allowed rejection from its sibling GET
/// routes in the `or` chain, and that must not mask the body error.
pub async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let reply = if let Some(body_err) = err.find::<warp::body::BodyDeserializeError>() {
        error_reply(NodeError::Transport(body_err.to_string()))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_reply(NodeError::PayloadTooLarge {
            size: 0,
            max: super::filters::TRANSPORT_BODY_LIMIT as usize,
        })
    } else if err.is_not_found() || err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(NodeError::UnknownMethod)
    } else {
        event!(Level::ERROR, "unhandled rejection: {:?}", err);
        error_reply(NodeError::Internal(format!("{:?}", err)))
    };
    Ok(reply)
}
