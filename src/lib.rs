/*!
# Welcome to Quarry

Quarry is a minimal peer-to-peer node daemon. It exposes four RPC service
surfaces over a single listen address:

* **Info**: daemon version and uptime
* **Peering**: connect to peers, list the peer table, poll a peer
* **Mining**: current mining status
* **Transactions**: broadcast transactions into the ingress queue

Peer connections and transaction ingestion are safe under true parallel
access: many callers may connect peers and broadcast transactions at once,
and the node degrades gracefully under burst load by signalling
backpressure instead of growing without bound.

*/
pub mod connector;
pub mod crypto;
pub mod error;
pub mod info;
pub mod mempool;
pub mod miner;
pub mod networking;
pub mod node;
pub mod peer;
pub mod time;
pub mod transaction;

/// Error returned by most functions.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for quarry operations.
pub type Result<T> = std::result::Result<T, Error>;
