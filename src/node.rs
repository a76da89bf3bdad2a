use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{App, Arg};
use tokio::sync::{broadcast, RwLock};
use tracing::{event, Level};

use crate::connector::Connector;
use crate::crypto::Hash32;
use crate::info::NodeInfo;
use crate::mempool::Mempool;
use crate::miner::Miner;
use crate::networking::network::Network;
use crate::networking::signals::signal_for_shutdown;
use crate::peer::PeerTable;

///
/// Quarry has the following system-wide messages which may be sent and
/// received over the main broadcast channel. Convention has the message
/// begin with the class that is broadcasting.
///
#[derive(Clone, Debug)]
pub enum NodeMessage {
    // broadcast when a dial staked out by the peer table completes
    NetworkPeerConnected { address: String },
    // broadcast when a dial fails and the entry is marked failed
    NetworkPeerFailed { address: String },
    // broadcast when the mempool hands a transaction downstream
    MempoolNewTransaction { hash: Hash32 },
}

///
/// The entry point to the quarry runtime
///
pub async fn run() -> crate::Result<()> {
    //
    // handle command-line arguments
    //
    let matches = App::new("Quarry Runtime")
        .about("Runs a quarry node")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("config file name"),
        )
        .arg(
            Arg::with_name("rpc-bind")
                .long("rpc-bind")
                .takes_value(true)
                .help("listen address for the RPC front-end"),
        )
        .arg(
            Arg::with_name("mining-threads")
                .long("mining-threads")
                .takes_value(true)
                .help("number of mining workers"),
        )
        .get_matches();

    let config_name = matches.value_of("config").unwrap_or("config");
    let mut settings = config::Config::default();
    settings.merge(config::File::with_name(config_name).required(false))?;
    if let Some(rpc_bind) = matches.value_of("rpc-bind") {
        settings.set("network.rpc_bind", rpc_bind)?;
    }
    if let Some(mining_threads) = matches.value_of("mining-threads") {
        settings.set("miner.n_workers", mining_threads)?;
    }

    let rpc_bind: SocketAddr = settings
        .get::<String>("network.rpc_bind")
        .unwrap_or_else(|_| String::from("127.0.0.1:2080"))
        .parse()?;
    let dial_timeout_ms = settings.get::<u64>("network.dial_timeout_ms").unwrap_or(3000);
    let peer_max_idle_ms = settings
        .get::<u64>("network.peer_max_idle_ms")
        .unwrap_or(600_000);
    let configured_peers = settings
        .get::<Vec<String>>("network.peers")
        .unwrap_or_default();
    let max_payload_size = settings
        .get::<usize>("mempool.max_payload_size")
        .unwrap_or(1024 * 1024);
    let max_queue_len = settings.get::<usize>("mempool.max_queue_len").unwrap_or(1024);
    let n_workers = settings.get::<u16>("miner.n_workers").unwrap_or(1);

    //
    // create main broadcast channel
    //
    // all major classes have send/receive access to the main broadcast
    // channel, and can communicate by sending the events listed in the
    // NodeMessage list above.
    //
    let (broadcast_channel_sender, _broadcast_channel_receiver) = broadcast::channel(32);

    //
    // instantiate core classes
    //
    // all major classes which require multithread read / write access are
    // wrapped in tokio::RwLock for read().await / write().await access.
    // a clone of the RwLock goes to every object that needs direct access.
    //
    let info = NodeInfo::new();
    let peers_lock = Arc::new(RwLock::new(PeerTable::new(rpc_bind)));
    let mempool_lock = Arc::new(RwLock::new(Mempool::new(max_payload_size, max_queue_len)));
    let miner_lock = Arc::new(RwLock::new(Miner::new(n_workers)));
    let connector = Connector::new(Duration::from_millis(dial_timeout_ms));

    let network = Network::new(
        rpc_bind,
        configured_peers,
        peer_max_idle_ms,
        info,
        peers_lock.clone(),
        mempool_lock.clone(),
        miner_lock.clone(),
        connector,
        broadcast_channel_sender.clone(),
    );

    event!(Level::INFO, "quarry node listening on {}", rpc_bind);

    tokio::select! {

        //
        // Network
        //
        res = network.run() => {
            if let Err(err) = res {
                event!(Level::ERROR, "network err {:?}", err)
            }
        },

        //
        // Mempool
        //
        res = crate::mempool::run(
            mempool_lock.clone(),
            broadcast_channel_sender.clone(),
        ) => {
            if let Err(err) = res {
                event!(Level::ERROR, "mempool err {:?}", err)
            }
        },

        //
        // Miner
        //
        res = crate::miner::run(
            miner_lock.clone(),
            broadcast_channel_sender.subscribe(),
        ) => {
            if let Err(err) = res {
                event!(Level::ERROR, "miner err {:?}", err)
            }
        },

        //
        // Shutdown
        //
        _ = signal_for_shutdown() => {
            event!(Level::INFO, "shutting down");
        }
    }

    Ok(())
}
