//! QuorumChain node — CLI entry point.
//!
//! Parses the node's identity, peer seeds and round tunables, loads its
//! wallet, and wires the ledger, the node state machine and the
//! transport/discovery collaborators into a running process.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use quorumchain_consensus::Constants;
use quorumchain_network::{spawn_broadcaster, spawn_discovery, spawn_listener, Broadcaster, PeerHandle, TcpBroadcaster};
use quorumchain_node::{run, spawn_discovery_reactor, spawn_round_timer, Node, NodeConfig, Role as NodeRole};

#[derive(Parser)]
#[clap(name = "quorumchain")]
#[clap(about = "A peer-to-peer UTXO blockchain node with round-based leader election and quorum-confirmed block commits")]
struct Cli {
    /// This node's externally reachable host/IP, as advertised to peers.
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// TCP port this node listens for peer connections on.
    #[clap(long, default_value_t = 9001)]
    port: u16,

    /// Whether this node mines blocks when elected leader.
    #[clap(long, value_enum, default_value = "user")]
    role: RoleArg,

    /// Path to the wallet file holding this node's private key.
    #[clap(long, default_value = "wallet.hex")]
    wallet: PathBuf,

    /// Known peer endpoints to seed the peer set with, one `host:port` each.
    #[clap(long = "peer", value_name = "HOST:PORT")]
    peers: Vec<String>,

    /// Optional JSON snapshot file to bootstrap the chain from at startup.
    #[clap(long)]
    snapshot: Option<PathBuf>,

    /// Broadcast address discovery probes are sent to.
    #[clap(long, default_value = "255.255.255.255")]
    discovery_broadcast: String,

    /// Seconds between the end of one round and the next MINING broadcast.
    #[clap(long, default_value_t = 60)]
    time_to_sleep: u64,

    /// Amount paid to a miner's address by a block's coinbase transaction.
    #[clap(long, default_value_t = 50)]
    miner_reward: u64,

    /// Leading hex-zero characters a block hash must exhibit to be well-formed.
    #[clap(long, default_value_t = 3)]
    difficulty: usize,

    /// Verbosity level (0-4): error, warn, info, debug, trace.
    #[clap(short, long, default_value_t = 2)]
    verbosity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum RoleArg {
    Miner,
    User,
}

impl From<RoleArg> for NodeRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Miner => NodeRole::Miner,
            RoleArg::User => NodeRole::User,
        }
    }
}

fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new().filter_level(log_level).format_timestamp_millis().init();
}

fn parse_peer(spec: &str) -> Result<PeerHandle, String> {
    let (host, port) = spec.rsplit_once(':').ok_or_else(|| format!("peer '{}' is not in HOST:PORT form", spec))?;
    let port: u16 = port.parse().map_err(|_| format!("peer '{}' has an invalid port", spec))?;
    Ok(PeerHandle::new(host, port))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    info!("starting quorumchain node");

    let wallet = match quorumchain_crypto::load_wallet(&cli.wallet) {
        Ok(wallet) => wallet,
        Err(e) => {
            error!("failed to load wallet from {}: {}", cli.wallet.display(), e);
            std::process::exit(1);
        }
    };
    let self_address = wallet.address();

    let peers = match cli.peers.iter().map(|spec| parse_peer(spec)).collect::<Result<Vec<_>, _>>() {
        Ok(peers) => peers,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let self_endpoint = PeerHandle::new(cli.host.clone(), cli.port);
    let constants = Constants { time_to_sleep: cli.time_to_sleep, miner_reward: cli.miner_reward, difficulty: cli.difficulty };

    let config = NodeConfig {
        self_endpoint: self_endpoint.clone(),
        self_address: self_address.clone(),
        role: cli.role.into(),
        initial_peers: peers,
        constants,
    };

    let broadcaster: Arc<dyn Broadcaster> = Arc::new(TcpBroadcaster);
    let (node, queue_rx, queue_tx) = Node::new(config, broadcaster);

    if let Some(snapshot_path) = &cli.snapshot {
        match quorumchain_core::load_snapshot(snapshot_path) {
            Ok(blocks) => {
                if !node.blockchain.write().await.try_to_update_chain(blocks) {
                    log::warn!("snapshot at {} did not extend the genesis-only chain, ignoring", snapshot_path.display());
                }
            }
            Err(e) => log::warn!("failed to load snapshot {}: {}", snapshot_path.display(), e),
        }
    }

    let bind_addr = format!("0.0.0.0:{}", cli.port);
    if let Err(e) = spawn_listener(&bind_addr, queue_tx.clone()).await {
        error!("failed to start TCP listener on {}: {}", bind_addr, e);
        std::process::exit(1);
    }

    let (discovered_tx, discovered_rx) = tokio::sync::mpsc::channel(64);
    if let Err(e) = spawn_discovery(self_endpoint.clone()).await {
        error!("failed to start discovery listener: {}", e);
        std::process::exit(1);
    }
    if let Err(e) =
        spawn_broadcaster(self_endpoint.clone(), node.peers.clone(), discovered_tx, &cli.discovery_broadcast).await
    {
        error!("failed to start discovery broadcaster: {}", e);
        std::process::exit(1);
    }

    spawn_discovery_reactor(node.clone(), discovered_rx);
    spawn_round_timer(node.clone());

    info!("node {} listening on {} as {:?}, wallet address {}", self_endpoint, bind_addr, cli.role, self_address);

    let dispatcher = node.clone();
    tokio::select! {
        _ = run(dispatcher, queue_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, broadcasting disconnect");
            node.disconnect().await;
        }
    }
}
