//! IPC Process daemon: the CLI surface, configuration, and process-wide
//! context that wires up `ipcpd-control`'s components into a running node.
//!
//! This crate owns no RINA semantics of its own — `control` has all of it.
//! What lives here is argument parsing, config loading, logging, and the
//! top-level `run` that a thin `main.rs` delegates to.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod ipcp_factory;
mod logger;
mod management_sdu_pump;
mod neighbor_keepalive_sweep;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use control::{event_loop::EventLoop, kernel_client::KernelClient, model::Apni};
use tokio::net::TcpListener;

use config::{Cli, Config};
use context::NodeContext;
use management_sdu_pump::ManagementSduPump;
use neighbor_keepalive_sweep::NeighborKeepaliveSweep;

const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_KERNEL_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Parse configuration, install the logger, build the node's
/// `NodeContext`, and run until the kernel control channel closes.
///
/// In place of an actual in-kernel module (out of scope, §1), the control
/// channel is a loopback TCP connection: this process binds
/// `control_channel_port` (`0` lets the OS choose, matching §6.3's "IPC
/// Manager may be started without a fixed port") and accepts the kernel's
/// one connection.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli)?;
    logger::init(&config.log)?;

    let local_ipcp_id = cli.ipcp_id.unwrap_or(0);
    let (stream, bound_port) = accept_control_channel(config.control_channel_port.unwrap_or(0)).await?;
    log::info!("kernel control channel connected on port {bound_port}");

    let kernel = Arc::new(KernelClient::spawn(local_ipcp_id, stream, DEFAULT_KERNEL_REQUEST_TIMEOUT));
    let event_loop = EventLoop::new(DEFAULT_EVENT_QUEUE_CAPACITY);
    let context = Arc::new(NodeContext::new(kernel, event_loop.sender()));

    if cli.is_ipcp_spawn() {
        let ipcp_id = cli.ipcp_id.expect("is_ipcp_spawn checked ipcp_id.is_some()");
        let process_name = cli.process_name.clone().expect("is_ipcp_spawn checked process_name.is_some()");
        let mut name = Apni::new(process_name);
        if let Some(instance) = &cli.process_instance {
            name = name.with_process_instance(instance.clone());
        }

        context.ipcps.create(ipcp_id, name)?;
        log::info!("IPCP {ipcp_id} created");
    } else {
        log::info!("running as the IPC Manager");
    }

    event_loop.register_source(ManagementSduPump::new(context.clone()));
    event_loop.register_source(NeighborKeepaliveSweep::new(
        context.clone(),
        config.keepalive_interval_ms,
        config.max_enrollment_attempts,
    ));

    run_event_loop(context, event_loop).await
}

async fn accept_control_channel(port: u16) -> anyhow::Result<(tokio::net::TcpStream, u16)> {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let listener = TcpListener::bind(addr).await?;
    let bound_port = listener.local_addr()?.port();
    let (stream, _peer) = listener.accept().await?;
    Ok((stream, bound_port))
}

/// The single-threaded dispatch loop (§4.8, §5): every event that reaches
/// this node — a CDAP request from a peer, a locally requested
/// allocation/enrollment, a timer — is pattern-matched in `dispatch` and
/// handed to the component that owns it.
async fn run_event_loop(context: Arc<NodeContext>, mut event_loop: EventLoop) -> anyhow::Result<()> {
    loop {
        match event_loop.wait().await {
            Some(event) => dispatch::dispatch(&context, &mut event_loop, event).await,
            None => {
                log::info!("event queue closed, shutting down");
                return Ok(());
            }
        }
    }
}
