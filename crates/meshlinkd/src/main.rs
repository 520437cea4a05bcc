//! meshlinkd — mesh node daemon.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::io::BufReader;
use tokio::task::JoinError;

use meshlink_core::config::MeshlinkConfig;
use meshlink_services::{
    event_channel, state_channel, Channels, Dispatcher, Identity, MeshTransport, NodeRegistry,
};

mod bridge;
mod console;
mod receive;
mod transmit;
mod udp_mesh;

use udp_mesh::{beacon, listener, UdpMesh};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = MeshlinkConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = MeshlinkConfig::load().context("failed to load configuration")?;

    tracing::info!(
        logical_id = %config.node.logical_id,
        address = %config.node.address,
        role = %config.mesh.role,
        root = %config.mesh.root_address,
        bind = %config.mesh.bind,
        "meshlinkd starting"
    );

    // Mesh transport
    let (mesh, mesh_socket) = UdpMesh::bind(&config.mesh, config.node.address)?;
    tracing::info!(socket = %mesh.local_socket()?, peers = config.mesh.peers.len(), "mesh socket bound");
    let transport: Arc<dyn MeshTransport> = mesh.clone();

    // Local collaborators
    let bridge = Arc::new(bridge::JsonLinesBridge::stdout());
    let indicator = Arc::new(console::LogIndicator::new());
    let trigger = Arc::new(console::ConsoleTrigger::new());

    let dispatcher = Dispatcher::new(
        NodeRegistry::with_capacity(config.routing.registry_capacity),
        bridge,
        indicator.clone(),
        Channels::from(&config.bridge),
    )
    .with_forward_rejected(config.routing.forward_rejected_peers);

    let (events_tx, events_rx) = event_channel();
    let (state_tx, state_rx) = state_channel();

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let listener_task = tokio::spawn(listener::listener_loop(
        mesh.clone(),
        mesh_socket,
        events_tx.clone(),
        shutdown_tx.subscribe(),
    ));

    let beacon_task = tokio::spawn(beacon::beacon_loop(
        mesh.clone(),
        config.mesh.beacon_interval(),
        shutdown_tx.subscribe(),
    ));

    let expiry_task = tokio::spawn(listener::expiry_loop(
        mesh.clone(),
        config.mesh.peer_ttl(),
        events_tx.clone(),
        shutdown_tx.subscribe(),
    ));

    let receive_task = tokio::spawn(
        receive::ReceiveLoop::new(
            events_rx,
            dispatcher,
            transport.clone(),
            state_tx,
            shutdown_tx.subscribe(),
        )
        .run(),
    );

    let transmit_task = tokio::spawn(
        transmit::TransmitLoop::new(
            &config,
            Identity::new(transport.clone(), state_rx),
            transport,
            trigger.clone(),
            indicator,
            shutdown_tx.subscribe(),
        )
        .run(),
    );

    // Console input ends with stdin; the node keeps running without it.
    tokio::spawn(console::input_loop(
        BufReader::new(tokio::io::stdin()),
        trigger,
        shutdown_tx.subscribe(),
    ));

    mesh.announce_startup(&events_tx).await?;
    drop(events_tx);

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    let (task, result) = tokio::select! {
        _ = shutdown_rx.recv() => {
            tracing::info!("shutting down");
            return Ok(());
        }
        r = listener_task       => ("listener task", r),
        r = beacon_task         => ("beacon task", r),
        r = expiry_task         => ("expiry task", r),
        r = receive_task        => ("receive loop", r),
        r = transmit_task       => ("transmit loop", r),
    };
    tracing::error!(task, "task exited: {:?}", result);
    Err(task_exit(task, result))
}

/// Turn an unexpected task exit into the daemon's error.
fn task_exit(task: &str, result: Result<Result<()>, JoinError>) -> anyhow::Error {
    match result {
        Ok(Ok(())) => anyhow!("{task} exited unexpectedly"),
        Ok(Err(e)) => e.context(format!("{task} failed")),
        Err(e) => anyhow::Error::new(e).context(format!("{task} panicked or was cancelled")),
    }
}
