// ACard daemon: accessory link, peer discovery, session coordinator and send worker.

mod config;
mod coordinator;
mod discovery;
mod emulator;
mod identity;
mod link;
mod transport;
mod worker;

use std::sync::Arc;

use acard_core::{BridgeCore, SessionHandle};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("acard-daemon {}", VERSION);
            return Ok(());
        }
    }

    let cfg = config::load();
    init_tracing(&cfg.log_level);
    tracing::info!(version = VERSION, ?cfg, "starting");

    let emulator = Arc::new(emulator::FixedStatusEmulator::new(
        cfg.status_word,
        cfg.aids.clone(),
    ));
    let identity = Arc::new(identity::CertificateFile::new(&cfg.certificate_path));

    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    rt.block_on(async {
        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let session = SessionHandle::new();
        let core = BridgeCore::with_session(session.clone(), emulator, identity);
        let (worker, _worker_task) = worker::SendWorker::spawn(session);
        let link = transport::LinkTransport::new(events_tx.clone());

        tokio::spawn(coordinator::run_coordinator(
            core,
            events_rx,
            link.clone(),
            worker,
        ));
        let listen_port = cfg.listen_port;
        tokio::spawn(async move {
            if let Err(e) = link.run(listen_port).await {
                tracing::error!(error = %e, "accessory link stopped");
            }
        });
        tokio::spawn(discovery::run_discovery(
            cfg.discovery_port,
            cfg.discovery_window(),
            events_tx,
        ));
        shutdown_signal().await
    })?;
    tracing::info!("stopped");
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Wait for Ctrl+C or SIGTERM (Unix). On shutdown, runtime and tasks exit; systemd may restart if configured.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
