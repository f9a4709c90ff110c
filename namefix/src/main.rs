use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use mdns_sd::ServiceDaemon;
use anyhow::{Context, Result};
use namefix::config::Config;
use namefix::session::{Session, Update};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("namefix=info"))
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let config = Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path))?;
            tracing::info!("Loaded config from {}", path);
            config
        }
        None => Config::default(),
    };

    let daemon = ServiceDaemon::new()
        .context("Failed to create mDNS daemon")?;

    let (mut session, mut bus_rx) = Session::new(Arc::new(config), Arc::new(daemon.clone()));
    session.start()?;

    let mut hangup = signal(SignalKind::hangup())
        .context("Failed to listen for SIGHUP")?;

    tracing::info!("Watching for printers; SIGHUP reloads, Ctrl-C quits");

    loop {
        tokio::select! {
            Some(message) = bus_rx.recv() => {
                match session.handle(message) {
                    Update::Registry => {
                        tracing::info!("{} printer(s) on the network", session.registry().len());
                        for record in session.registry().entries() {
                            tracing::info!(
                                "  {} -> {} ({})",
                                record.display_name(),
                                record.server,
                                record.admin_url.as_deref().unwrap_or("no admin url")
                            );
                        }
                    }
                    Update::Workflow(request) => {
                        if let Some(view) = session.workflow(request) {
                            tracing::info!("{} [{}] {}", request, view.progress, view.message);
                        }
                    }
                    Update::Ignored => {}
                }
            }
            _ = hangup.recv() => {
                if let Err(e) = session.reload().await {
                    tracing::error!("Reload failed: {:#}", e);
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for ctrl-c")?;
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    session.shutdown().await;

    // Shutdown mDNS daemon
    if let Err(e) = daemon.shutdown() {
        tracing::error!("Failed to shutdown mDNS daemon: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
