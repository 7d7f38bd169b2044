//! vigild: distributed polling lease coordinator daemon.
//! Single-process binary wiring the KV adapter, lease manager, and poll
//! scheduler together.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

mod cli;
mod config;
mod nodes_summary;

use config::ProcessConfig;
use vigil_kv::{KvStore, RedisKvStore};
use vigil_lease::LeaseManager;
use vigil_poll::{EndpointSpec, PollScheduler, ReqwestUpstreamClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let opts = match cli.command {
        Some(cli::Command::Run(opts)) => opts,
        None => cli::RunOpts::default(),
    };

    let config = ProcessConfig::load(&opts)?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log_filter.clone()))
        .init();

    tracing::info!("vigild starting");

    let store = RedisKvStore::connect(&config.kv_url).await?;
    let store: Arc<dyn KvStore> = Arc::new(store);

    let id = vigil_lease::generate_instance_id(config.node_name.as_deref());
    tracing::info!(instance_id = %id, "instance identity assigned");

    let manager = LeaseManager::new(id, config.lease.clone(), store);
    manager.start().await?;

    let http = reqwest::Client::builder().build()?;
    let upstream = Arc::new(ReqwestUpstreamClient::new(http));
    // Keep a permanent subscriber alive so `publish` never sends into a
    // channel with zero receivers; an embedding router subscribes
    // separately via `BroadcastEventSink::subscribe`.
    let (sink, _events_rx) = vigil_poll::BroadcastEventSink::new(256);
    let scheduler = PollScheduler::new(
        manager.clone(),
        upstream,
        config.upstream_base_url.clone(),
        Arc::new(sink),
        EndpointSpec::defaults(),
        Duration::from_secs(2),
    );
    scheduler.start().await;

    wait_for_shutdown_signal().await;
    tracing::info!("shutting down");

    scheduler.stop().await;
    manager.stop().await;

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("received ctrl-c"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received ctrl-c");
    }
}
