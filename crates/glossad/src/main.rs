//! glossad — Glossa session coordination daemon.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use glossa_core::config::GlossaConfig;
use glossa_services::{
    registry, LedgerGateway, LivenessMonitor, LivenessTable, Notifier, RpcLedgerClient,
    SessionRegistry, SessionTerminator,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = GlossaConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = GlossaConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        GlossaConfig::default()
    });

    tracing::info!(
        bind = %config.api.bind,
        port = config.api.port,
        "glossad starting"
    );

    if config.ledger.escrow_address.is_empty() {
        tracing::warn!("no escrow contract configured — settling from caller context only");
    } else {
        tracing::info!(
            rpc_url = %config.ledger.rpc_url,
            escrow = %config.ledger.escrow_address,
            currency = %config.ledger.currency,
            "escrow ledger configured"
        );
    }

    // ── Shared state ─────────────────────────────────────────────────────────

    let registry = SessionRegistry::new();
    let notifier = Notifier::new();
    let liveness = LivenessTable::new();

    let rpc = RpcLedgerClient::new(&config.ledger)?;
    let ledger = LedgerGateway::new(Arc::new(rpc), &config.ledger);

    let terminator = Arc::new(SessionTerminator::new(
        registry.clone(),
        ledger.clone(),
        notifier.clone(),
        liveness.clone(),
        &config.ledger,
    ));

    let monitor = Arc::new(LivenessMonitor::new(
        liveness.clone(),
        terminator.clone(),
        &config.liveness,
    ));

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

    let api_task = {
        let state = glossa_api::ApiState {
            registry: registry.clone(),
            ledger: ledger.clone(),
            terminator: terminator.clone(),
            monitor: monitor.clone(),
            liveness: liveness.clone(),
            notifier: notifier.clone(),
            started_at: Instant::now(),
            shutdown_tx: shutdown_tx.clone(),
        };
        let bind = config.api.bind.clone();
        let port = config.api.port;
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = glossa_api::serve(state, bind, port, shutdown).await {
                tracing::error!(error = %e, "api server failed");
            }
        })
    };

    let purge_task = tokio::spawn(registry::purge_loop(
        registry.clone(),
        config.registry.purge_interval_secs,
        config.registry.mapping_ttl_secs,
        shutdown_tx.subscribe(),
    ));

    let monitor_task = tokio::spawn(monitor.clone().run(shutdown_tx.subscribe()));

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = api_task           => tracing::error!("api server exited: {:?}", r),
        r = purge_task         => tracing::error!("registry purge loop exited: {:?}", r),
        r = monitor_task       => tracing::error!("liveness monitor exited: {:?}", r),
    }

    Ok(())
}
