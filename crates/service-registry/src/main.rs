use anyhow::Context;
use service_registry::api;
use service_registry::config::duration_from_env;
use service_registry::maintenance::{run_reaper, ReaperSettings};
use service_registry::{RegistryConfig, ServiceRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RegistryConfig::from_env();
    tracing::info!("Connecting to etcd at: {:?}", config.endpoints);

    let registry = Arc::new(
        ServiceRegistry::connect(&config)
            .await
            .context("Failed to connect to etcd")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reap_interval = duration_from_env("REGISTRY_REAP_INTERVAL_SECS", Duration::from_secs(60));
    let reaper = if reap_interval.is_zero() {
        tracing::info!("Reaper disabled");
        None
    } else {
        let settings = ReaperSettings {
            interval: reap_interval,
            stale_after: duration_from_env(
                "REGISTRY_STALE_AFTER_SECS",
                Duration::from_secs(api::DEFAULT_STALE_TIMEOUT_SECS),
            ),
        };
        Some(tokio::spawn(run_reaper(registry.clone(), settings, shutdown_rx.clone())))
    };

    let app = api::router(registry);

    let bind = std::env::var("REGISTRY_BIND").unwrap_or_else(|_| "0.0.0.0:3003".to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    tracing::info!("Service registry listening on {}", listener.local_addr()?);

    let mut server_shutdown = shutdown_rx;
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        // resolves once the flag flips or the sender goes away
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    });

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                // keep the sender alive so the server is not stopped by accident
                std::future::pending::<()>().await;
            }
        }
    });

    server.await.context("Server error")?;

    if let Some(reaper) = reaper {
        let removed = reaper.await.context("Reaper task failed")?;
        tracing::info!("Reaper removed {} service(s) during this run", removed);
    }
    Ok(())
}
