use crate::client::RegistryClient;
use crate::error::{RegistryError, Result};
use crate::ServiceRecord;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Liveness window used when picking an endpoint for a service type.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub heartbeat_interval: Duration,
    pub register_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            register_attempts: 30,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Everything the heartbeat loop needs, passed in rather than kept globally.
pub struct HeartbeatContext {
    pub client: RegistryClient,
    pub service: ServiceRecord,
    pub interval: Duration,
    pub shutdown: watch::Receiver<bool>,
}

/// A registered service with a running heartbeat task.
pub struct ServiceHandle {
    service: ServiceRecord,
    client: RegistryClient,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    pub fn service(&self) -> &ServiceRecord {
        &self.service
    }

    pub fn service_id(&self) -> &str {
        &self.service.service_id
    }

    /// Stop heartbeating and deregister.
    pub async fn shutdown(self) -> Result<()> {
        // the loop may already have exited on its own; nothing to signal then
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Heartbeat task for {} ended abnormally: {}", self.service.service_id, e);
        }
        self.client.deregister(&self.service.service_id).await?;
        info!("Service {} deregistered on shutdown", self.service.service_id);
        Ok(())
    }
}

/// `{hostname}-{pid}`, unique per process on a host.
pub fn generate_service_id() -> String {
    let hostname = hostname::get()
        .unwrap_or_else(|_| std::ffi::OsString::from("unknown"))
        .to_string_lossy()
        .to_string();
    format!("{}-{}", hostname, std::process::id())
}

/// Bootstrap a service with automatic registration via the registry HTTP API
///
/// This function:
/// - Reads SERVICE_REGISTRY_URL from environment (defaults to http://service-registry:3003)
/// - Generates a unique service ID from hostname and PID
/// - Registers the service via HTTP, retrying while the registry is unreachable
/// - Spawns a background task that heartbeats until the handle is shut down
pub async fn bootstrap_service(
    service_type: impl Into<String>,
    host: impl Into<String>,
    port: u16,
) -> Result<ServiceHandle> {
    let service = ServiceRecord::new(generate_service_id(), host, port, service_type);
    bootstrap_with(RegistryClient::from_env(), service, BootstrapOptions::default()).await
}

pub async fn bootstrap_with(
    client: RegistryClient,
    service: ServiceRecord,
    options: BootstrapOptions,
) -> Result<ServiceHandle> {
    service.validate()?;
    register_with_retry(&client, &service, &options).await?;

    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run_heartbeat_loop(HeartbeatContext {
        client: client.clone(),
        service: service.clone(),
        interval: options.heartbeat_interval,
        shutdown: shutdown_rx,
    }));

    Ok(ServiceHandle {
        service,
        client,
        shutdown,
        task,
    })
}

async fn register_with_retry(
    client: &RegistryClient,
    service: &ServiceRecord,
    options: &BootstrapOptions,
) -> Result<()> {
    let max_attempts = options.register_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        match client.register(service).await {
            Ok(()) => {
                info!("Service {} registered with {}", service.service_id, client.base_url());
                return Ok(());
            }
            Err(e @ RegistryError::Validation(_)) => return Err(e),
            Err(e) if attempts >= max_attempts => {
                warn!("Giving up registering {} after {} attempts", service.service_id, attempts);
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "Failed to register service (attempt {}/{}): {}",
                    attempts, max_attempts, e
                );
                tokio::time::sleep(options.retry_delay).await;
            }
        }
    }
}

/// Heartbeat every `ctx.interval` until shutdown is signalled.
///
/// A heartbeat answered with "not found" means the record was reaped or
/// cleared, so the service registers itself again. Other failures are
/// logged; the next tick supersedes the missed heartbeat.
pub async fn run_heartbeat_loop(mut ctx: HeartbeatContext) {
    let id = ctx.service.service_id.clone();
    loop {
        if *ctx.shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(ctx.interval) => {}
            changed = ctx.shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        match ctx.client.heartbeat(&id).await {
            Ok(()) => debug!("Heartbeat sent for {}", id),
            Err(e) if e.is_not_found() => {
                warn!("Registry no longer knows {}, registering again", id);
                if let Err(e) = ctx.client.register(&ctx.service).await {
                    warn!("Failed to re-register {}: {}", id, e);
                }
            }
            Err(e) => warn!("Failed to send heartbeat for {}: {}", id, e),
        }
    }
    debug!("Heartbeat loop for {} stopped", id);
}

/// Get the endpoint URL for a service type
///
/// Queries the registry HTTP API for live instances of the type and returns
/// the first one as `http://host:port`. Returns None if no instance is live
/// or the registry cannot be reached.
pub async fn get_service_endpoint(service_type: &str) -> Option<String> {
    pick_endpoint(&RegistryClient::from_env(), service_type).await
}

pub async fn pick_endpoint(client: &RegistryClient, service_type: &str) -> Option<String> {
    debug!("Looking up service type: {}", service_type);

    match client.list_healthy(Some(service_type), DISCOVERY_TIMEOUT).await {
        Ok(services) => match services.first() {
            Some(service) => {
                let endpoint = format!("http://{}", service.endpoint());
                debug!("Found {} at {}", service_type, endpoint);
                Some(endpoint)
            }
            None => {
                warn!("No live instances found for service type: {}", service_type);
                None
            }
        },
        Err(e) => {
            warn!("Failed to query service registry for {}: {}", service_type, e);
            None
        }
    }
}
