use service_registry::register_service;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Register through the registry HTTP API (SERVICE_REGISTRY_URL). The macro:
    // - generates a service ID from hostname and PID
    // - retries registration while the registry is unreachable
    // - starts the heartbeat task
    println!("Registering service using macro...");
    let handle = register_service!("macro-service", "localhost", 9090).await?;

    let service = handle.service();
    println!("Service registered!");
    println!("  ID: {}", service.service_id);
    println!("  Type: {}", service.service_type);
    println!("  Address: {}", service.endpoint());

    println!("\nService running for one minute...");
    tokio::time::sleep(Duration::from_secs(60)).await;

    handle.shutdown().await?;
    println!("Service deregistered");
    Ok(())
}
