use service_registry::{RegistryConfig, ServiceRecord, ServiceRegistry, ServiceStatus};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Connect to etcd (make sure etcd is running on localhost:2379)
    let config = RegistryConfig {
        key_prefix: "example:".to_string(),
        ..RegistryConfig::default()
    };
    let registry = ServiceRegistry::connect(&config).await?;

    // Create a service
    let service = ServiceRecord::new("instance-1", "localhost", 8080, "example-service")
        .with_status(ServiceStatus::Starting)
        .with_metadata("version", "1.0.0")
        .with_metadata("env", "development");

    println!("Registering service: {} ({})", service.service_id, service.service_type);
    registry.register(&service).await?;

    registry
        .update_health(&service.service_id, ServiceStatus::Healthy, None)
        .await?;

    // Discover live instances of this service type
    println!("\nDiscovering services...");
    let services = registry
        .list_healthy(Some("example-service"), Duration::from_secs(30))
        .await?;
    println!("Found {} live instance(s):", services.len());
    for svc in &services {
        println!("  - {} at {}", svc.service_id, svc.endpoint());
    }

    // Heartbeat for 30 seconds
    println!("\nHeartbeating for 30 seconds...");
    for i in 1..=6 {
        tokio::time::sleep(Duration::from_secs(5)).await;
        registry.heartbeat(&service.service_id).await?;
        println!("  Heartbeat sent ({}/6)", i);
    }

    println!("\nDeregistering service...");
    registry.deregister(&service.service_id).await?;
    println!("Service deregistered successfully");

    Ok(())
}
