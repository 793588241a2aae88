use clap::Parser;
use registry_cli::{commands, Cli, Command, OutputFormat, StatusArg};
use service_registry::{KeySpace, ManualClock, MemoryStore, ServiceRegistry, ServiceStatus};
use std::sync::Arc;
use std::time::Duration;

fn registry() -> (Arc<ManualClock>, ServiceRegistry<MemoryStore>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000.0));
    let registry = ServiceRegistry::with_store(MemoryStore::new(), KeySpace::new("cli:"))
        .with_clock(clock.clone());
    (clock, registry)
}

async fn run_with_input(
    registry: &ServiceRegistry<MemoryStore>,
    args: &[&str],
    input: &str,
) -> anyhow::Result<String> {
    let mut argv = vec!["registry-cli"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv)?;

    let mut out = Vec::new();
    let mut input = input.as_bytes();
    commands::execute(registry, cli.command, &mut out, &mut input).await?;
    Ok(String::from_utf8(out)?)
}

async fn run(registry: &ServiceRegistry<MemoryStore>, args: &[&str]) -> anyhow::Result<String> {
    run_with_input(registry, args, "").await
}

async fn register(registry: &ServiceRegistry<MemoryStore>, id: &str, service_type: &str) {
    run(
        registry,
        &["register", id, "--host", "10.0.0.5", "--port", "9000", "--service-type", service_type],
    )
    .await
    .unwrap();
}

#[test]
fn test_parse_defaults() {
    let cli = Cli::try_parse_from(["registry-cli", "list-healthy"]).unwrap();
    assert_eq!(cli.store.store_port, 2379);
    assert_eq!(cli.store.timeout_ms, 5000);
    match cli.command {
        Command::ListHealthy {
            service_type,
            timeout,
            format,
        } => {
            assert!(service_type.is_none());
            assert_eq!(timeout, 30);
            assert_eq!(format, OutputFormat::Text);
        }
        other => panic!("unexpected command: {:?}", other),
    }

    let cli = Cli::try_parse_from(["registry-cli", "cleanup"]).unwrap();
    assert!(matches!(cli.command, Command::Cleanup { timeout: 300 }));
}

#[test]
fn test_store_flags_build_config() {
    let cli = Cli::try_parse_from([
        "registry-cli",
        "count",
        "--store-host",
        "etcd.internal",
        "--store-port",
        "2380",
        "--db",
        "2",
        "--key-prefix",
        "staging:",
        "--timeout-ms",
        "250",
    ])
    .unwrap();

    let config = cli.store.config();
    assert_eq!(config.endpoints, vec!["etcd.internal:2380".to_string()]);
    assert_eq!(config.db, 2);
    assert_eq!(config.key_prefix, "staging:");
    assert_eq!(config.op_timeout, Duration::from_millis(250));
}

#[test]
fn test_rejects_unknown_status() {
    assert!(Cli::try_parse_from(["registry-cli", "update-health", "svc-1", "--status", "sleepy"]).is_err());

    let cli = Cli::try_parse_from(["registry-cli", "update-health", "svc-1", "--status", "stopping"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::UpdateHealth {
            status: StatusArg::Stopping,
            ..
        }
    ));
}

#[tokio::test]
async fn test_register_and_get() {
    let (_clock, registry) = registry();
    let out = run(
        &registry,
        &[
            "register",
            "svc-1",
            "--host",
            "10.0.0.5",
            "--port",
            "9000",
            "--service-type",
            "worker",
            "--metadata",
            r#"{"gpu": "A100"}"#,
        ],
    )
    .await
    .unwrap();
    assert_eq!(out, "Successfully registered service: svc-1\n");

    let out = run(&registry, &["get", "svc-1"]).await.unwrap();
    assert!(out.contains("Service ID: svc-1"));
    assert!(out.contains("Host: 10.0.0.5"));
    assert!(out.contains("Status: healthy"));
    assert!(out.contains("\"gpu\": \"A100\""));

    let out = run(&registry, &["get", "svc-1", "--format", "json"]).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["port"], 9000);
    assert_eq!(value["last_seen"], 1_700_000_000.0);
}

#[tokio::test]
async fn test_bad_metadata_never_reaches_registry() {
    let (_clock, registry) = registry();
    let err = run(
        &registry,
        &[
            "register",
            "svc-1",
            "--host",
            "10.0.0.5",
            "--port",
            "9000",
            "--service-type",
            "worker",
            "--metadata",
            "not json",
        ],
    )
    .await
    .unwrap_err();

    assert!(format!("{:#}", err).contains("metadata"));
    assert_eq!(registry.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_get_unknown_service_fails() {
    let (_clock, registry) = registry();
    let err = run(&registry, &["get", "ghost"]).await.unwrap_err();
    assert_eq!(err.to_string(), "Service not found: ghost");
}

#[tokio::test]
async fn test_update_health_and_list_filters() {
    let (_clock, registry) = registry();
    register(&registry, "w1", "worker").await;
    register(&registry, "w2", "worker").await;
    register(&registry, "r1", "router").await;

    let out = run(
        &registry,
        &["update-health", "w2", "--status", "unhealthy", "--metadata", r#"{"error": "oom"}"#],
    )
    .await
    .unwrap();
    assert_eq!(out, "Successfully updated health for service: w2\n");
    assert_eq!(registry.get("w2").await.unwrap().status, ServiceStatus::Unhealthy);

    let out = run(&registry, &["list", "--service-type", "worker"]).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], "-".repeat(75));

    let out = run(&registry, &["list", "--status", "unhealthy", "--format", "json"])
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);
    assert_eq!(value[0]["service_id"], "w2");

    let out = run(&registry, &["list-healthy", "--service-type", "worker"]).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "-".repeat(60));
    assert!(lines[2].starts_with("w1"));
}

#[tokio::test]
async fn test_empty_listings() {
    let (_clock, registry) = registry();
    assert_eq!(run(&registry, &["list"]).await.unwrap(), "No services found\n");
    assert_eq!(
        run(&registry, &["list-healthy"]).await.unwrap(),
        "No healthy services found\n"
    );
    assert_eq!(run(&registry, &["list", "--format", "json"]).await.unwrap(), "[]\n");
}

#[tokio::test]
async fn test_heartbeat_quiet() {
    let (clock, registry) = registry();
    register(&registry, "w1", "worker").await;
    clock.advance(10.0);

    assert_eq!(run(&registry, &["heartbeat", "w1", "--quiet"]).await.unwrap(), "");
    assert_eq!(registry.get("w1").await.unwrap().last_seen, 1_700_000_010.0);

    let out = run(&registry, &["heartbeat", "w1"]).await.unwrap();
    assert_eq!(out, "Heartbeat recorded for service: w1\n");

    assert!(run(&registry, &["heartbeat", "ghost", "-q"]).await.is_err());
}

#[tokio::test]
async fn test_cleanup_count_types_and_deregister() {
    let (clock, registry) = registry();
    register(&registry, "w1", "worker").await;
    clock.advance(400.0);
    register(&registry, "r1", "router").await;

    assert_eq!(run(&registry, &["count"]).await.unwrap(), "2\n");
    assert_eq!(run(&registry, &["types"]).await.unwrap(), "router\nworker\n");

    let out = run(&registry, &["types", "--format", "json"]).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value, serde_json::json!(["router", "worker"]));

    assert_eq!(
        run(&registry, &["cleanup"]).await.unwrap(),
        "Removed 1 stale service(s)\n"
    );
    assert_eq!(run(&registry, &["count", "--service-type", "worker"]).await.unwrap(), "0\n");

    let out = run(&registry, &["deregister", "r1"]).await.unwrap();
    assert_eq!(out, "Successfully deregistered service: r1\n");
    assert_eq!(run(&registry, &["count"]).await.unwrap(), "0\n");
}

#[tokio::test]
async fn test_clear_asks_for_confirmation() {
    let (_clock, registry) = registry();
    register(&registry, "w1", "worker").await;

    let out = run_with_input(&registry, &["clear"], "no\n").await.unwrap();
    assert!(out.ends_with("Aborted\n"));
    assert_eq!(registry.count(None).await.unwrap(), 1);

    let out = run_with_input(&registry, &["clear"], "YES\n").await.unwrap();
    assert!(out.ends_with("Successfully cleared all service registry data\n"));
    assert_eq!(registry.count(None).await.unwrap(), 0);

    register(&registry, "w2", "worker").await;
    let out = run(&registry, &["clear", "--yes"]).await.unwrap();
    assert_eq!(out, "Successfully cleared all service registry data\n");
    assert_eq!(registry.count(None).await.unwrap(), 0);
}
