use clap::Parser;
use registry_cli::{commands, Cli};
use service_registry::ServiceRegistry;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.store.config();
    tracing::debug!("Connecting to etcd at: {:?}", config.endpoints);
    let registry = ServiceRegistry::connect(&config).await?;

    let stdout = std::io::stdout();
    let stdin = std::io::stdin();
    commands::execute(&registry, cli.command, &mut stdout.lock(), &mut stdin.lock()).await
}
