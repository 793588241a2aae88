pub mod commands;
pub mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use service_registry::{RegistryConfig, ServiceStatus};
use std::time::Duration;

pub use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "registry-cli")]
#[command(about = "CLI for registering, inspecting and reaping services in the service registry", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the registry data lives.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// etcd host
    #[arg(long, global = true, env = "REGISTRY_STORE_HOST", default_value = "localhost")]
    pub store_host: String,
    /// etcd client port
    #[arg(long, global = true, env = "REGISTRY_STORE_PORT", default_value_t = 2379)]
    pub store_port: u16,
    /// Logical database number
    #[arg(long, global = true, env = "REGISTRY_DB", default_value_t = 0)]
    pub db: u32,
    /// Prefix for all registry keys
    #[arg(long, global = true, env = "REGISTRY_KEY_PREFIX", default_value = "")]
    pub key_prefix: String,
    /// Per-request store timeout in milliseconds
    #[arg(long, global = true, env = "REGISTRY_OP_TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,
}

impl StoreArgs {
    pub fn config(&self) -> RegistryConfig {
        RegistryConfig {
            endpoints: vec![format!("{}:{}", self.store_host, self.store_port)],
            key_prefix: self.key_prefix.clone(),
            db: self.db,
            op_timeout: Duration::from_millis(self.timeout_ms),
            ..RegistryConfig::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Healthy,
    Unhealthy,
    Starting,
    Stopping,
    Unknown,
}

impl From<StatusArg> for ServiceStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Healthy => ServiceStatus::Healthy,
            StatusArg::Unhealthy => ServiceStatus::Unhealthy,
            StatusArg::Starting => ServiceStatus::Starting,
            StatusArg::Stopping => ServiceStatus::Stopping,
            StatusArg::Unknown => ServiceStatus::Unknown,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a service
    Register {
        /// Service identifier
        service_id: String,
        /// Service host
        #[arg(long)]
        host: String,
        /// Service port
        #[arg(long)]
        port: u16,
        /// Service type
        #[arg(long)]
        service_type: String,
        /// Initial status
        #[arg(long, value_enum, default_value = "healthy")]
        status: StatusArg,
        /// Metadata as a JSON object string
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Deregister a service
    Deregister {
        /// Service identifier
        service_id: String,
    },
    /// Update service health
    UpdateHealth {
        /// Service identifier
        service_id: String,
        /// New health status
        #[arg(long, value_enum)]
        status: StatusArg,
        /// Metadata to merge, as a JSON object string
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Send a service heartbeat
    Heartbeat {
        /// Service identifier
        service_id: String,
        /// Suppress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Get service information
    Get {
        /// Service identifier
        service_id: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List services
    List {
        /// Filter by service type
        #[arg(long)]
        service_type: Option<String>,
        /// Filter by status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List live services
    ListHealthy {
        /// Filter by service type
        #[arg(long)]
        service_type: Option<String>,
        /// Heartbeat timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Remove stale services
    Cleanup {
        /// Stale timeout in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
    /// Get service count
    Count {
        /// Filter by service type
        #[arg(long)]
        service_type: Option<String>,
    },
    /// List service types
    Types {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Clear all service registry data
    Clear {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
