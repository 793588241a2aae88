pub mod api;
pub mod bootstrap;
pub mod client;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod liveness;
pub mod maintenance;
pub mod registry;
pub mod service;
pub mod store;

pub use bootstrap::{bootstrap_service, get_service_endpoint, ServiceHandle};
pub use client::RegistryClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RegistryConfig;
pub use error::RegistryError;
pub use keys::KeySpace;
pub use liveness::{is_live, Liveness};
pub use registry::ServiceRegistry;
pub use service::{parse_metadata, Metadata, ServiceRecord, ServiceStatus};
pub use store::{EtcdStore, MemoryStore, Store};

// Re-export the macro
pub use service_registry_macros::register_service;
