use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("etcd error: {0}")]
    EtcdError(#[from] etcd_client::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("invalid service data: {0}")]
    InvalidServiceData(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("concurrent update conflict on {0}")]
    Conflict(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::ServiceNotFound(_))
    }

    /// True for failures where the store (or registry server) could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            RegistryError::EtcdError(_)
                | RegistryError::ConnectionError(_)
                | RegistryError::Timeout(_)
                | RegistryError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
