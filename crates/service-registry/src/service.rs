use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Free-form metadata attached to a record. Opaque to the registry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Explicit status reported by the owning process or a health prober.
///
/// This is independent of liveness, which is derived from `last_seen`
/// (see [`crate::liveness`]).
///
/// Registrations that do not say otherwise come up healthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Starting,
    #[default]
    Healthy,
    Unhealthy,
    Stopping,
    Unknown,
}

impl ServiceStatus {
    pub const ALL: [ServiceStatus; 5] = [
        ServiceStatus::Starting,
        ServiceStatus::Healthy,
        ServiceStatus::Unhealthy,
        ServiceStatus::Stopping,
        ServiceStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Starting => "starting",
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Unhealthy => "unhealthy",
            ServiceStatus::Stopping => "stopping",
            ServiceStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        ServiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == lowered)
            .ok_or_else(|| RegistryError::Validation(format!("unknown service status: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub service_id: String,
    pub host: String,
    pub port: u16,
    pub service_type: String,
    #[serde(default)]
    pub status: ServiceStatus,
    /// Seconds since the Unix epoch of the last write for this record.
    #[serde(default)]
    pub last_seen: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ServiceRecord {
    pub fn new(
        service_id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        service_type: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            host: host.into(),
            port,
            service_type: service_type.into(),
            status: ServiceStatus::default(),
            last_seen: 0.0,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks the fields a registration must carry.
    ///
    /// NUL bytes are refused in identifiers because the etcd adapter uses them
    /// as key separators.
    pub fn validate(&self) -> Result<()> {
        require("service_id", &self.service_id)?;
        require("host", &self.host)?;
        require("service_type", &self.service_type)?;
        if self.port == 0 {
            return Err(RegistryError::Validation("port must be non-zero".to_string()));
        }
        Ok(())
    }
}

pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RegistryError::Validation(format!("{} must not be empty", field)));
    }
    if value.contains('\0') {
        return Err(RegistryError::Validation(format!("{} must not contain NUL", field)));
    }
    Ok(())
}

/// Parses a metadata JSON string supplied at a boundary (CLI flag, HTTP body).
///
/// Anything other than a JSON object is rejected.
pub fn parse_metadata(raw: &str) -> Result<Metadata> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(RegistryError::Validation(
            "metadata must be a JSON object".to_string(),
        )),
        Err(e) => Err(RegistryError::Validation(format!(
            "metadata must be valid JSON: {}",
            e
        ))),
    }
}
