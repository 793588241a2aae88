//! Conversion between [`ServiceRecord`] and the flat field map kept in the store.

use crate::error::{RegistryError, Result};
use crate::service::{Metadata, ServiceRecord};
use crate::store::FieldMap;

pub const SERVICE_ID: &str = "service_id";
pub const HOST: &str = "host";
pub const PORT: &str = "port";
pub const SERVICE_TYPE: &str = "service_type";
pub const STATUS: &str = "status";
pub const LAST_SEEN: &str = "last_seen";
pub const METADATA: &str = "metadata";

/// A decoded record and, when the metadata blob was unreadable, why.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub record: ServiceRecord,
    pub metadata_error: Option<String>,
}

pub fn encode(record: &ServiceRecord) -> Result<FieldMap> {
    let mut fields = FieldMap::new();
    fields.insert(SERVICE_ID.to_string(), record.service_id.clone());
    fields.insert(HOST.to_string(), record.host.clone());
    fields.insert(PORT.to_string(), record.port.to_string());
    fields.insert(SERVICE_TYPE.to_string(), record.service_type.clone());
    fields.insert(STATUS.to_string(), record.status.as_str().to_string());
    fields.insert(LAST_SEEN.to_string(), encode_timestamp(record.last_seen));
    fields.insert(METADATA.to_string(), encode_metadata(&record.metadata)?);
    Ok(fields)
}

pub fn encode_metadata(metadata: &Metadata) -> Result<String> {
    Ok(serde_json::to_string(metadata)?)
}

/// `f64`'s `Display` is the shortest string that parses back to the same value.
pub fn encode_timestamp(ts: f64) -> String {
    ts.to_string()
}

/// Rebuilds a record from its fields.
///
/// A corrupt metadata blob degrades to empty metadata and is reported in
/// [`Decoded::metadata_error`]; any other missing or malformed field is an
/// [`RegistryError::InvalidServiceData`].
pub fn decode(fields: &FieldMap) -> Result<Decoded> {
    let service_id = field(fields, SERVICE_ID)?.to_string();
    let port = field(fields, PORT)?
        .parse::<u16>()
        .map_err(|e| invalid(&service_id, PORT, e))?;
    let last_seen = field(fields, LAST_SEEN)?
        .parse::<f64>()
        .map_err(|e| invalid(&service_id, LAST_SEEN, e))?;
    let status = field(fields, STATUS)?
        .parse()
        .map_err(|e| invalid(&service_id, STATUS, e))?;

    let (metadata, metadata_error) = match fields.get(METADATA) {
        None => (Metadata::new(), None),
        Some(blob) => match serde_json::from_str::<Metadata>(blob) {
            Ok(metadata) => (metadata, None),
            Err(e) => (Metadata::new(), Some(e.to_string())),
        },
    };

    Ok(Decoded {
        record: ServiceRecord {
            host: field(fields, HOST)?.to_string(),
            service_type: field(fields, SERVICE_TYPE)?.to_string(),
            service_id,
            port,
            status,
            last_seen,
            metadata,
        },
        metadata_error,
    })
}

fn field<'a>(fields: &'a FieldMap, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| RegistryError::InvalidServiceData(format!("missing field {}", name)))
}

fn invalid(service_id: &str, name: &str, err: impl std::fmt::Display) -> RegistryError {
    RegistryError::InvalidServiceData(format!("{}: bad {}: {}", service_id, name, err))
}
