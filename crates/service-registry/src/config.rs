use crate::keys::KeySpace;
use std::env;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "localhost:2379";
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection and namespace settings for a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub endpoints: Vec<String>,
    pub key_prefix: String,
    /// Logical database. etcd has none, so a non-zero value becomes a
    /// leading `db{n}:` key segment.
    pub db: u32,
    pub op_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            key_prefix: String::new(),
            db: 0,
            op_timeout: DEFAULT_OP_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl RegistryConfig {
    /// Reads `ETCD_ENDPOINTS`, `REGISTRY_KEY_PREFIX`, `REGISTRY_DB` and
    /// `REGISTRY_OP_TIMEOUT_MS`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            endpoints: lookup("ETCD_ENDPOINTS")
                .map(|raw| parse_endpoints(&raw))
                .filter(|endpoints| !endpoints.is_empty())
                .unwrap_or(defaults.endpoints),
            key_prefix: lookup("REGISTRY_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            db: lookup("REGISTRY_DB")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.db),
            op_timeout: lookup("REGISTRY_OP_TIMEOUT_MS")
                .and_then(|raw| raw.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.op_timeout),
            connect_timeout: defaults.connect_timeout,
        }
    }

    pub fn key_space(&self) -> KeySpace {
        if self.db == 0 {
            KeySpace::new(self.key_prefix.clone())
        } else {
            KeySpace::new(format!("db{}:{}", self.db, self.key_prefix))
        }
    }
}

pub fn parse_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads a whole number of seconds from the environment.
pub fn duration_from_env(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        assert_eq!(RegistryConfig::from_lookup(lookup(&[])), RegistryConfig::default());
    }

    #[test]
    fn test_reads_env_values() {
        let config = RegistryConfig::from_lookup(lookup(&[
            ("ETCD_ENDPOINTS", "etcd-0:2379, etcd-1:2379"),
            ("REGISTRY_KEY_PREFIX", "prod:"),
            ("REGISTRY_DB", "3"),
            ("REGISTRY_OP_TIMEOUT_MS", "250"),
        ]));

        assert_eq!(config.endpoints, vec!["etcd-0:2379", "etcd-1:2379"]);
        assert_eq!(config.op_timeout, Duration::from_millis(250));
        assert_eq!(config.key_space().all(), "db3:prod:services:all");
    }

    #[test]
    fn test_db_zero_adds_no_segment() {
        let config = RegistryConfig {
            key_prefix: "test:".to_string(),
            ..RegistryConfig::default()
        };
        assert_eq!(config.key_space().record("a"), "test:services:a");
    }

    #[test]
    fn test_garbage_falls_back_to_defaults() {
        let config = RegistryConfig::from_lookup(lookup(&[
            ("ETCD_ENDPOINTS", " , "),
            ("REGISTRY_DB", "first"),
        ]));
        assert_eq!(config.endpoints, vec![DEFAULT_ENDPOINT]);
        assert_eq!(config.db, 0);
    }
}
