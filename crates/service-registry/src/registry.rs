use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::keys::KeySpace;
use crate::liveness;
use crate::service::{require, Metadata, ServiceRecord, ServiceStatus};
use crate::store::{EtcdStore, FieldMap, Store};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// ServiceRegistry provides service registration, health tracking and
/// discovery on top of a shared [`Store`].
///
/// The registry holds no state of its own beyond the store handle, so one
/// instance can be shared freely between tasks, and any number of processes
/// can operate on the same store concurrently.
///
/// Each record lives under `{prefix}services:{id}` and is indexed in the
/// global set `{prefix}services:all` and in `{prefix}services:type:{type}`.
/// Writes go record first, then indices; removals go indices first, then the
/// record. An interrupted operation therefore leaves at worst an index entry
/// pointing at nothing, which reads skip and prune.
pub struct ServiceRegistry<S = EtcdStore> {
    store: S,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
    op_timeout: Duration,
    codec_errors: AtomicU64,
}

impl ServiceRegistry<EtcdStore> {
    /// Connect to etcd using `config`.
    pub async fn connect(config: &RegistryConfig) -> Result<Self> {
        let store =
            EtcdStore::connect(&config.endpoints, config.connect_timeout, config.op_timeout).await?;
        Ok(Self::with_store(store, config.key_space()).with_op_timeout(config.op_timeout))
    }
}

impl<S: Store> ServiceRegistry<S> {
    pub fn with_store(store: S, keys: KeySpace) -> Self {
        Self {
            store,
            keys,
            clock: Arc::new(SystemClock),
            op_timeout: crate::config::DEFAULT_OP_TIMEOUT,
            codec_errors: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Upper bound on every individual store call.
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Number of records read so far whose metadata blob could not be decoded.
    pub fn codec_errors(&self) -> u64 {
        self.codec_errors.load(Ordering::Relaxed)
    }

    async fn bounded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Store operation timed out after {:?}", self.op_timeout);
                Err(RegistryError::Timeout(self.op_timeout))
            }
        }
    }

    /// Register a service, or overwrite an existing registration with the same id.
    ///
    /// `last_seen` is set to the current time. If the id was previously
    /// registered under another type it is moved to the new type's index.
    pub async fn register(&self, service: &ServiceRecord) -> Result<()> {
        service.validate()?;

        let id = service.service_id.as_str();
        let key = self.keys.record(id);
        let previous = self.bounded(self.store.read_fields(&key)).await?;

        let mut record = service.clone();
        record.last_seen = self.now();
        let mut fields = codec::encode(&record)?;

        debug!("Registering service at key: {}", key);

        // An existing record goes through the guarded path so last_seen
        // cannot move backwards.
        let mut written = false;
        if previous.is_some() {
            fields.remove(codec::LAST_SEEN);
            written = self
                .bounded(self.store.update_fields(
                    &key,
                    &fields,
                    Some((codec::LAST_SEEN, record.last_seen)),
                ))
                .await?;
            if !written {
                fields = codec::encode(&record)?;
            }
        }
        if !written {
            self.bounded(self.store.put_fields(&key, &fields)).await?;
        }

        let previous_type = previous.and_then(|mut fields| fields.remove(codec::SERVICE_TYPE));
        if let Some(old_type) = previous_type.filter(|t| *t != record.service_type) {
            info!(
                "Service {} moved from type {} to {}",
                id, old_type, record.service_type
            );
            self.bounded(self.store.set_remove(&self.keys.by_type(&old_type), id))
                .await?;
        }
        self.bounded(self.store.set_add(&self.keys.all(), id)).await?;
        self.bounded(
            self.store
                .set_add(&self.keys.by_type(&record.service_type), id),
        )
        .await?;

        info!(
            "Service {} ({}) registered at {}",
            id,
            record.service_type,
            record.endpoint()
        );
        Ok(())
    }

    /// Deregister a service. Unknown ids are not an error.
    ///
    /// Returns whether a record was actually removed.
    pub async fn deregister(&self, service_id: &str) -> Result<bool> {
        require("service_id", service_id)?;

        let key = self.keys.record(service_id);
        let service_type = self
            .bounded(self.store.read_fields(&key))
            .await?
            .and_then(|mut fields| fields.remove(codec::SERVICE_TYPE));

        self.bounded(self.store.set_remove(&self.keys.all(), service_id))
            .await?;
        if let Some(service_type) = &service_type {
            self.bounded(
                self.store
                    .set_remove(&self.keys.by_type(service_type), service_id),
            )
            .await?;
        }
        let removed = self.bounded(self.store.delete(&key)).await?;

        if removed {
            info!("Service {} deregistered", service_id);
        } else {
            debug!("Service {} was not registered, nothing to deregister", service_id);
        }
        Ok(removed)
    }

    /// Set a new status and merge `metadata` into the existing metadata.
    ///
    /// Keys in `metadata` overwrite existing keys of the same name; others
    /// are kept. Fails with [`RegistryError::ServiceNotFound`] if the service
    /// was never registered.
    pub async fn update_health(
        &self,
        service_id: &str,
        status: ServiceStatus,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        require("service_id", service_id)?;

        let current = self
            .load(service_id)
            .await?
            .ok_or_else(|| RegistryError::ServiceNotFound(service_id.to_string()))?;

        let mut merged = current.metadata;
        if let Some(metadata) = metadata {
            merged.extend(metadata);
        }

        let mut fields = FieldMap::new();
        fields.insert(codec::STATUS.to_string(), status.as_str().to_string());
        fields.insert(codec::METADATA.to_string(), codec::encode_metadata(&merged)?);

        let updated = self
            .bounded(self.store.update_fields(
                &self.keys.record(service_id),
                &fields,
                Some((codec::LAST_SEEN, self.now())),
            ))
            .await?;
        if !updated {
            // deregistered between our read and write
            return Err(RegistryError::ServiceNotFound(service_id.to_string()));
        }

        info!("Service {} status set to {}", service_id, status);
        Ok(())
    }

    /// Refresh `last_seen`. Status and metadata are left untouched.
    pub async fn heartbeat(&self, service_id: &str) -> Result<()> {
        require("service_id", service_id)?;

        let key = self.keys.record(service_id);
        let updated = self
            .bounded(self.store.update_fields(
                &key,
                &FieldMap::new(),
                Some((codec::LAST_SEEN, self.now())),
            ))
            .await?;

        if !updated {
            return Err(RegistryError::ServiceNotFound(service_id.to_string()));
        }
        debug!("Heartbeat recorded for {}", service_id);
        Ok(())
    }

    /// Get a specific service by id.
    pub async fn get(&self, service_id: &str) -> Result<ServiceRecord> {
        require("service_id", service_id)?;

        self.load(service_id)
            .await?
            .ok_or_else(|| RegistryError::ServiceNotFound(service_id.to_string()))
    }

    /// List registered services, optionally filtered by type and exact status.
    ///
    /// The order of the result is not meaningful.
    pub async fn list(
        &self,
        service_type: Option<&str>,
        status: Option<ServiceStatus>,
    ) -> Result<Vec<ServiceRecord>> {
        let index = match service_type {
            Some(service_type) => self.keys.by_type(service_type),
            None => self.keys.all(),
        };
        let ids = self.bounded(self.store.set_members(&index)).await?;

        let mut services = Vec::with_capacity(ids.len());
        for id in ids {
            let record = match self.load(&id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.prune_index_entry(&index, service_type, &id).await;
                    continue;
                }
                Err(RegistryError::InvalidServiceData(reason)) => {
                    warn!("Skipping unreadable service {}: {}", id, reason);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if service_type.is_some_and(|t| t != record.service_type) {
                self.prune_index_entry(&index, service_type, &id).await;
                continue;
            }
            if status.map_or(true, |s| s == record.status) {
                services.push(record);
            }
        }

        debug!(
            "Found {} services (type: {:?}, status: {:?})",
            services.len(),
            service_type,
            status
        );
        Ok(services)
    }

    /// Services that are live under `timeout`; see [`liveness::is_live`].
    pub async fn list_healthy(
        &self,
        service_type: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<ServiceRecord>> {
        let candidates = self.list(service_type, None).await?;
        let now = self.now();

        Ok(candidates
            .into_iter()
            .filter(|record| liveness::is_live(record, now, timeout))
            .collect())
    }

    /// Deregister every service whose last heartbeat is older than `timeout`,
    /// whatever its status. Returns the number of services removed.
    ///
    /// A heartbeat that lands between the age check and the removal does not
    /// save the service; keep the cleanup timeout well above the heartbeat
    /// interval.
    pub async fn cleanup_stale(&self, timeout: Duration) -> Result<usize> {
        let all = self.keys.all();
        let ids = self.bounded(self.store.set_members(&all)).await?;
        let now = self.now();

        let mut removed = 0;
        for id in ids {
            let record = match self.load(&id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.prune_index_entry(&all, None, &id).await;
                    continue;
                }
                Err(RegistryError::InvalidServiceData(reason)) => {
                    warn!("Cannot judge age of unreadable service {}: {}", id, reason);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if liveness::is_stale(&record, now, timeout) {
                info!(
                    "Reaping stale service {} (last seen {:.1}s ago)",
                    id,
                    now - record.last_seen
                );
                if self.deregister(&id).await? {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            info!("Removed {} stale service(s)", removed);
        }
        Ok(removed)
    }

    /// Number of registered services, optionally of one type.
    pub async fn count(&self, service_type: Option<&str>) -> Result<u64> {
        let index = match service_type {
            Some(service_type) => self.keys.by_type(service_type),
            None => self.keys.all(),
        };
        self.bounded(self.store.set_len(&index)).await
    }

    /// Distinct types among the currently registered services.
    pub async fn types(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .list(None, None)
            .await?
            .into_iter()
            .map(|record| record.service_type)
            .collect())
    }

    /// Remove every record and index under this registry's key prefix.
    ///
    /// Callers are expected to have confirmed this with whoever asked for it.
    pub async fn clear_all(&self) -> Result<()> {
        let namespace = self.keys.namespace();
        warn!("Clearing all service registry data under {:?}", namespace);
        self.bounded(self.store.delete_prefix(&namespace)).await
    }

    async fn load(&self, service_id: &str) -> Result<Option<ServiceRecord>> {
        let key = self.keys.record(service_id);
        let Some(fields) = self.bounded(self.store.read_fields(&key)).await? else {
            return Ok(None);
        };

        let decoded = codec::decode(&fields)?;
        if let Some(reason) = decoded.metadata_error {
            self.codec_errors.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Corrupt metadata for service {}, returning it without metadata: {}",
                service_id, reason
            );
        }
        Ok(Some(decoded.record))
    }

    /// Best-effort removal of an index entry whose record is gone, or whose
    /// record now belongs to another type. The record is checked again right
    /// before removing so a concurrent re-registration is left alone.
    async fn prune_index_entry(&self, index: &str, index_type: Option<&str>, service_id: &str) {
        let key = self.keys.record(service_id);
        let dangling = match self.bounded(self.store.read_fields(&key)).await {
            Ok(None) => true,
            Ok(Some(fields)) => index_type.is_some_and(|t| {
                fields.get(codec::SERVICE_TYPE).map(String::as_str) != Some(t)
            }),
            Err(e) => {
                debug!("Could not recheck index entry {} in {}: {}", service_id, index, e);
                return;
            }
        };

        if dangling {
            debug!("Pruning dangling index entry {} from {}", service_id, index);
            if let Err(e) = self.bounded(self.store.set_remove(index, service_id)).await {
                warn!("Failed to prune index entry {} from {}: {}", service_id, index, e);
            }
        }
    }
}
