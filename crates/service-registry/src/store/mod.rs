//! Backing store contract used by the registry core.
//!
//! A store offers hash-like records (a flat map of string fields under one
//! key) and string sets. Each method is one logical store operation; the
//! registry never needs more than one of them to be atomic at a time.

mod etcd;
mod memory;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub type FieldMap = BTreeMap<String, String>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// All fields of the hash at `key`, or `None` when it does not exist.
    async fn read_fields(&self, key: &str) -> Result<Option<FieldMap>>;

    /// Creates the hash at `key` or overwrites the given fields of it.
    async fn put_fields(&self, key: &str, fields: &FieldMap) -> Result<()>;

    /// Writes `fields` only if the hash at `key` already exists.
    ///
    /// `monotonic` names a numeric field that is raised to the given value
    /// but never lowered; a smaller value is silently ignored. Returns
    /// `false` when the hash does not exist.
    async fn update_fields(
        &self,
        key: &str,
        fields: &FieldMap,
        monotonic: Option<(&str, f64)>,
    ) -> Result<bool>;

    /// Deletes the hash at `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    async fn set_len(&self, key: &str) -> Result<u64>;

    /// Deletes every hash and set whose key starts with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;
}

/// Parses a stored numeric field; unreadable values lose to any new value.
pub(crate) fn stored_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|value| value.parse::<f64>().ok())
}
