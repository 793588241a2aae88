use super::{stored_number, FieldMap, Store};
use crate::codec::encode_timestamp;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    hashes: HashMap<String, FieldMap>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// In-process [`Store`] with the same per-hash and per-set semantics as the
/// etcd adapter. Hashes and sets live in separate key spaces.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read_fields(&self, key: &str) -> Result<Option<FieldMap>> {
        Ok(self.state.read().await.hashes.get(key).cloned())
    }

    async fn put_fields(&self, key: &str, fields: &FieldMap) -> Result<()> {
        let mut state = self.state.write().await;
        let hash = state.hashes.entry(key.to_string()).or_default();
        hash.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn update_fields(
        &self,
        key: &str,
        fields: &FieldMap,
        monotonic: Option<(&str, f64)>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(hash) = state.hashes.get_mut(key) else {
            return Ok(false);
        };

        hash.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some((field, value)) = monotonic {
            let current = stored_number(hash.get(field).map(String::as_str));
            if current.map_or(true, |current| value > current) {
                hash.insert(field.to_string(), encode_timestamp(value));
            }
        }
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.state.write().await.hashes.remove(key).is_some())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(set) = state.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                state.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_len(&self, key: &str) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.sets.get(key).map_or(0, |set| set.len() as u64))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.hashes.retain(|key, _| !key.starts_with(prefix));
        state.sets.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}
