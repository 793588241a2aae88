use super::{stored_number, FieldMap, Store};
use crate::codec::encode_timestamp;
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use etcd_client::{
    Client, Compare, CompareOp, ConnectOptions, DeleteOptions, GetOptions, Txn, TxnOp,
    TxnOpResponse,
};
use std::time::Duration;
use tracing::{debug, info};

/// Attempts at the compare-and-swap used for monotonic fields before giving up.
const CAS_ATTEMPTS: usize = 8;

// etcd has no hashes or sets, so both are spread over flat keys:
//   {key}\0h               hash header, present while the hash exists
//   {key}\0f\0{field}      one key per hash field
//   {key}\0m\0{member}     one key per set member
fn header_key(key: &str) -> String {
    format!("{}\0h", key)
}

fn field_prefix(key: &str) -> String {
    format!("{}\0f\0", key)
}

fn field_key(key: &str, field: &str) -> String {
    format!("{}\0f\0{}", key, field)
}

fn member_prefix(key: &str) -> String {
    format!("{}\0m\0", key)
}

fn member_key(key: &str, member: &str) -> String {
    format!("{}\0m\0{}", key, member)
}

/// [`Store`] backed by an etcd cluster.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connect to etcd.
    ///
    /// # Arguments
    /// * `endpoints` - List of etcd endpoints (e.g., ["localhost:2379"])
    /// * `connect_timeout` - Bound on establishing the connection
    /// * `request_timeout` - Bound on every individual request
    pub async fn connect(
        endpoints: &[String],
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        info!("Connecting to etcd at endpoints: {:?}", endpoints);

        let options = ConnectOptions::new()
            .with_connect_timeout(connect_timeout)
            .with_timeout(request_timeout);
        let client = Client::connect(endpoints, Some(options))
            .await
            .map_err(|e| RegistryError::ConnectionError(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    // The client is a cheap handle over a shared channel.
    fn client(&self) -> Client {
        self.client.clone()
    }
}

#[async_trait]
impl Store for EtcdStore {
    async fn read_fields(&self, key: &str) -> Result<Option<FieldMap>> {
        let prefix = field_prefix(key);
        let resp = self
            .client()
            .get(prefix.as_str(), Some(GetOptions::new().with_prefix()))
            .await?;

        if resp.kvs().is_empty() {
            return Ok(None);
        }

        let mut fields = FieldMap::new();
        for kv in resp.kvs() {
            if let Some(name) = kv.key_str()?.strip_prefix(prefix.as_str()) {
                fields.insert(name.to_string(), kv.value_str()?.to_string());
            }
        }
        Ok(Some(fields))
    }

    async fn put_fields(&self, key: &str, fields: &FieldMap) -> Result<()> {
        let mut ops = vec![TxnOp::put(header_key(key), "", None)];
        ops.extend(
            fields
                .iter()
                .map(|(name, value)| TxnOp::put(field_key(key, name), value.as_str(), None)),
        );

        self.client().txn(Txn::new().and_then(ops)).await?;
        Ok(())
    }

    async fn update_fields(
        &self,
        key: &str,
        fields: &FieldMap,
        monotonic: Option<(&str, f64)>,
    ) -> Result<bool> {
        let mut client = self.client();
        let header = header_key(key);

        for attempt in 1..=CAS_ATTEMPTS {
            let mut compares = vec![Compare::version(header.as_str(), CompareOp::Greater, 0)];
            let mut ops: Vec<TxnOp> = fields
                .iter()
                .map(|(name, value)| TxnOp::put(field_key(key, name), value.as_str(), None))
                .collect();

            if let Some((name, value)) = monotonic {
                let target = field_key(key, name);
                let current = client.get(target.as_str(), None).await?;
                match current.kvs().first() {
                    Some(kv) => {
                        compares.push(Compare::mod_revision(
                            target.as_str(),
                            CompareOp::Equal,
                            kv.mod_revision(),
                        ));
                        if stored_number(kv.value_str().ok()).map_or(true, |stored| value > stored) {
                            ops.push(TxnOp::put(target.as_str(), encode_timestamp(value), None));
                        }
                    }
                    None => {
                        compares.push(Compare::version(target.as_str(), CompareOp::Equal, 0));
                        ops.push(TxnOp::put(target.as_str(), encode_timestamp(value), None));
                    }
                }
            }

            let txn = Txn::new()
                .when(compares)
                .and_then(ops)
                .or_else(vec![TxnOp::get(header.as_str(), None)]);
            let resp = client.txn(txn).await?;
            if resp.succeeded() {
                return Ok(true);
            }

            let exists = resp.op_responses().into_iter().any(|op| match op {
                TxnOpResponse::Get(get) => !get.kvs().is_empty(),
                _ => false,
            });
            if !exists {
                return Ok(false);
            }
            debug!("Concurrent write on {:?}, retrying update (attempt {})", key, attempt);
        }

        Err(RegistryError::Conflict(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let header = header_key(key);
        let fields = || TxnOp::delete(field_prefix(key), Some(DeleteOptions::new().with_prefix()));

        let txn = Txn::new()
            .when(vec![Compare::version(header.as_str(), CompareOp::Greater, 0)])
            .and_then(vec![TxnOp::delete(header.as_str(), None), fields()])
            .or_else(vec![fields()]);

        Ok(self.client().txn(txn).await?.succeeded())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        self.client().put(member_key(key, member), "", None).await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        self.client().delete(member_key(key, member), None).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let prefix = member_prefix(key);
        let resp = self
            .client()
            .get(
                prefix.as_str(),
                Some(GetOptions::new().with_prefix().with_keys_only()),
            )
            .await?;

        let mut members = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            if let Some(member) = kv.key_str()?.strip_prefix(prefix.as_str()) {
                members.push(member.to_string());
            }
        }
        Ok(members)
    }

    async fn set_len(&self, key: &str) -> Result<u64> {
        let resp = self
            .client()
            .get(
                member_prefix(key),
                Some(GetOptions::new().with_prefix().with_count_only()),
            )
            .await?;
        Ok(resp.count().max(0) as u64)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let resp = self
            .client()
            .delete(prefix, Some(DeleteOptions::new().with_prefix()))
            .await?;
        debug!("Deleted {} etcd keys under {:?}", resp.deleted(), prefix);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_keeps_hashes_and_sets_apart() {
        // a record whose id is "all" shares its key with the global set
        let key = "services:all";
        assert_ne!(field_key(key, "host"), member_key(key, "host"));
        assert!(!header_key(key).starts_with(&field_prefix(key)));
        assert!(!member_key(key, "x").starts_with(&field_prefix(key)));
    }

    #[test]
    fn test_field_prefix_does_not_cover_longer_ids() {
        let short = field_prefix("services:a");
        assert!(!field_key("services:ab", "host").starts_with(&short));
        assert!(!header_key("services:a").starts_with(&short));
    }

    #[test]
    fn test_everything_lives_under_the_namespace() {
        let ns = "test:services:";
        for key in [
            header_key("test:services:x"),
            field_key("test:services:x", "port"),
            member_key("test:services:all", "x"),
        ] {
            assert!(key.starts_with(ns));
        }
    }
}
