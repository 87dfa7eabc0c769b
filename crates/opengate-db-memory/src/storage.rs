//! In-memory record storage backed by a concurrent hash map.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

use async_trait::async_trait;
use opengate_storage::{
    Consumption, RecordKind, RecordStorage, StoreError, StoreResult, StoredRecord, fields,
};

/// In-memory protocol-state storage.
///
/// Keyed by record id (ids are unique across the whole store, not per
/// kind). The map's per-entry exclusive access serializes concurrent
/// consume calls on the same id, giving the compare-and-set semantics the
/// contract requires. Expired records are filtered on every read and
/// reclaimed by `purge_expired`.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    records: DashMap<String, StoredRecord>,
}

impl InMemoryStorage {
    /// Creates an empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of records physically present, including expired ones that
    /// have not been purged yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no records are physically present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn expiry_from_ttl(now: OffsetDateTime, ttl_seconds: Option<u64>) -> Option<OffsetDateTime> {
    match ttl_seconds {
        None | Some(0) => None,
        // Lifetimes past the representable range clamp to the far future
        // instead of wrapping negative and birthing an expired record.
        Some(ttl) => {
            let ttl = Duration::seconds(i64::try_from(ttl).unwrap_or(i64::MAX));
            Some(
                now.checked_add(ttl)
                    .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc()),
            )
        }
    }
}

fn field_matches(document: &Value, field: &str, value: &str) -> bool {
    document.get(field).and_then(Value::as_str) == Some(value)
}

#[async_trait]
impl RecordStorage for InMemoryStorage {
    async fn upsert(
        &self,
        kind: RecordKind,
        id: &str,
        document: &Value,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<()> {
        let now = OffsetDateTime::now_utc();
        let expires_at = expiry_from_ttl(now, ttl_seconds);

        match self.records.entry(id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                record.kind = kind;
                record.document = document.clone();
                record.expires_at = expires_at;
                record.updated_at = now;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredRecord {
                    id: id.to_string(),
                    kind,
                    document: document.clone(),
                    expires_at,
                    created_at: now,
                    updated_at: now,
                });
            }
        }

        debug!(%kind, id, ttl = ?ttl_seconds, "Record upserted");
        Ok(())
    }

    async fn find(&self, kind: RecordKind, id: &str) -> StoreResult<Option<Value>> {
        let now = OffsetDateTime::now_utc();
        Ok(self.records.get(id).and_then(|record| {
            if record.kind == kind && record.is_live(now) {
                Some(record.document.clone())
            } else {
                None
            }
        }))
    }

    async fn find_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Value>> {
        let now = OffsetDateTime::now_utc();
        // Linear scan over live records of one kind. Records without the
        // field, or with a non-string value there, are skipped.
        Ok(self
            .records
            .iter()
            .find(|record| {
                record.kind == kind
                    && record.is_live(now)
                    && field_matches(&record.document, field, value)
            })
            .map(|record| record.document.clone()))
    }

    async fn consume(&self, kind: RecordKind, id: &str) -> StoreResult<Consumption> {
        let now = OffsetDateTime::now_utc();

        let Some(mut record) = self.records.get_mut(id) else {
            return Ok(Consumption::NotFound);
        };
        if record.kind != kind || !record.is_live(now) {
            return Ok(Consumption::NotFound);
        }
        if record.consumed_at().is_some() {
            return Ok(Consumption::AlreadyConsumed);
        }

        let Some(object) = record.document.as_object_mut() else {
            return Err(StoreError::malformed(format!(
                "{kind} document '{id}' is not a JSON object"
            )));
        };
        object.insert(
            fields::CONSUMED.to_string(),
            Value::from(now.unix_timestamp()),
        );
        record.updated_at = now;

        debug!(%kind, id, "Record consumed");
        Ok(Consumption::Consumed)
    }

    async fn destroy(&self, kind: RecordKind, id: &str) -> StoreResult<()> {
        let removed = self
            .records
            .remove_if(id, |_, record| record.kind == kind)
            .is_some();
        debug!(%kind, id, removed, "Record destroyed");
        Ok(())
    }

    async fn revoke_by_grant(&self, grant_id: &str) -> StoreResult<u64> {
        let now = OffsetDateTime::now_utc();

        let matching: Vec<String> = self
            .records
            .iter()
            .filter(|record| {
                !record.kind.grant_cascade_exempt()
                    && record.is_live(now)
                    && field_matches(&record.document, fields::GRANT_ID, grant_id)
            })
            .map(|record| record.id.clone())
            .collect();

        // Each removal is individually atomic; the predicate is rechecked
        // under the entry lock so a concurrent upsert of the same id with a
        // different grant is never swept up.
        let mut removed = 0u64;
        for id in matching {
            if self
                .records
                .remove_if(&id, |_, record| {
                    !record.kind.grant_cascade_exempt()
                        && field_matches(&record.document, fields::GRANT_ID, grant_id)
                })
                .is_some()
            {
                removed += 1;
            }
        }

        debug!(grant_id, removed, "Grant cascade revocation complete");
        Ok(removed)
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let now = OffsetDateTime::now_utc();
        // Counted inside the closure: comparing map lengths before and
        // after would misreport under concurrent upserts.
        let removed = AtomicU64::new(0);
        self.records.retain(|_, record| {
            let live = record.is_live(now);
            if !live {
                removed.fetch_add(1, Ordering::Relaxed);
            }
            live
        });
        let removed = removed.into_inner();
        debug!(removed, "Purged expired records");
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_preserves_created_at() {
        let storage = InMemoryStorage::new();
        storage
            .upsert(RecordKind::Grant, "g1", &json!({"v": 1}), None)
            .await
            .unwrap();
        let created = storage.records.get("g1").unwrap().created_at;

        storage
            .upsert(RecordKind::Grant, "g1", &json!({"v": 2}), None)
            .await
            .unwrap();
        let record = storage.records.get("g1").unwrap();
        assert_eq!(record.created_at, created);
        assert_eq!(record.document, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_find_filters_kind() {
        let storage = InMemoryStorage::new();
        storage
            .upsert(RecordKind::AccessToken, "tok", &json!({}), None)
            .await
            .unwrap();
        assert!(
            storage
                .find(RecordKind::RefreshToken, "tok")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            storage
                .find(RecordKind::AccessToken, "tok")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_consume_non_object_document() {
        let storage = InMemoryStorage::new();
        storage
            .upsert(RecordKind::AuthorizationCode, "c1", &json!("scalar"), None)
            .await
            .unwrap();
        let err = storage
            .consume(RecordKind::AuthorizationCode, "c1")
            .await
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn test_find_by_field_skips_non_string_values() {
        let storage = InMemoryStorage::new();
        storage
            .upsert(RecordKind::Session, "s1", &json!({"uid": 42}), None)
            .await
            .unwrap();
        storage
            .upsert(RecordKind::Session, "s2", &json!({"uid": "42"}), None)
            .await
            .unwrap();

        let found = storage
            .find_by_field(RecordKind::Session, "uid", "42")
            .await
            .unwrap()
            .expect("string-valued uid should match");
        assert_eq!(found, json!({"uid": "42"}));
    }

    #[tokio::test]
    async fn test_huge_ttl_stays_live() {
        let storage = InMemoryStorage::new();
        storage
            .upsert(RecordKind::Grant, "g1", &json!({}), Some(u64::MAX))
            .await
            .unwrap();
        assert!(storage.find(RecordKind::Grant, "g1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_len_counts_unpurged_records() {
        let storage = InMemoryStorage::new();
        assert!(storage.is_empty());
        storage
            .upsert(RecordKind::AccessToken, "t1", &json!({}), Some(3600))
            .await
            .unwrap();
        assert_eq!(storage.len(), 1);
    }
}
