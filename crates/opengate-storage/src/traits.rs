//! The storage trait every protocol-state backend must implement.
//!
//! # Implementation Notes
//!
//! Implementations must:
//!
//! - Filter logically expired records out of every read path, whether or
//!   not physical reclamation has run
//! - Make each individual operation atomic under the backend's own
//!   concurrency control (no partial upsert ever visible to readers)
//! - Serialize concurrent `consume` calls on the same id so the consumption
//!   marker, once set, is never overwritten or cleared
//! - Skip records that fail to deserialize during scans instead of failing
//!   the whole operation
//!
//! No multi-operation transactions are provided across separate calls. Two
//! callers racing `find` → `consume` on the same single-use artifact can
//! both observe it unconsumed; the [`Consumption`] outcome of `consume`
//! tells exactly one of them it won the transition.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;
use crate::kind::RecordKind;

/// Outcome of a consume call.
///
/// All three outcomes are successful results; the caller decides whether an
/// [`AlreadyConsumed`](Consumption::AlreadyConsumed) observation is a replay
/// event worth acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// This call performed the transition from unconsumed to consumed.
    Consumed,
    /// The record already carried a consumption marker.
    AlreadyConsumed,
    /// No live record with that id exists.
    NotFound,
}

impl Consumption {
    /// Returns `true` if this call won the unconsumed → consumed transition.
    #[must_use]
    pub fn is_first(&self) -> bool {
        matches!(self, Self::Consumed)
    }
}

/// Storage backend for ephemeral protocol artifacts.
///
/// One physical record table holds every artifact kind; the protocol engine
/// talks to it through per-kind [`Adapter`](crate::Adapter) handles that all
/// share one backend instance. Implementations must be thread-safe
/// (`Send + Sync`).
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Creates the record if absent, otherwise atomically replaces the
    /// existing document and expiry.
    ///
    /// A `ttl_seconds` of `None` or `Some(0)` means the record never
    /// expires (used for permanent configuration records such as clients).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`](crate::StoreError::Unavailable)
    /// if the backend cannot complete the write. A failed upsert leaves the
    /// previous document fully intact.
    async fn upsert(
        &self,
        kind: RecordKind,
        id: &str,
        document: &Value,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<()>;

    /// Returns the document if a live (non-expired) record exists.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures, never for a
    /// missing record.
    async fn find(&self, kind: RecordKind, id: &str) -> StoreResult<Option<Value>>;

    /// Returns the first live record of `kind` whose document field equals
    /// `value`.
    ///
    /// Records whose field is missing, non-string, or whose document cannot
    /// be read are skipped. Used for Session lookup by `uid` and DeviceCode
    /// lookup by `userCode`.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    async fn find_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Value>>;

    /// Stamps the record's document with a consumption marker if it does
    /// not already carry one.
    ///
    /// This is a single atomic compare-and-set: under concurrent calls on
    /// the same id, exactly one caller observes
    /// [`Consumption::Consumed`]. The marker is monotonic — it is never
    /// overwritten or cleared, so later reads can detect replay until the
    /// record expires naturally. A missing or expired record is a
    /// successful no-op ([`Consumption::NotFound`]).
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures or a document that
    /// cannot carry the marker.
    async fn consume(&self, kind: RecordKind, id: &str) -> StoreResult<Consumption>;

    /// Removes the record. Idempotent: a missing id is success.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    async fn destroy(&self, kind: RecordKind, id: &str) -> StoreResult<()>;

    /// Deletes every live record of every non-exempt kind whose `grantId`
    /// field equals `grant_id`. Returns the number of records deleted.
    ///
    /// Idempotent: a cascade with no matches is a successful no-op. Each
    /// deletion is individually atomic and fully committed before this
    /// method returns; the cascade as a whole is not one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    async fn revoke_by_grant(&self, grant_id: &str) -> StoreResult<u64>;

    /// Physically removes logically expired records. Returns the number
    /// reclaimed.
    ///
    /// Maintenance only: read paths filter expiry independently, so
    /// correctness never depends on this having run.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    async fn purge_expired(&self) -> StoreResult<u64>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that RecordStorage is object-safe
    fn _assert_storage_object_safe(_: &dyn RecordStorage) {}

    #[test]
    fn test_consumption_is_first() {
        assert!(Consumption::Consumed.is_first());
        assert!(!Consumption::AlreadyConsumed.is_first());
        assert!(!Consumption::NotFound.is_first());
    }
}
