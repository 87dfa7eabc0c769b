//! Per-kind adapter handles over one shared storage backend.
//!
//! The protocol engine obtains one [`Adapter`] per record kind from a
//! [`Store`] built once at process start. Every adapter shares the same
//! backend handle; there is no hidden lazily-initialized singleton, which
//! keeps substituting an in-memory backend for tests trivial.

use std::sync::Arc;

use serde_json::Value;

use crate::error::StoreResult;
use crate::kind::RecordKind;
use crate::record::fields;
use crate::traits::{Consumption, RecordStorage};

/// The process-wide store: one backend handle, created once at startup.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn RecordStorage>,
}

impl Store {
    /// Creates a store around a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn RecordStorage>) -> Self {
        Self { backend }
    }

    /// Returns a per-kind adapter sharing this store's backend.
    #[must_use]
    pub fn adapter(&self, kind: RecordKind) -> Adapter {
        Adapter {
            kind,
            backend: Arc::clone(&self.backend),
        }
    }

    /// Returns the backend name for logging/debugging.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Deletes every live artifact descended from `grant_id`, across all
    /// non-exempt kinds. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot complete the cascade.
    pub async fn revoke_by_grant(&self, grant_id: &str) -> StoreResult<u64> {
        self.backend.revoke_by_grant(grant_id).await
    }

    /// Physically reclaims logically expired records. Returns the number
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot complete the purge.
    pub async fn purge_expired(&self) -> StoreResult<u64> {
        self.backend.purge_expired().await
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

/// Adapter surface for one record kind.
///
/// This is the whole contract the protocol engine sees: upsert, find,
/// find-by-field, consume, destroy, and grant revocation over opaque
/// documents. The engine owns all semantic decisions (lifetimes, when to
/// revoke, what a grant means); the adapter only enforces generic lifecycle
/// guarantees.
#[derive(Clone)]
pub struct Adapter {
    kind: RecordKind,
    backend: Arc<dyn RecordStorage>,
}

impl Adapter {
    /// The record kind this adapter is scoped to.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Creates or atomically replaces the record.
    ///
    /// `ttl_seconds` of `None` or `Some(0)` means no expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot complete the write.
    pub async fn upsert(
        &self,
        id: &str,
        document: &Value,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<()> {
        self.backend
            .upsert(self.kind, id, document, ttl_seconds)
            .await
    }

    /// Returns the document if a live record exists.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn find(&self, id: &str) -> StoreResult<Option<Value>> {
        self.backend.find(self.kind, id).await
    }

    /// Returns the first live record whose document field equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn find_by_field(&self, field: &str, value: &str) -> StoreResult<Option<Value>> {
        self.backend.find_by_field(self.kind, field, value).await
    }

    /// Looks up a session by its `uid` field.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn find_by_uid(&self, uid: &str) -> StoreResult<Option<Value>> {
        self.find_by_field(fields::UID, uid).await
    }

    /// Looks up a device code by its `userCode` field.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn find_by_user_code(&self, user_code: &str) -> StoreResult<Option<Value>> {
        self.find_by_field(fields::USER_CODE, user_code).await
    }

    /// Idempotently marks the record as redeemed.
    ///
    /// A missing or already-consumed record is a successful no-op. Callers
    /// that need to detect replay should use [`try_consume`](Self::try_consume)
    /// instead.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn consume(&self, id: &str) -> StoreResult<()> {
        self.backend.consume(self.kind, id).await.map(|_| ())
    }

    /// Marks the record as redeemed and reports whether *this* call
    /// performed the unconsumed → consumed transition.
    ///
    /// Under concurrent redemption attempts of the same single-use
    /// artifact, exactly one caller is told it won; the protocol engine
    /// decides how to treat the loser (typically as a replay event).
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn try_consume(&self, id: &str) -> StoreResult<Consumption> {
        self.backend.consume(self.kind, id).await
    }

    /// Removes the record. Idempotent: a missing id is success.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn destroy(&self, id: &str) -> StoreResult<()> {
        self.backend.destroy(self.kind, id).await
    }

    /// Deletes every live artifact descended from `grant_id`, across all
    /// non-exempt kinds (not just this adapter's kind). Returns the number
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot complete the cascade.
    pub async fn revoke_by_grant(&self, grant_id: &str) -> StoreResult<u64> {
        self.backend.revoke_by_grant(grant_id).await
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("kind", &self.kind)
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::traits::Consumption;

    /// Records the kind each call was scoped to.
    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<(String, RecordKind)>>,
    }

    impl RecordingBackend {
        fn record(&self, op: &str, kind: RecordKind) {
            self.calls.lock().unwrap().push((op.to_string(), kind));
        }
    }

    #[async_trait::async_trait]
    impl RecordStorage for RecordingBackend {
        async fn upsert(
            &self,
            kind: RecordKind,
            _id: &str,
            _document: &Value,
            _ttl_seconds: Option<u64>,
        ) -> StoreResult<()> {
            self.record("upsert", kind);
            Ok(())
        }

        async fn find(&self, kind: RecordKind, _id: &str) -> StoreResult<Option<Value>> {
            self.record("find", kind);
            Ok(None)
        }

        async fn find_by_field(
            &self,
            kind: RecordKind,
            _field: &str,
            _value: &str,
        ) -> StoreResult<Option<Value>> {
            self.record("find_by_field", kind);
            Ok(None)
        }

        async fn consume(&self, kind: RecordKind, _id: &str) -> StoreResult<Consumption> {
            self.record("consume", kind);
            Ok(Consumption::NotFound)
        }

        async fn destroy(&self, kind: RecordKind, _id: &str) -> StoreResult<()> {
            self.record("destroy", kind);
            Ok(())
        }

        async fn revoke_by_grant(&self, _grant_id: &str) -> StoreResult<u64> {
            Ok(0)
        }

        async fn purge_expired(&self) -> StoreResult<u64> {
            Ok(0)
        }

        fn backend_name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn adapters_scope_every_call_to_their_kind() {
        let backend = Arc::new(RecordingBackend::default());
        let store = Store::new(backend.clone());

        let sessions = store.adapter(RecordKind::Session);
        let tokens = store.adapter(RecordKind::AccessToken);

        sessions.find("s1").await.unwrap();
        sessions.find_by_uid("u1").await.unwrap();
        tokens.upsert("t1", &Value::Null, None).await.unwrap();
        tokens.consume("t1").await.unwrap();
        tokens.destroy("t1").await.unwrap();

        let calls = backend.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("find".to_string(), RecordKind::Session),
                ("find_by_field".to_string(), RecordKind::Session),
                ("upsert".to_string(), RecordKind::AccessToken),
                ("consume".to_string(), RecordKind::AccessToken),
                ("destroy".to_string(), RecordKind::AccessToken),
            ]
        );
    }

    #[tokio::test]
    async fn store_debug_names_the_backend() {
        let store = Store::new(Arc::new(RecordingBackend::default()));
        assert_eq!(store.backend_name(), "recording");
        assert!(format!("{store:?}").contains("recording"));
    }
}
