//! Stored record representation and the documented document fields.

use serde_json::Value;
use time::OffsetDateTime;

use crate::kind::RecordKind;

/// The only document fields the store is ever allowed to read.
///
/// Everything else inside a document is opaque to this layer; validation and
/// shaping of per-kind payloads happens upstream in the protocol engine.
pub mod fields {
    /// Grant reference tested by the grant cascade.
    pub const GRANT_ID: &str = "grantId";
    /// Session secondary-lookup field.
    pub const UID: &str = "uid";
    /// Device-code secondary-lookup field.
    pub const USER_CODE: &str = "userCode";
    /// Consumption marker: unix seconds at which the artifact was redeemed.
    pub const CONSUMED: &str = "consumed";
}

/// A record as held by the store: one artifact plus bookkeeping.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// Caller-assigned identifier, unique across the whole store.
    pub id: String,
    /// Artifact kind discriminator.
    pub kind: RecordKind,
    /// Opaque document supplied by the protocol engine.
    pub document: Value,
    /// Absolute expiry; `None` means the record never expires.
    pub expires_at: Option<OffsetDateTime>,
    /// When the record was first written.
    pub created_at: OffsetDateTime,
    /// When the record was last written.
    pub updated_at: OffsetDateTime,
}

impl StoredRecord {
    /// Returns `true` if the record has not logically expired at `now`.
    ///
    /// Liveness is evaluated on every read path; physical removal of
    /// expired rows is a separate maintenance concern.
    #[must_use]
    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }

    /// Returns the consumption timestamp (unix seconds) if the artifact has
    /// been redeemed.
    #[must_use]
    pub fn consumed_at(&self) -> Option<i64> {
        self.document.get(fields::CONSUMED).and_then(Value::as_i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::Duration;

    fn record(expires_at: Option<OffsetDateTime>, document: Value) -> StoredRecord {
        let now = OffsetDateTime::now_utc();
        StoredRecord {
            id: "r1".into(),
            kind: RecordKind::AccessToken,
            document,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_liveness() {
        let now = OffsetDateTime::now_utc();

        let permanent = record(None, json!({}));
        assert!(permanent.is_live(now));

        let future = record(Some(now + Duration::seconds(60)), json!({}));
        assert!(future.is_live(now));

        let past = record(Some(now - Duration::seconds(1)), json!({}));
        assert!(!past.is_live(now));
    }

    #[test]
    fn test_consumed_at() {
        let fresh = record(None, json!({"sub": "u1"}));
        assert_eq!(fresh.consumed_at(), None);

        let redeemed = record(None, json!({"sub": "u1", "consumed": 1756400000}));
        assert_eq!(redeemed.consumed_at(), Some(1_756_400_000));
    }
}
