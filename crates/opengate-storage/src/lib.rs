//! Protocol-state storage contract for the OpenGate authorization server.
//!
//! This crate defines the storage interface for every short- and
//! medium-lived artifact the protocol produces:
//!
//! - Sessions and pending interactions
//! - Authorization codes and device codes
//! - Access, refresh, and client-credentials tokens
//! - Grants and pushed authorization requests
//! - Client configuration (the one permanent kind)
//!
//! Artifacts are opaque documents; the store only enforces generic
//! lifecycle guarantees (existence, expiry, single-use consumption,
//! grant-scoped cascade deletion) and never interprets protocol semantics.
//!
//! # Implementations
//!
//! Storage backends are provided in separate crates:
//!
//! - `opengate-db-postgres` - PostgreSQL backend
//! - `opengate-db-memory` - In-memory backend for tests and development

pub mod adapter;
pub mod error;
pub mod kind;
pub mod record;
pub mod traits;

pub use adapter::{Adapter, Store};
pub use error::{ErrorCategory, StoreError, StoreResult};
pub use kind::{RecordKind, UnknownRecordKind};
pub use record::{StoredRecord, fields};
pub use traits::{Consumption, RecordStorage};
