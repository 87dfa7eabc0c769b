//! In-memory protocol-state storage backend for the OpenGate authorization
//! server.
//!
//! This crate provides an in-memory implementation of the `RecordStorage`
//! trait from `opengate-storage`, using a concurrent hash map. It is the
//! backend of choice for tests and local development; production
//! deployments use `opengate-db-postgres`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use opengate_db_memory::InMemoryStorage;
//! use opengate_storage::{RecordKind, Store};
//!
//! let store = Store::new(Arc::new(InMemoryStorage::new()));
//! let codes = store.adapter(RecordKind::AuthorizationCode);
//!
//! codes.upsert("code-1", &serde_json::json!({"grantId": "g1"}), Some(600)).await?;
//! let doc = codes.find("code-1").await?;
//! ```

pub mod storage;

pub use storage::InMemoryStorage;

// Re-export the contract types for convenience
pub use opengate_storage::{Consumption, RecordKind, RecordStorage, Store, StoreError};
