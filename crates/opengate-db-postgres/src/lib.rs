//! PostgreSQL storage backend for OpenGate protocol state.
//!
//! Provides persistent storage for every ephemeral protocol artifact:
//!
//! - Sessions and pending interactions
//! - Authorization codes and device codes
//! - Access, refresh, and client-credentials tokens
//! - Grants and pushed authorization requests
//! - Client configuration
//!
//! All artifacts live in one `oidc_record` table as opaque JSONB documents.
//! The schema is created by embedded migrations on startup.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use opengate_db_postgres::{PostgresConfig, PostgresStorage};
//! use opengate_storage::{RecordKind, Store};
//!
//! let config = PostgresConfig::new("postgres://localhost/opengate");
//! let backend = PostgresStorage::connect(&config).await?;
//! let store = Store::new(Arc::new(backend));
//!
//! let tokens = store.adapter(RecordKind::AccessToken);
//! let doc = tokens.find("tok1").await?;
//! ```

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod store;

pub use config::PostgresConfig;
pub use error::{PostgresError, Result};
pub use pool::{create_pool, test_connection};
pub use store::PostgresStorage;

// Re-export the contract types for convenience
pub use opengate_storage::{Consumption, RecordKind, RecordStorage, Store, StoreError};
