//! # Tourmaline
//!
//! Query authorization and selective decryption in front of an existing
//! relational store.
//!
//! Every submitted statement is structurally analyzed to find exactly
//! which tables and columns it reads, that reference set is checked
//! against a per-user, per-column permission model, and only columns the
//! user may see are decrypted, with a tamper-evident audit record of
//! every decision written before the outcome is returned.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Tourmaline                           │
//! │  ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐ │
//! │  │ Extract  │ → │ Evaluate  │ → │ Execute  │ → │  Audit   │ │
//! │  │ (sqlast) │   │ (rbac)    │   │ +decrypt │   │ (append) │ │
//! │  └──────────┘   └───────────┘   └──────────┘   └──────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure at any stage short-circuits to the audit write: denied and
//! errored attempts are logged exactly like successful ones, and an audit
//! write failure fails the whole request.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tourmaline::{
//!     MasterKey, MemoryAuditLog, MemoryKeyStore, MemoryPermissionStore, MemoryStore,
//!     Permission, Role, Tourmaline, TourmalineConfig, UserContext, Value,
//! };
//! use tourmaline_types::{CatalogBuilder, ColumnInfo, DataType, UserId};
//!
//! let catalog = Arc::new(
//!     CatalogBuilder::new()
//!         .table("employees", vec![ColumnInfo::new("name", DataType::Text)])
//!         .build(),
//! );
//! let permissions = Arc::new(MemoryPermissionStore::new());
//! let store = Arc::new(MemoryStore::new());
//! store.create_table("employees", vec!["name".into()]);
//! store.insert_row(&"employees".into(), vec![Value::Text("alice".into())])?;
//!
//! let engine = Tourmaline::new(
//!     TourmalineConfig::default(),
//!     catalog,
//!     permissions.clone(),
//!     MasterKey::derive("passphrase", b"salt"),
//!     Arc::new(MemoryKeyStore::new()),
//!     store,
//!     Arc::new(MemoryAuditLog::new()),
//! );
//!
//! let analyst = UserContext::new(UserId::new(1), "carol", Role::Analyst);
//! permissions.grant(Permission::grant(analyst.id, "employees", Some("name")));
//!
//! let outcome = engine.authorize_and_execute(&analyst, "SELECT name FROM employees")?;
//! assert_eq!(outcome.rows.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod engine;
mod error;
mod store;

pub use engine::{QueryOutcome, Tourmaline, UserContext};
pub use error::{EngineError, Result};
pub use store::{ExecutionStore, MemoryStore, ResultSet, StoreError};

// Re-export core types
pub use tourmaline_types::{
    CatalogBuilder, ColumnInfo, ColumnName, DataType, MemoryCatalog, SchemaCatalog, TableName,
    UserId, Value,
};

// Re-export reference extraction
pub use tourmaline_query::{ExtractError, QueryReference, extract_references};

// Re-export access control
pub use tourmaline_rbac::{
    AccessLevel, MemoryPermissionStore, Permission, PermissionStore, Role, Verdict, evaluate,
};

// Re-export column encryption
pub use tourmaline_crypto::{
    ColumnCipherManager, CryptoError, KeyStore, MaskStyle, MasterKey, MemoryKeyStore,
    WrappedColumnKey, mask,
};

// Re-export the audit trail
pub use tourmaline_compliance::{
    AuditDecision, AuditError, AuditRecord, AuditStore, MemoryAuditLog, export_csv,
};

// Re-export configuration
pub use tourmaline_config::{ConfigLoader, TourmalineConfig};
