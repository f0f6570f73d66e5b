//! # tourmaline-compliance: Authorization audit trail
//!
//! Every authorization attempt (allowed, denied, or failed) produces
//! exactly one [`AuditRecord`], appended before the outcome is surfaced to
//! the caller. The log is append-only by construction: the API provides no
//! way to modify or remove a record once written.
//!
//! # Example
//!
//! ```
//! use tourmaline_compliance::{AuditDecision, AuditRecord, AuditStore, MemoryAuditLog};
//! use tourmaline_types::UserId;
//!
//! let log = MemoryAuditLog::new();
//!
//! let record = AuditRecord::new(
//!     UserId::new(7),
//!     "carol",
//!     "SELECT name FROM employees",
//!     vec!["employees".into()],
//!     vec!["employees.name".into()],
//!     AuditDecision::Allow,
//!     None,
//! );
//! let record_id = log.append(record)?;
//!
//! let recent = log.recent(10);
//! assert_eq!(recent.len(), 1);
//! assert_eq!(recent[0].record_id, record_id);
//! # Ok::<(), tourmaline_compliance::AuditError>(())
//! ```

mod audit;

pub use audit::{
    AuditDecision, AuditError, AuditRecord, AuditStore, MemoryAuditLog, Result, export_csv,
};
