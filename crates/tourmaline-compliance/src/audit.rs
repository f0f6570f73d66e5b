//! Append-only audit records of authorization decisions.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tourmaline_types::{TableName, UserId};
use uuid::Uuid;

/// Error type for audit operations.
///
/// An append failure is fatal to the operation being audited: an un-logged
/// access is itself a compliance violation.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store rejected append: {0}")]
    AppendFailed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Outcome recorded for one authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditDecision {
    /// Every referenced column was permitted; the query executed.
    Allow,
    /// A referenced column was not permitted; the query never executed.
    Deny,
    /// Parse failure, store fault, crypto failure, or timeout.
    Error,
}

/// One immutable audit record.
///
/// All fields are set at creation time; once appended, a record is never
/// changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record identifier.
    pub record_id: Uuid,
    /// When the attempt was adjudicated.
    pub timestamp: DateTime<Utc>,
    /// Who submitted the statement.
    pub user_id: UserId,
    /// Username at the time of the attempt.
    pub username: String,
    /// The raw statement text as submitted.
    pub query_text: String,
    /// Tables the statement read (empty on parse failure).
    pub tables: Vec<String>,
    /// Columns the statement read, as `table.column` (empty on parse
    /// failure).
    pub columns: Vec<String>,
    /// The decision.
    pub decision: AuditDecision,
    /// Denial reason or error description.
    pub reason: Option<String>,
}

impl AuditRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        query_text: impl Into<String>,
        tables: Vec<String>,
        columns: Vec<String>,
        decision: AuditDecision,
        reason: Option<String>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id,
            username: username.into(),
            query_text: query_text.into(),
            tables,
            columns,
            decision,
            reason,
        }
    }
}

/// Audit store collaborator.
///
/// Append-only: the trait intentionally has no update or delete surface,
/// and implementations must support concurrent appends without losing
/// ordering. Projections return records newest first.
pub trait AuditStore: Send + Sync {
    /// Appends one record, returning its id.
    fn append(&self, record: AuditRecord) -> Result<Uuid>;

    /// Records for one user, newest first, capped at `limit`.
    fn by_user(&self, user: UserId, limit: usize) -> Vec<AuditRecord>;

    /// Records touching one table, newest first, capped at `limit`.
    fn by_table(&self, table: &TableName, limit: usize) -> Vec<AuditRecord>;

    /// Most recent records, newest first, capped at `limit`.
    fn recent(&self, limit: usize) -> Vec<AuditRecord>;

    /// Denied attempts, newest first, capped at `limit`.
    fn denied(&self, limit: usize) -> Vec<AuditRecord>;
}

/// In-memory append-only audit log.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records in the log.
    pub fn count(&self) -> usize {
        self.records.read().expect("audit lock poisoned").len()
    }

    /// Exports every record matching the filter as a JSON array string.
    pub fn export_json(&self) -> Result<String> {
        let records = self.records.read().expect("audit lock poisoned");
        serde_json::to_string_pretty(&*records).map_err(AuditError::from)
    }

    fn project(
        &self,
        limit: usize,
        filter: impl Fn(&AuditRecord) -> bool,
    ) -> Vec<AuditRecord> {
        let records = self.records.read().expect("audit lock poisoned");
        records
            .iter()
            .rev()
            .filter(|r| filter(r))
            .take(limit)
            .cloned()
            .collect()
    }
}

impl AuditStore for MemoryAuditLog {
    fn append(&self, record: AuditRecord) -> Result<Uuid> {
        let record_id = record.record_id;
        let mut records = self.records.write().expect("audit lock poisoned");

        let count_before = records.len();
        records.push(record);

        // Post-condition: exactly one record was added.
        assert_eq!(
            records.len(),
            count_before + 1,
            "audit append must increase record count by exactly 1"
        );

        Ok(record_id)
    }

    fn by_user(&self, user: UserId, limit: usize) -> Vec<AuditRecord> {
        self.project(limit, |r| r.user_id == user)
    }

    fn by_table(&self, table: &TableName, limit: usize) -> Vec<AuditRecord> {
        self.project(limit, |r| r.tables.iter().any(|t| t == table.as_str()))
    }

    fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        self.project(limit, |_| true)
    }

    fn denied(&self, limit: usize) -> Vec<AuditRecord> {
        self.project(limit, |r| r.decision == AuditDecision::Deny)
    }
}

/// Renders records as CSV, header first, for external audit tooling.
pub fn export_csv(records: &[AuditRecord]) -> String {
    let mut out = String::from(
        "timestamp,user_id,username,query_text,tables,columns,decision,reason\n",
    );
    for record in records {
        let decision = match record.decision {
            AuditDecision::Allow => "ALLOW",
            AuditDecision::Deny => "DENY",
            AuditDecision::Error => "ERROR",
        };
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            record.timestamp.to_rfc3339(),
            record.user_id,
            csv_field(&record.username),
            csv_field(&record.query_text),
            csv_field(&record.tables.join(" ")),
            csv_field(&record.columns.join(" ")),
            decision,
            csv_field(record.reason.as_deref().unwrap_or("")),
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: u64, decision: AuditDecision, table: &str) -> AuditRecord {
        AuditRecord::new(
            UserId::new(user),
            format!("user_{user}"),
            format!("SELECT * FROM {table}"),
            vec![table.to_string()],
            vec![format!("{table}.id")],
            decision,
            None,
        )
    }

    #[test]
    fn test_append_and_count() {
        let log = MemoryAuditLog::new();
        assert_eq!(log.count(), 0);

        let id = log
            .append(record(1, AuditDecision::Allow, "employees"))
            .expect("append must succeed");

        assert_eq!(log.count(), 1);
        assert_eq!(log.recent(10)[0].record_id, id);
    }

    #[test]
    fn test_projections_newest_first() {
        let log = MemoryAuditLog::new();
        let first = log
            .append(record(1, AuditDecision::Allow, "employees"))
            .unwrap();
        let second = log
            .append(record(1, AuditDecision::Deny, "employees"))
            .unwrap();

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].record_id, second, "newest must come first");
        assert_eq!(recent[1].record_id, first);
    }

    #[test]
    fn test_by_user() {
        let log = MemoryAuditLog::new();
        log.append(record(1, AuditDecision::Allow, "employees"))
            .unwrap();
        log.append(record(2, AuditDecision::Allow, "employees"))
            .unwrap();
        log.append(record(1, AuditDecision::Deny, "departments"))
            .unwrap();

        assert_eq!(log.by_user(UserId::new(1), 10).len(), 2);
        assert_eq!(log.by_user(UserId::new(2), 10).len(), 1);
        assert_eq!(log.by_user(UserId::new(3), 10).len(), 0);
    }

    #[test]
    fn test_by_table() {
        let log = MemoryAuditLog::new();
        log.append(record(1, AuditDecision::Allow, "employees"))
            .unwrap();
        log.append(record(1, AuditDecision::Allow, "departments"))
            .unwrap();

        let table = TableName::from("employees");
        assert_eq!(log.by_table(&table, 10).len(), 1);
    }

    #[test]
    fn test_denied_projection() {
        let log = MemoryAuditLog::new();
        log.append(record(1, AuditDecision::Allow, "employees"))
            .unwrap();
        log.append(record(1, AuditDecision::Deny, "employees"))
            .unwrap();
        log.append(record(1, AuditDecision::Error, "employees"))
            .unwrap();

        let denied = log.denied(10);
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].decision, AuditDecision::Deny);
    }

    #[test]
    fn test_limit_caps_results() {
        let log = MemoryAuditLog::new();
        for _ in 0..10 {
            log.append(record(1, AuditDecision::Allow, "employees"))
                .unwrap();
        }
        assert_eq!(log.recent(3).len(), 3);
    }

    #[test]
    fn test_immutability() {
        let log = MemoryAuditLog::new();
        let id = log
            .append(record(1, AuditDecision::Deny, "employees"))
            .unwrap();

        let before = log.recent(1)[0].clone();

        // Appending more records must leave the first untouched.
        log.append(record(2, AuditDecision::Allow, "departments"))
            .unwrap();

        let after = log
            .recent(10)
            .into_iter()
            .find(|r| r.record_id == id)
            .expect("original record must still exist");
        assert_eq!(after.timestamp, before.timestamp);
        assert_eq!(after.decision, before.decision);
        assert_eq!(log.count(), 2);
    }

    #[test]
    fn test_export_csv_escapes() {
        let log = MemoryAuditLog::new();
        log.append(AuditRecord::new(
            UserId::new(1),
            "alice",
            "SELECT name, ssn FROM employees",
            vec!["employees".to_string()],
            vec!["employees.name".to_string(), "employees.ssn".to_string()],
            AuditDecision::Deny,
            Some("employees.ssn".to_string()),
        ))
        .unwrap();

        let csv = export_csv(&log.recent(10));
        let mut lines = csv.lines();
        assert!(lines.next().expect("header").starts_with("timestamp,"));
        let row = lines.next().expect("one row");
        assert!(row.contains("\"SELECT name, ssn FROM employees\""));
        assert!(row.contains("DENY"));
    }

    #[test]
    fn test_export_json_roundtrips() {
        let log = MemoryAuditLog::new();
        log.append(record(1, AuditDecision::Allow, "employees"))
            .unwrap();

        let json = log.export_json().expect("export must succeed");
        let parsed: Vec<AuditRecord> = serde_json::from_str(&json).expect("must parse");
        assert_eq!(parsed.len(), 1);
    }
}
