//! The authorization orchestrator.

use std::sync::{Arc, Mutex};

use tourmaline_compliance::{AuditDecision, AuditRecord, AuditStore};
use tourmaline_config::TourmalineConfig;
use tourmaline_crypto::{ColumnCipherManager, CryptoError, KeyStore, MasterKey};
use tourmaline_query::{QueryReference, extract_references};
use tourmaline_rbac::{PermissionStore, Role, Verdict, evaluate};
use tourmaline_types::{ColumnName, SchemaCatalog, TableName, UserId, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::store::{ExecutionStore, ResultSet, StoreError};

/// The identity a request runs as.
///
/// Credentials live with the authentication collaborator; by the time a
/// statement reaches the engine the caller is already authenticated.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl UserContext {
    pub fn new(id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
        }
    }
}

/// Per-request lifecycle, used for structured tracing.
///
/// `Received → Parsed → Evaluated → {Executed | Denied} → Logged`; any
/// failure before execution short-circuits straight to `Logged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestPhase {
    Received,
    Parsed,
    Evaluated,
    Executed,
    Denied,
    Logged,
}

/// Result of a successful authorized execution.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Result column names.
    pub columns: Vec<ColumnName>,
    /// Result rows with permitted encrypted columns decrypted.
    pub rows: Vec<Vec<Value>>,
    /// The audit record written for this request.
    pub audit_id: Uuid,
}

/// The query-authorization and selective-decryption engine.
///
/// Wires the reference extractor, permission evaluator, column cipher
/// manager, execution store, and audit log into one request pipeline. The
/// engine holds no per-request state; the request gate serializes the
/// decision, execution, and audit write of each request into one logical
/// transaction scope.
pub struct Tourmaline {
    config: TourmalineConfig,
    catalog: Arc<dyn SchemaCatalog>,
    permissions: Arc<dyn PermissionStore>,
    cipher: ColumnCipherManager,
    store: Arc<dyn ExecutionStore>,
    audit: Arc<dyn AuditStore>,
    gate: Mutex<()>,
}

impl Tourmaline {
    /// Builds an engine from an already-derived master key.
    pub fn new(
        config: TourmalineConfig,
        catalog: Arc<dyn SchemaCatalog>,
        permissions: Arc<dyn PermissionStore>,
        master: MasterKey,
        key_store: Arc<dyn KeyStore>,
        store: Arc<dyn ExecutionStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            config,
            catalog,
            permissions,
            cipher: ColumnCipherManager::new(master, key_store),
            store,
            audit,
            gate: Mutex::new(()),
        }
    }

    /// Builds an engine, deriving the master key from the passphrase in
    /// the environment variable named by the configuration.
    ///
    /// The passphrase is read once at startup; the derived key lives in
    /// memory for the process lifetime and is zeroed on shutdown.
    pub fn open(
        config: TourmalineConfig,
        catalog: Arc<dyn SchemaCatalog>,
        permissions: Arc<dyn PermissionStore>,
        key_store: Arc<dyn KeyStore>,
        store: Arc<dyn ExecutionStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Result<Self> {
        let passphrase = std::env::var(&config.security.passphrase_env).map_err(|_| {
            EngineError::Config(format!(
                "master passphrase not set in ${}",
                config.security.passphrase_env
            ))
        })?;
        let master = MasterKey::derive(&passphrase, config.security.kdf_salt.as_bytes());

        info!("master key derived; engine ready");
        Ok(Self::new(
            config,
            catalog,
            permissions,
            master,
            key_store,
            store,
            audit,
        ))
    }

    /// Tears the engine down, releasing the master key.
    pub fn shutdown(self) {
        info!("engine shut down; master key released");
        // MasterKey is zeroed on drop.
    }

    // ========================================================================
    // Exposed surface
    // ========================================================================

    /// Authorizes, executes, and selectively decrypts one statement.
    ///
    /// Exactly one audit record is written per call, before the outcome is
    /// returned. Identical calls under unchanged permissions yield
    /// identical decisions and a distinct audit entry per call.
    pub fn authorize_and_execute(&self, user: &UserContext, sql: &str) -> Result<QueryOutcome> {
        // Decision, execution, and audit write form one transaction scope.
        let _gate = self.gate.lock().expect("request gate poisoned");

        debug!(user = %user.id, phase = ?RequestPhase::Received, "request received");

        // RECEIVED -> PARSED
        let refs = match extract_references(sql, self.catalog.as_ref()) {
            Ok(refs) => refs,
            Err(e) => {
                let reason = e.to_string();
                self.record(user, sql, None, AuditDecision::Error, Some(reason))?;
                return Err(EngineError::Parse(e));
            }
        };
        debug!(user = %user.id, phase = ?RequestPhase::Parsed, tables = ?refs.table_names(), "references extracted");

        // PARSED -> EVALUATED. Admin bypasses the permission lookup but is
        // still audited below.
        let permission_rows = if user.role.bypasses_permission_checks() {
            Vec::new()
        } else {
            self.permissions.permissions_for(user.id)
        };
        let verdict = evaluate(
            user.role,
            &permission_rows,
            refs.pairs(),
            self.catalog.as_ref(),
        );
        debug!(user = %user.id, phase = ?RequestPhase::Evaluated, "permissions evaluated");

        if let Verdict::Deny { table, column } = verdict {
            warn!(
                user = %user.id,
                phase = ?RequestPhase::Denied,
                reason = %format!("{table}.{column}"),
                "statement denied"
            );
            self.record(
                user,
                sql,
                Some(&refs),
                AuditDecision::Deny,
                Some(format!("{table}.{column}")),
            )?;
            return Err(EngineError::Denied { table, column });
        }

        // EVALUATED -> EXECUTED
        let result = match self.execute_in_transaction(sql) {
            Ok(result) => result,
            Err(e) => {
                self.record(
                    user,
                    sql,
                    Some(&refs),
                    AuditDecision::Error,
                    Some(e.to_string()),
                )?;
                return Err(EngineError::Execution(e));
            }
        };

        // Decrypt permitted secured columns.
        let result = match self.decrypt_result(&refs, result) {
            Ok(result) => result,
            Err(e) => {
                self.record(
                    user,
                    sql,
                    Some(&refs),
                    AuditDecision::Error,
                    Some(e.to_string()),
                )?;
                return Err(EngineError::Crypto(e));
            }
        };
        debug!(user = %user.id, phase = ?RequestPhase::Executed, rows = result.rows.len(), "statement executed");

        // EXECUTED -> LOGGED
        let audit_id = self.record(user, sql, Some(&refs), AuditDecision::Allow, None)?;
        info!(user = %user.id, phase = ?RequestPhase::Logged, %audit_id, "request complete");

        Ok(QueryOutcome {
            columns: result.columns,
            rows: result.rows,
            audit_id,
        })
    }

    /// Secures a column: installs a fresh key and re-encrypts the existing
    /// plaintext values. Errors if the column already has a key.
    pub fn secure_column(
        &self,
        actor: &UserContext,
        table: &TableName,
        column: &ColumnName,
    ) -> Result<Uuid> {
        let key_id = self.cipher.secure(table, column)?;

        self.store
            .rewrite_column(table, column, &|value| match value {
                Value::Null => Ok(Value::Null),
                plain => self
                    .encrypt_cell(table, column, plain)
                    .map_err(|e| StoreError::Fault(e.to_string())),
            })?;

        self.record_action(actor, format!("SECURE {table}.{column}"), table, column)?;
        Ok(key_id)
    }

    /// Rotates a column's key. Old ciphertext stays readable only if
    /// `re_encrypt` is set, which decrypts under the outgoing key first.
    pub fn rotate_column_key(
        &self,
        actor: &UserContext,
        table: &TableName,
        column: &ColumnName,
        re_encrypt: bool,
    ) -> Result<Uuid> {
        if re_encrypt {
            // Back to plaintext under the outgoing key.
            self.store
                .rewrite_column(table, column, &|value| match value {
                    Value::Bytes(data) => self
                        .decrypt_cell(table, column, data)
                        .map_err(|e| StoreError::Fault(e.to_string())),
                    other => Ok(other.clone()),
                })?;
        }

        let key_id = self.cipher.rotate(table, column)?;

        if re_encrypt {
            self.store
                .rewrite_column(table, column, &|value| match value {
                    Value::Null => Ok(Value::Null),
                    plain => self
                        .encrypt_cell(table, column, plain)
                        .map_err(|e| StoreError::Fault(e.to_string())),
                })?;
        }

        self.record_action(actor, format!("ROTATE {table}.{column}"), table, column)?;
        Ok(key_id)
    }

    /// Encrypts one cell for ingestion into a secured column.
    pub fn encrypt_cell(
        &self,
        table: &TableName,
        column: &ColumnName,
        value: &Value,
    ) -> Result<Value> {
        let plaintext = serde_json::to_vec(value)
            .map_err(|e| EngineError::Crypto(CryptoError::CipherFailure(e.to_string())))?;
        let ciphertext = self.cipher.encrypt(table, column, &plaintext)?;
        Ok(Value::Bytes(ciphertext))
    }

    fn decrypt_cell(
        &self,
        table: &TableName,
        column: &ColumnName,
        data: &[u8],
    ) -> std::result::Result<Value, CryptoError> {
        let plaintext = self.cipher.decrypt(table, column, data)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CryptoError::MalformedCiphertext(e.to_string()))
    }

    /// Records for one user, newest first.
    pub fn logs_by_user(&self, user: UserId, limit: usize) -> Vec<AuditRecord> {
        self.audit.by_user(user, self.effective_limit(limit))
    }

    /// Records touching one table, newest first.
    pub fn logs_by_table(&self, table: &TableName, limit: usize) -> Vec<AuditRecord> {
        self.audit.by_table(table, self.effective_limit(limit))
    }

    /// Most recent records, newest first.
    pub fn logs_recent(&self, limit: usize) -> Vec<AuditRecord> {
        self.audit.recent(self.effective_limit(limit))
    }

    /// Denied attempts, newest first.
    pub fn logs_denied(&self, limit: usize) -> Vec<AuditRecord> {
        self.audit.denied(self.effective_limit(limit))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn effective_limit(&self, limit: usize) -> usize {
        if limit == 0 {
            self.config.audit.default_limit
        } else {
            limit
        }
    }

    /// Runs one statement inside a transaction scope, bounded by the
    /// configured statement timeout.
    ///
    /// Store calls are synchronous and cannot be interrupted mid-flight;
    /// an overrun is classified as a timeout once the call returns, so the
    /// caller sees an execution error, never a denial.
    fn execute_in_transaction(&self, sql: &str) -> std::result::Result<ResultSet, StoreError> {
        let timeout_ms = self.config.store.statement_timeout_ms;
        let started = std::time::Instant::now();

        self.store.begin()?;
        let result = self.store.execute(sql)?;
        self.store.commit()?;

        if started.elapsed() > std::time::Duration::from_millis(timeout_ms) {
            return Err(StoreError::Timeout(timeout_ms));
        }
        Ok(result)
    }

    /// Decrypts every result cell that belongs to a referenced, secured
    /// column. The evaluator has already allowed every referenced column,
    /// so reaching this point is the authorization to decrypt.
    fn decrypt_result(
        &self,
        refs: &QueryReference,
        mut result: ResultSet,
    ) -> std::result::Result<ResultSet, CryptoError> {
        for (idx, column) in result.columns.iter().enumerate() {
            // Result columns carry no table qualifier; candidate tables
            // come from the reference set.
            let candidates: Vec<&TableName> = refs
                .pairs()
                .filter(|&(t, c)| c == column && self.cipher.is_secured(t, c))
                .map(|(t, _)| t)
                .collect();
            if candidates.is_empty() {
                continue;
            }

            for row in &mut result.rows {
                let Value::Bytes(data) = &row[idx] else {
                    continue;
                };

                let mut decrypted = None;
                let mut last_error = CryptoError::AuthenticationFailed;
                for &table in &candidates {
                    match self.decrypt_cell(table, column, data) {
                        Ok(value) => {
                            decrypted = Some(value);
                            break;
                        }
                        Err(e) => last_error = e,
                    }
                }

                match decrypted {
                    Some(value) => row[idx] = value,
                    None => return Err(last_error),
                }
            }
        }

        Ok(result)
    }

    fn record(
        &self,
        user: &UserContext,
        sql: &str,
        refs: Option<&QueryReference>,
        decision: AuditDecision,
        reason: Option<String>,
    ) -> Result<Uuid> {
        let (tables, columns) = refs
            .map(|r| (r.table_names(), r.column_names()))
            .unwrap_or_default();

        let record = AuditRecord::new(
            user.id,
            user.username.clone(),
            sql,
            tables,
            columns,
            decision,
            reason,
        );

        // An append failure escalates the whole operation.
        self.audit.append(record).map_err(EngineError::AuditWrite)
    }

    fn record_action(
        &self,
        actor: &UserContext,
        action: String,
        table: &TableName,
        column: &ColumnName,
    ) -> Result<Uuid> {
        let record = AuditRecord::new(
            actor.id,
            actor.username.clone(),
            action,
            vec![table.to_string()],
            vec![format!("{table}.{column}")],
            AuditDecision::Allow,
            None,
        );
        self.audit.append(record).map_err(EngineError::AuditWrite)
    }
}

impl std::fmt::Debug for Tourmaline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tourmaline")
            .field("config", &self.config)
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}
