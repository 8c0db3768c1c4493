//! libSQL backend — `RoutingStore` and `CaseStore` over a local database.
//!
//! Supports local file and in-memory databases. The seeding helpers
//! (`insert_rule`, `insert_case`, `insert_message`) are inherent methods:
//! the router itself never creates rows.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::routing::types::{CaseId, Message, RoutingId, RuleRow};
use crate::store::migrations;
use crate::store::traits::{CaseStore, RoutingStore};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        migrations::run_migrations(backend.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Seeding / inspection ────────────────────────────────────────

    /// Insert a routing rule. Returns its row id.
    pub async fn insert_rule(
        &self,
        routing_email: &str,
        routing: RoutingId,
        allow_routing_cc: Option<&str>,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO routing_rules (routing_email, routing, allow_routing_cc, isinactive)
             VALUES (?1, ?2, ?3, 'F')",
            params![routing_email, routing, opt_text(allow_routing_cc)],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_rule: {e}")))?;

        let id = conn.last_insert_rowid();
        debug!(id, routing_email, routing, "Routing rule inserted");
        Ok(id)
    }

    /// Mark a rule active or inactive.
    pub async fn set_rule_active(&self, rule_id: i64, active: bool) -> Result<(), DatabaseError> {
        let flag = if active { "F" } else { "T" };
        let updated = self
            .conn()
            .execute(
                "UPDATE routing_rules SET isinactive = ?1 WHERE id = ?2",
                params![flag, rule_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_rule_active: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "routing_rule".into(),
                id: rule_id.to_string(),
            });
        }
        Ok(())
    }

    /// Insert an unassigned case. Returns its id.
    pub async fn insert_case(&self, subject: Option<&str>) -> Result<CaseId, DatabaseError> {
        let conn = self.conn();
        let now = format_timestamp(Utc::now());
        conn.execute(
            "INSERT INTO cases (subject, assigned, created_at, updated_at)
             VALUES (?1, NULL, ?2, ?2)",
            params![opt_text(subject), now],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_case: {e}")))?;

        let id = conn.last_insert_rowid();
        debug!(case_id = id, "Case inserted");
        Ok(id)
    }

    /// Attach a message to a case. Returns the generated message id.
    pub async fn insert_message(
        &self,
        case_id: CaseId,
        to: Option<&str>,
        cc: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        self.conn()
            .execute(
                "INSERT INTO messages (id, case_id, to_recipients, cc_recipients, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.clone(),
                    case_id,
                    opt_text(to),
                    opt_text(cc),
                    format_timestamp(sent_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_message: {e}")))?;

        debug!(id = %id, case_id, "Message inserted");
        Ok(id)
    }

    /// Read back a case's assigned routing target.
    pub async fn get_assigned(&self, case_id: CaseId) -> Result<Option<RoutingId>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT assigned FROM cases WHERE id = ?1", params![case_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("get_assigned: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).ok()),
            Ok(None) => Err(DatabaseError::NotFound {
                entity: "case".into(),
                id: case_id.to_string(),
            }),
            Err(e) => Err(DatabaseError::Query(format!("get_assigned: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width RFC 3339 so lexical order in SQL matches time order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Read a nullable TEXT column. Only NULL maps to `None`.
fn nullable_text(row: &libsql::Row, idx: i32, column: &str) -> Result<Option<String>, DatabaseError> {
    let value = row
        .get_value(idx)
        .map_err(|e| DatabaseError::Query(format!("row parse {column}: {e}")))?;
    match value {
        libsql::Value::Null => Ok(None),
        libsql::Value::Text(s) => Ok(Some(s)),
        other => Err(DatabaseError::Query(format!(
            "row parse {column}: expected text or NULL, got {other:?}"
        ))),
    }
}

/// Map a libsql Row to a RuleRow.
///
/// Column order: 0:routing_email, 1:routing, 2:allow_routing_cc
fn row_to_rule(row: &libsql::Row) -> Result<RuleRow, DatabaseError> {
    Ok(RuleRow {
        routing_email: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("row parse routing_email: {e}")))?,
        routing: row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("row parse routing: {e}")))?,
        allow_routing_cc: nullable_text(row, 2, "allow_routing_cc")?,
    })
}

/// Map a libsql Row to a Message.
///
/// Column order: 0:to_recipients, 1:cc_recipients
fn row_to_message(row: &libsql::Row) -> Result<Message, DatabaseError> {
    Ok(Message {
        to: nullable_text(row, 0, "to_recipients")?,
        cc: nullable_text(row, 1, "cc_recipients")?,
    })
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl RoutingStore for LibSqlBackend {
    async fn active_rules(&self) -> Result<Vec<RuleRow>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT routing_email, routing, allow_routing_cc
                 FROM routing_rules
                 WHERE isinactive = 'F'
                 ORDER BY id ASC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("active_rules: {e}")))?;

        let mut rules = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("active_rules: {e}")))?
        {
            rules.push(row_to_rule(&row)?);
        }
        Ok(rules)
    }

    async fn first_message(&self, case_id: CaseId) -> Result<Option<Message>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT to_recipients, cc_recipients
                 FROM messages
                 WHERE case_id = ?1
                   AND sent_at = (SELECT MIN(sent_at) FROM messages WHERE case_id = ?1)
                 LIMIT 1",
                params![case_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("first_message: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_message(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("first_message: {e}"))),
        }
    }
}

#[async_trait]
impl CaseStore for LibSqlBackend {
    async fn set_assigned(
        &self,
        case_id: CaseId,
        routing: RoutingId,
    ) -> Result<(), DatabaseError> {
        let now = format_timestamp(Utc::now());
        let updated = self
            .conn()
            .execute(
                "UPDATE cases SET assigned = ?1, updated_at = ?2 WHERE id = ?3",
                params![routing, now, case_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_assigned: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "case".into(),
                id: case_id.to_string(),
            });
        }

        debug!(case_id, routing, "Case assignment updated in DB");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    // ── Rules ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn active_rules_in_insert_order() {
        let db = test_db().await;
        db.insert_rule("Sales@X.com ", 10, Some("T")).await.unwrap();
        db.insert_rule("support@x.com", 20, None).await.unwrap();

        let rules = db.active_rules().await.unwrap();
        assert_eq!(
            rules,
            vec![
                RuleRow {
                    routing_email: "Sales@X.com ".into(),
                    routing: 10,
                    allow_routing_cc: Some("T".into()),
                },
                RuleRow {
                    routing_email: "support@x.com".into(),
                    routing: 20,
                    allow_routing_cc: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn inactive_rules_are_skipped() {
        let db = test_db().await;
        let hidden = db.insert_rule("old@x.com", 1, None).await.unwrap();
        db.insert_rule("new@x.com", 2, None).await.unwrap();
        db.set_rule_active(hidden, false).await.unwrap();

        let rules = db.active_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].routing, 2);

        db.set_rule_active(hidden, true).await.unwrap();
        assert_eq!(db.active_rules().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn set_rule_active_unknown_id() {
        let db = test_db().await;
        let err = db.set_rule_active(999, false).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn no_rules_is_empty() {
        let db = test_db().await;
        assert!(db.active_rules().await.unwrap().is_empty());
    }

    // ── Messages ────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_message_is_earliest() {
        let db = test_db().await;
        let case_id = db.insert_case(Some("Help")).await.unwrap();
        let t0 = Utc::now();

        db.insert_message(case_id, Some("later@x.com"), None, t0 + Duration::minutes(5))
            .await
            .unwrap();
        db.insert_message(case_id, Some("first@x.com"), Some("cc@x.com"), t0)
            .await
            .unwrap();
        db.insert_message(
            case_id,
            Some("sub-second@x.com"),
            None,
            t0 + Duration::milliseconds(1),
        )
        .await
        .unwrap();

        let message = db.first_message(case_id).await.unwrap().unwrap();
        assert_eq!(message, Message::new(Some("first@x.com"), Some("cc@x.com")));
    }

    #[tokio::test]
    async fn first_message_ignores_other_cases() {
        let db = test_db().await;
        let mine = db.insert_case(None).await.unwrap();
        let other = db.insert_case(None).await.unwrap();
        let t0 = Utc::now();

        db.insert_message(other, Some("other@x.com"), None, t0 - Duration::hours(1))
            .await
            .unwrap();
        db.insert_message(mine, Some("mine@x.com"), None, t0)
            .await
            .unwrap();

        let message = db.first_message(mine).await.unwrap().unwrap();
        assert_eq!(message.to.as_deref(), Some("mine@x.com"));
    }

    #[tokio::test]
    async fn first_message_absent() {
        let db = test_db().await;
        let case_id = db.insert_case(None).await.unwrap();
        assert!(db.first_message(case_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn null_recipients_read_as_none() {
        let db = test_db().await;
        let case_id = db.insert_case(None).await.unwrap();
        db.insert_message(case_id, None, None, Utc::now())
            .await
            .unwrap();

        let message = db.first_message(case_id).await.unwrap().unwrap();
        assert_eq!(message, Message::default());
    }

    #[tokio::test]
    async fn non_text_recipients_are_an_error() {
        let db = test_db().await;
        let case_id = db.insert_case(None).await.unwrap();
        // A blob keeps its storage class under TEXT affinity
        db.conn()
            .execute(
                "INSERT INTO messages (id, case_id, to_recipients, cc_recipients, sent_at)
                 VALUES ('m1', ?1, X'00FF', NULL, ?2)",
                params![case_id, format_timestamp(Utc::now())],
            )
            .await
            .unwrap();

        let err = db.first_message(case_id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Query(ref msg) if msg.contains("to_recipients")));
    }

    // ── Cases ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn set_and_get_assigned() {
        let db = test_db().await;
        let case_id = db.insert_case(Some("Billing")).await.unwrap();
        assert_eq!(db.get_assigned(case_id).await.unwrap(), None);

        db.set_assigned(case_id, 10).await.unwrap();
        assert_eq!(db.get_assigned(case_id).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn set_assigned_unknown_case() {
        let db = test_db().await;
        let err = db.set_assigned(404, 10).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { ref entity, .. } if entity == "case"));
    }

    #[tokio::test]
    async fn get_assigned_unknown_case() {
        let db = test_db().await;
        assert!(matches!(
            db.get_assigned(404).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    // ── File-backed ─────────────────────────────────────────────────

    #[tokio::test]
    async fn new_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("router.db");
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        db.insert_rule("a@x.com", 1, None).await.unwrap();
        assert!(db_path.exists());
        drop(db);

        // Reopen: migrations are idempotent and data persists
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert_eq!(db.active_rules().await.unwrap().len(), 1);
    }
}
