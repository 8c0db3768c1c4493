//! Schema setup for the libSQL backend.
//!
//! `schema_migrations` records which numbered steps have run. Each pending
//! step runs inside its own transaction together with its ledger row, so a
//! failed step leaves neither schema nor record behind.

use std::collections::BTreeSet;

use libsql::Connection;
use tracing::{debug, info};

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS routing_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            routing_email TEXT NOT NULL,
            routing INTEGER NOT NULL,
            allow_routing_cc TEXT,
            isinactive TEXT NOT NULL DEFAULT 'F'
        );
        CREATE INDEX IF NOT EXISTS idx_routing_rules_inactive ON routing_rules(isinactive);

        CREATE TABLE IF NOT EXISTS cases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject TEXT,
            assigned INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            case_id INTEGER NOT NULL REFERENCES cases(id) ON DELETE CASCADE,
            to_recipients TEXT,
            cc_recipients TEXT,
            sent_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_case_sent ON messages(case_id, sent_at);
    "#,
}];

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Bring the schema up to the newest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(LEDGER_DDL, ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("schema_migrations: {e}")))?;

    let applied = applied_versions(conn).await?;
    let mut ran = 0;
    for step in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        apply(conn, step).await?;
        ran += 1;
    }

    if ran > 0 {
        info!(applied = ran, "Schema migrated");
    } else {
        debug!("Schema up to date");
    }
    Ok(())
}

async fn apply(conn: &Connection, step: &Migration) -> Result<(), DatabaseError> {
    let fail = |what: &str, e: libsql::Error| {
        DatabaseError::Migration(format!("V{} {} {what}: {e}", step.version, step.name))
    };

    info!(version = step.version, name = step.name, "Applying migration");
    let tx = conn.transaction().await.map_err(|e| fail("begin", e))?;
    tx.execute_batch(step.sql).await.map_err(|e| fail("ddl", e))?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
        libsql::params![step.version, step.name],
    )
    .await
    .map_err(|e| fail("record", e))?;
    tx.commit().await.map_err(|e| fail("commit", e))
}

/// Versions already recorded in the ledger.
async fn applied_versions(conn: &Connection) -> Result<BTreeSet<i64>, DatabaseError> {
    let read_err = |e: libsql::Error| DatabaseError::Migration(format!("reading ledger: {e}"));

    let mut rows = conn
        .query("SELECT version FROM schema_migrations", ())
        .await
        .map_err(read_err)?;
    let mut versions = BTreeSet::new();
    while let Some(row) = rows.next().await.map_err(read_err)? {
        versions.insert(row.get::<i64>(0).map_err(read_err)?);
    }
    Ok(versions)
}
