//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::info!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE institutions (
            institution_id BLOB PRIMARY KEY,   -- 16 bytes, UUID
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE
        );

        CREATE TABLE cryptographic_keys (
            key_id BLOB PRIMARY KEY,           -- 16 bytes, UUID
            institution_id BLOB NOT NULL,
            public_key BLOB NOT NULL,          -- key material as submitted
            fingerprint BLOB NOT NULL UNIQUE,  -- 32 bytes, SHA-256 of SPKI DER
            algorithm TEXT NOT NULL,
            key_size INTEGER NOT NULL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            revoked_at INTEGER,
            revocation_reason TEXT,
            parent_key_id BLOB,                -- weak reference, no FK
            validated_by TEXT,
            validated_at INTEGER,
            metadata TEXT NOT NULL DEFAULT 'null'
        );

        CREATE TABLE key_rotations (
            rotation_id BLOB PRIMARY KEY,
            old_key_id BLOB NOT NULL,
            new_key_id BLOB NOT NULL,
            rotation_type TEXT NOT NULL,
            reason TEXT NOT NULL,
            actor TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        );

        CREATE TABLE signed_documents (
            document_id BLOB PRIMARY KEY,
            institution_id BLOB NOT NULL,
            key_id BLOB NOT NULL,
            document_hash TEXT NOT NULL UNIQUE, -- lowercase hex SHA-256
            signature BLOB NOT NULL,
            status TEXT NOT NULL,
            signed_at INTEGER NOT NULL,
            revoked_at INTEGER,
            revocation_reason TEXT
        );

        CREATE TABLE suspicious_reports (
            report_id BLOB PRIMARY KEY,
            document_id BLOB,                  -- set when the hash was known
            document_hash TEXT NOT NULL,
            report_type TEXT NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL,
            reporter_email TEXT,
            reporter_name TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE audit_logs (
            audit_id BLOB PRIMARY KEY,
            actor TEXT,
            action_type TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT,
            ip TEXT NOT NULL,
            user_agent TEXT NOT NULL,
            success INTEGER NOT NULL,
            details TEXT NOT NULL,             -- JSON object
            timestamp INTEGER NOT NULL
        );

        -- Audit rows are write-once
        CREATE TRIGGER audit_logs_no_update
        BEFORE UPDATE ON audit_logs
        BEGIN
            SELECT RAISE(ABORT, 'audit_logs rows are immutable');
        END;

        CREATE TRIGGER audit_logs_no_delete
        BEFORE DELETE ON audit_logs
        BEGIN
            SELECT RAISE(ABORT, 'audit_logs rows are immutable');
        END;

        CREATE INDEX idx_keys_institution_status ON cryptographic_keys(institution_id, status);
        CREATE INDEX idx_keys_expires ON cryptographic_keys(expires_at);
        CREATE INDEX idx_rotations_old ON key_rotations(old_key_id);
        CREATE INDEX idx_rotations_new ON key_rotations(new_key_id);
        CREATE INDEX idx_reports_hash ON suspicious_reports(document_hash);
        CREATE INDEX idx_audit_action_ts ON audit_logs(action_type, timestamp);
        CREATE INDEX idx_audit_resource ON audit_logs(resource_type, resource_id);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "institutions",
            "cryptographic_keys",
            "key_rotations",
            "signed_documents",
            "suspicious_reports",
            "audit_logs",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }

    #[test]
    fn test_audit_rows_reject_update() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO audit_logs (audit_id, action_type, resource_type, ip, user_agent,
                                     success, details, timestamp)
             VALUES (x'00', 'VERIFY', 'DOCUMENT', '', '', 0, '{}', 1)",
            [],
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE audit_logs SET success = 1", [])
            .is_err());
        assert!(conn.execute("DELETE FROM audit_logs", []).is_err());
    }
}
