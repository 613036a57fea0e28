//! Database schema migrations for rota.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const CURRENT_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: engineers, releases and their staffing.
///
/// `position` keeps the order members were assigned in, so a release reads
/// back exactly as it was saved.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS engineers (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            slack_id    TEXT,
            discipline  TEXT NOT NULL,
            pod         TEXT NOT NULL,
            weight      INTEGER NOT NULL DEFAULT 0 CHECK (weight >= 0),
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS releases (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            date        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS release_assignments (
            release_id  TEXT NOT NULL REFERENCES releases(id) ON DELETE CASCADE,
            engineer_id TEXT NOT NULL REFERENCES engineers(id) ON DELETE CASCADE,
            role        TEXT NOT NULL,
            position    INTEGER NOT NULL,
            PRIMARY KEY (release_id, engineer_id)
        );

        CREATE INDEX IF NOT EXISTS idx_engineers_discipline_weight ON engineers(discipline, weight);
        CREATE INDEX IF NOT EXISTS idx_releases_date ON releases(date);
        CREATE INDEX IF NOT EXISTS idx_assignments_engineer ON release_assignments(engineer_id);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: reminders sent to assignees.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS reminders (
            id                TEXT PRIMARY KEY,
            engineer_id       TEXT NOT NULL,
            release_id        TEXT NOT NULL,
            slack_reminder_id TEXT NOT NULL,
            remind_at         TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reminders_engineer_release ON reminders(engineer_id, release_id);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), CURRENT_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), CURRENT_VERSION);
    }

    #[test]
    fn weight_cannot_go_negative_at_the_schema_level() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let err = conn.execute(
            "INSERT INTO engineers (id, name, discipline, pod, weight, created_at)
             VALUES ('e', 'E', 'front_end', 'x', -1, '2024-01-01T00:00:00+00:00')",
            [],
        );
        assert!(err.is_err());
    }
}
