//! SQLite-based storage for the engineer pool, releases and reminders.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::data_dir;
use super::migrations;
use super::traits::{EngineerPool, ReleaseStore, ReminderStore};
use crate::error::{CoreError, DatabaseError, Result};
use crate::notify::Reminder;
use crate::roster::{Discipline, Engineer, NewEngineer, Release, Role};

const ENGINEER_COLUMNS: &str = "id, name, slack_id, discipline, pod, weight, created_at";

// === Helper Functions ===

/// Fixed-width UTC timestamp so that text comparison matches time order.
fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_role(idx: usize, role_str: &str) -> Result<Role, rusqlite::Error> {
    role_str
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Build an Engineer from a row selected with [`ENGINEER_COLUMNS`]
fn row_to_engineer(row: &rusqlite::Row) -> Result<Engineer, rusqlite::Error> {
    let discipline_str: String = row.get(3)?;
    let discipline: Discipline = discipline_str
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let created_at_str: String = row.get(6)?;

    Ok(Engineer {
        id: row.get(0)?,
        name: row.get(1)?,
        slack_id: row.get(2)?,
        discipline,
        pod: row.get(4)?,
        weight: row.get(5)?,
        created_at: parse_datetime_fallback(&created_at_str),
    })
}

/// Build a Release (without staffing) from `id, name, date, created_at`
fn row_to_release(row: &rusqlite::Row) -> Result<Release, rusqlite::Error> {
    let date_str: String = row.get(2)?;
    let created_at_str: String = row.get(3)?;
    Ok(Release {
        id: row.get(0)?,
        name: row.get(1)?,
        date: parse_datetime_fallback(&date_str),
        primary: Vec::new(),
        backup: Vec::new(),
        created_at: parse_datetime_fallback(&created_at_str),
    })
}

fn load_staffing(conn: &Connection, release: &mut Release) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT engineer_id, role FROM release_assignments
         WHERE release_id = ?1
         ORDER BY position",
    )?;
    let rows = stmt.query_map(params![release.id], |row| {
        let role_str: String = row.get(1)?;
        Ok((row.get::<_, String>(0)?, parse_role(1, &role_str)?))
    })?;

    release.primary.clear();
    release.backup.clear();
    for row in rows {
        let (engineer_id, role) = row?;
        match role {
            Role::Primary => release.primary.push(engineer_id),
            Role::Backup => release.backup.push(engineer_id),
        }
    }
    Ok(())
}

/// Run `query` (selecting `id, name, date, created_at`) and attach staffing.
fn query_releases<P: rusqlite::Params>(
    conn: &Connection,
    query: &str,
    params: P,
) -> Result<Vec<Release>, rusqlite::Error> {
    let mut stmt = conn.prepare(query)?;
    let mut releases = stmt
        .query_map(params, row_to_release)?
        .collect::<Result<Vec<Release>, _>>()?;
    for release in &mut releases {
        load_staffing(conn, release)?;
    }
    Ok(releases)
}

fn load_release(conn: &Connection, release_id: &str) -> Result<Option<Release>, rusqlite::Error> {
    let release = conn
        .query_row(
            "SELECT id, name, date, created_at FROM releases WHERE id = ?1",
            params![release_id],
            row_to_release,
        )
        .optional()?;
    match release {
        Some(mut release) => {
            load_staffing(conn, &mut release)?;
            Ok(Some(release))
        }
        None => Ok(None),
    }
}

fn insert_members(
    conn: &Connection,
    release_id: &str,
    members: &[String],
    role: Role,
    first_position: usize,
) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "INSERT INTO release_assignments (release_id, engineer_id, role, position)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (offset, engineer_id) in members.iter().enumerate() {
        stmt.execute(params![
            release_id,
            engineer_id,
            role.as_str(),
            (first_position + offset) as i64
        ])?;
    }
    Ok(())
}

/// Run `f` inside `BEGIN IMMEDIATE`, committing on success and rolling back
/// on error.
fn in_transaction<T>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT;")?;
            Ok(value)
        }
        Err(err) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(err)
        }
    }
}

/// SQLite database for the on-call roster.
///
/// The connection sits behind a mutex so one `RosterDb` can be shared across
/// threads. Every weight change is a single `UPDATE` statement, which SQLite
/// executes atomically, so separate processes sharing the file also see a
/// consistent ledger.
pub struct RosterDb {
    conn: Mutex<Connection>,
}

impl RosterDb {
    /// Open the database at `<data dir>/rota.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("rota.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Locked))
    }

    // === Engineer CRUD ===

    /// Add an engineer to the pool with a weight of zero.
    pub fn create_engineer(&self, new: &NewEngineer) -> Result<Engineer> {
        let engineer = Engineer {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            slack_id: new.slack_id.clone(),
            discipline: new.discipline,
            pod: new.pod.trim().to_string(),
            weight: 0,
            created_at: Utc::now(),
        };
        self.conn()?.execute(
            "INSERT INTO engineers (id, name, slack_id, discipline, pod, weight, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                engineer.id,
                engineer.name,
                engineer.slack_id,
                engineer.discipline.as_str(),
                engineer.pod,
                engineer.weight,
                format_ts(&engineer.created_at),
            ],
        )?;
        Ok(engineer)
    }

    /// All engineers, grouped by discipline in the order they joined.
    pub fn list_engineers(&self) -> Result<Vec<Engineer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENGINEER_COLUMNS} FROM engineers ORDER BY discipline DESC, rowid"
        ))?;
        let engineers = stmt
            .query_map([], row_to_engineer)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(engineers)
    }

    /// Look an engineer up by id, Slack id or exact name.
    pub fn find_engineer(&self, key: &str) -> Result<Option<Engineer>> {
        let conn = self.conn()?;
        let engineer = conn
            .query_row(
                &format!(
                    "SELECT {ENGINEER_COLUMNS} FROM engineers
                     WHERE id = ?1 OR slack_id = ?1 OR name = ?1
                     ORDER BY (id = ?1) DESC, rowid
                     LIMIT 1"
                ),
                params![key],
                row_to_engineer,
            )
            .optional()?;
        Ok(engineer)
    }

    /// Remove an engineer from the pool together with their memberships and
    /// reminder records. Returns false if the engineer did not exist.
    pub fn delete_engineer(&self, engineer_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        in_transaction(&conn, |conn| {
            conn.execute(
                "DELETE FROM reminders WHERE engineer_id = ?1",
                params![engineer_id],
            )?;
            let deleted = conn.execute("DELETE FROM engineers WHERE id = ?1", params![engineer_id])?;
            Ok(deleted > 0)
        })
    }

    /// Engineers holding no role on `release`, lightest first.
    pub fn remaining_pool(&self, release: &Release) -> Result<Vec<Engineer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENGINEER_COLUMNS} FROM engineers
             WHERE id NOT IN (SELECT engineer_id FROM release_assignments WHERE release_id = ?1)
             ORDER BY discipline DESC, weight, rowid"
        ))?;
        let engineers = stmt
            .query_map(params![release.id], row_to_engineer)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(engineers)
    }

    // === Release CRUD ===

    /// Insert a release together with whatever staffing it carries.
    ///
    /// Fails with `AlreadyExists` if the name is taken.
    pub fn create_release(&self, release: &Release) -> Result<Release> {
        let conn = self.conn()?;
        in_transaction(&conn, |conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM releases WHERE name = ?1)",
                params![release.name],
                |row| row.get(0),
            )?;
            if taken {
                return Err(CoreError::AlreadyExists {
                    kind: "Release",
                    name: release.name.clone(),
                });
            }

            conn.execute(
                "INSERT INTO releases (id, name, date, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    release.id,
                    release.name,
                    format_ts(&release.date),
                    format_ts(&release.created_at),
                ],
            )?;
            insert_members(conn, &release.id, &release.primary, Role::Primary, 0)?;
            insert_members(
                conn,
                &release.id,
                &release.backup,
                Role::Backup,
                release.primary.len(),
            )?;
            Ok(())
        })?;

        load_release(&conn, &release.id)?.ok_or_else(|| CoreError::release_not_found(&release.id))
    }

    pub fn get_release_by_name(&self, name: &str) -> Result<Option<Release>> {
        let conn = self.conn()?;
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM releases WHERE name = ?1",
                params![name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => Ok(load_release(&conn, &id)?),
            None => Ok(None),
        }
    }

    /// Rename and/or move a release. Staffing is left untouched.
    pub fn update_release(&self, release_id: &str, name: &str, date: DateTime<Utc>) -> Result<Release> {
        let conn = self.conn()?;
        let clash: Option<String> = conn
            .query_row(
                "SELECT id FROM releases WHERE name = ?1 AND id != ?2",
                params![name, release_id],
                |row| row.get(0),
            )
            .optional()?;
        if clash.is_some() {
            return Err(CoreError::AlreadyExists {
                kind: "Release",
                name: name.to_string(),
            });
        }

        let updated = conn.execute(
            "UPDATE releases SET name = ?1, date = ?2 WHERE id = ?3",
            params![name, format_ts(&date), release_id],
        )?;
        if updated == 0 {
            return Err(CoreError::release_not_found(release_id));
        }
        load_release(&conn, release_id)?.ok_or_else(|| CoreError::release_not_found(release_id))
    }

    /// Most recent releases first.
    pub fn list_releases(&self, limit: usize) -> Result<Vec<Release>> {
        let conn = self.conn()?;
        Ok(query_releases(
            &conn,
            "SELECT id, name, date, created_at FROM releases
             ORDER BY date DESC, rowid DESC
             LIMIT ?1",
            params![limit as i64],
        )?)
    }

    /// Up to `limit` releases dated before `release`, newest first.
    pub fn release_history(&self, release: &Release, limit: usize) -> Result<Vec<Release>> {
        let conn = self.conn()?;
        Ok(query_releases(
            &conn,
            "SELECT id, name, date, created_at FROM releases
             WHERE date < ?1
             ORDER BY date DESC, rowid DESC
             LIMIT ?2",
            params![format_ts(&release.date), limit as i64],
        )?)
    }

    /// Releases after `after` that `engineer_id` holds a role on, oldest first.
    pub fn releases_for_engineer(&self, engineer_id: &str, after: DateTime<Utc>) -> Result<Vec<Release>> {
        let conn = self.conn()?;
        Ok(query_releases(
            &conn,
            "SELECT r.id, r.name, r.date, r.created_at FROM releases r
             JOIN release_assignments a ON a.release_id = r.id
             WHERE a.engineer_id = ?1 AND r.date > ?2
             ORDER BY r.date, r.rowid",
            params![engineer_id, format_ts(&after)],
        )?)
    }

    // === Single memberships ===

    /// Append one membership to a release.
    ///
    /// Fails with `AlreadyAssigned` if the engineer already holds any role on
    /// the release.
    pub fn add_member(&self, release_id: &str, engineer_id: &str, role: Role) -> Result<Release> {
        let conn = self.conn()?;
        in_transaction(&conn, |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT role FROM release_assignments WHERE release_id = ?1 AND engineer_id = ?2",
                    params![release_id, engineer_id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(CoreError::AlreadyAssigned {
                    engineer_id: engineer_id.to_string(),
                    release: release_id.to_string(),
                });
            }
            let next: i64 = conn.query_row(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM release_assignments WHERE release_id = ?1",
                params![release_id],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO release_assignments (release_id, engineer_id, role, position)
                 VALUES (?1, ?2, ?3, ?4)",
                params![release_id, engineer_id, role.as_str(), next],
            )?;
            Ok(())
        })?;
        load_release(&conn, release_id)?.ok_or_else(|| CoreError::release_not_found(release_id))
    }

    /// Drop one membership. Returns false if it did not exist.
    pub fn remove_member(&self, release_id: &str, engineer_id: &str, role: Role) -> Result<bool> {
        let removed = self.conn()?.execute(
            "DELETE FROM release_assignments
             WHERE release_id = ?1 AND engineer_id = ?2 AND role = ?3",
            params![release_id, engineer_id, role.as_str()],
        )?;
        Ok(removed > 0)
    }
}

impl EngineerPool for RosterDb {
    fn list_by_discipline(&self, discipline: Discipline) -> Result<Vec<Engineer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENGINEER_COLUMNS} FROM engineers
             WHERE discipline = ?1
             ORDER BY weight, rowid"
        ))?;
        let engineers = stmt
            .query_map(params![discipline.as_str()], row_to_engineer)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(engineers)
    }

    fn adjust_weight(&self, engineer_id: &str, delta: i64) -> Result<Engineer> {
        let conn = self.conn()?;
        let updated = conn
            .query_row(
                &format!(
                    "UPDATE engineers SET weight = weight + ?1
                     WHERE id = ?2 AND weight + ?1 >= 0
                     RETURNING {ENGINEER_COLUMNS}"
                ),
                params![delta, engineer_id],
                row_to_engineer,
            )
            .optional()?;
        if let Some(engineer) = updated {
            return Ok(engineer);
        }

        let current: Option<u32> = conn
            .query_row(
                "SELECT weight FROM engineers WHERE id = ?1",
                params![engineer_id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            Some(weight) => Err(CoreError::WeightUnderflow {
                engineer_id: engineer_id.to_string(),
                weight,
                delta,
            }),
            None => Err(CoreError::engineer_not_found(engineer_id)),
        }
    }

    fn get_engineer(&self, engineer_id: &str) -> Result<Option<Engineer>> {
        let conn = self.conn()?;
        let engineer = conn
            .query_row(
                &format!("SELECT {ENGINEER_COLUMNS} FROM engineers WHERE id = ?1"),
                params![engineer_id],
                row_to_engineer,
            )
            .optional()?;
        Ok(engineer)
    }
}

impl ReleaseStore for RosterDb {
    fn get_release(&self, release_id: &str) -> Result<Option<Release>> {
        let conn = self.conn()?;
        Ok(load_release(&conn, release_id)?)
    }

    fn list_releases_after(&self, date: DateTime<Utc>) -> Result<Vec<Release>> {
        let conn = self.conn()?;
        Ok(query_releases(
            &conn,
            "SELECT id, name, date, created_at FROM releases
             WHERE date > ?1
             ORDER BY date, rowid",
            params![format_ts(&date)],
        )?)
    }

    fn save_assignment(&self, release_id: &str, primary: &[String], backup: &[String]) -> Result<Release> {
        let conn = self.conn()?;
        in_transaction(&conn, |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM releases WHERE id = ?1)",
                params![release_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(CoreError::release_not_found(release_id));
            }
            conn.execute(
                "DELETE FROM release_assignments WHERE release_id = ?1",
                params![release_id],
            )?;
            insert_members(conn, release_id, primary, Role::Primary, 0)?;
            insert_members(conn, release_id, backup, Role::Backup, primary.len())?;
            Ok(())
        })?;
        load_release(&conn, release_id)?.ok_or_else(|| CoreError::release_not_found(release_id))
    }
}

impl ReminderStore for RosterDb {
    fn record_reminder(&self, reminder: &Reminder) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO reminders (id, engineer_id, release_id, slack_reminder_id, remind_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                reminder.id,
                reminder.engineer_id,
                reminder.release_id,
                reminder.slack_reminder_id,
                format_ts(&reminder.remind_at),
            ],
        )?;
        Ok(())
    }

    fn reminders_for(&self, engineer_id: &str, release_id: &str) -> Result<Vec<Reminder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, engineer_id, release_id, slack_reminder_id, remind_at FROM reminders
             WHERE engineer_id = ?1 AND release_id = ?2
             ORDER BY rowid",
        )?;
        let reminders = stmt
            .query_map(params![engineer_id, release_id], |row| {
                let remind_at_str: String = row.get(4)?;
                Ok(Reminder {
                    id: row.get(0)?,
                    engineer_id: row.get(1)?,
                    release_id: row.get(2)?,
                    slack_reminder_id: row.get(3)?,
                    remind_at: parse_datetime_fallback(&remind_at_str),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reminders)
    }

    fn delete_reminder(&self, id: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
        Ok(())
    }
}
