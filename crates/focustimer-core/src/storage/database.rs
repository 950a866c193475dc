//! SQLite-based session history.
//!
//! Provides persistent storage for:
//! - Completed focus sessions
//! - Session statistics and streaks
//! - Custom motivational messages
//! - Key-value store for application state (the persisted timer engine)

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result, ValidationError};
use crate::history::{current_streak, NewSession, Session, SessionStats};
use crate::notifications::{ensure_custom_id, validate_text, MessageCatalog, MessageType, MotivationalMessage};
use crate::timer::TimerMode;

const DATE_FORMAT: &str = "%Y-%m-%d";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SESSION_COLUMNS: &str =
    "id, started_at, duration_min, focus_interval_min, date, completed, session_type";

/// Columns of a `sessions` row before decoding.
struct SessionRow {
    id: i64,
    started_at: String,
    duration_min: u64,
    focus_interval_min: u64,
    date: String,
    completed: bool,
    session_type: String,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            started_at: row.get(1)?,
            duration_min: row.get(2)?,
            focus_interval_min: row.get(3)?,
            date: row.get(4)?,
            completed: row.get(5)?,
            session_type: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Session, DatabaseError> {
        let corrupt = |message: String| DatabaseError::CorruptRow {
            table: "sessions",
            message,
        };
        let started_at = DateTime::parse_from_rfc3339(&self.started_at)
            .map_err(|e| corrupt(format!("id {}: started_at: {e}", self.id)))?
            .with_timezone(&Utc);
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .map_err(|e| corrupt(format!("id {}: date: {e}", self.id)))?;
        let session_type = TimerMode::parse(&self.session_type)
            .ok_or_else(|| corrupt(format!("id {}: session_type '{}'", self.id, self.session_type)))?;
        Ok(Session {
            id: self.id,
            started_at,
            duration_min: self.duration_min,
            focus_interval_min: self.focus_interval_min,
            date,
            completed: self.completed,
            session_type,
        })
    }
}

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/focustimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("focustimer.db");
        Self::open_at(&path)
    }

    /// Open the database at a specific path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests and throwaway runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        // A foreground `timer run` writes every second next to other invocations.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Insert a session and return its id.
    pub fn add_session(&self, session: &NewSession) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sessions (started_at, duration_min, focus_interval_min, date, completed, session_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.started_at.to_rfc3339(),
                session.duration_min,
                session.focus_interval_min,
                session.date.format(DATE_FORMAT).to_string(),
                session.completed,
                session.session_type.as_str(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(id, duration_min = session.duration_min, "session recorded");
        Ok(id)
    }

    /// All sessions, newest first.
    pub fn all_sessions(&self) -> Result<Vec<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY started_at DESC, id DESC");
        self.query_sessions(&sql, [])
    }

    /// Sessions counted towards `date`, newest first.
    pub fn sessions_by_date(&self, date: NaiveDate) -> Result<Vec<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE date = ?1 ORDER BY started_at DESC, id DESC"
        );
        self.query_sessions(&sql, [date.format(DATE_FORMAT).to_string()])
    }

    pub fn session_by_id(&self, id: i64) -> Result<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, [id], SessionRow::from_row)
            .optional()?;
        Ok(row.map(SessionRow::decode).transpose()?)
    }

    /// Delete one session. Returns `false` when no row had that id.
    pub fn delete_session(&self, id: i64) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
        tracing::debug!(id, removed, "delete session");
        Ok(removed == 1)
    }

    /// Delete every session. Returns the number of rows removed.
    pub fn delete_all_sessions(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM sessions", [])?;
        tracing::info!(removed, "history cleared");
        Ok(removed)
    }

    pub fn session_count(&self) -> Result<u64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    pub fn total_focus_minutes(&self) -> Result<u64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(SUM(duration_min), 0) FROM sessions WHERE session_type = 'focus'",
            [],
            |row| row.get(0),
        )?)
    }

    /// Number of distinct days with at least one session.
    pub fn active_days(&self) -> Result<u64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(DISTINCT date) FROM sessions", [], |row| row.get(0))?)
    }

    /// Distinct session dates, newest first.
    pub fn session_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT date FROM sessions ORDER BY date DESC")?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.iter()
            .map(|s| {
                NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| {
                    DatabaseError::CorruptRow {
                        table: "sessions",
                        message: format!("date '{s}': {e}"),
                    }
                    .into()
                })
            })
            .collect()
    }

    /// Days of the given month that have at least one session.
    pub fn session_days_in_month(&self, year: i32, month: u32) -> Result<BTreeSet<u32>> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::OutOfRange {
                field: "month".into(),
                min: 1,
                max: 12,
                value: month.into(),
            }
            .into());
        }
        Ok(self
            .session_dates()?
            .into_iter()
            .filter(|d| d.year() == year && d.month() == month)
            .map(|d| d.day())
            .collect())
    }

    /// Aggregate statistics, with `today` deciding the streak and daily totals.
    pub fn stats(&self, today: NaiveDate) -> Result<SessionStats> {
        let (today_sessions, today_focus_min) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             WHERE date = ?1",
            [today.format(DATE_FORMAT).to_string()],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        let dates = self.session_dates()?;
        Ok(SessionStats {
            total_sessions: self.session_count()?,
            total_focus_min: self.total_focus_minutes()?,
            active_days: dates.len() as u64,
            streak_days: current_streak(&dates, today),
            today_sessions,
            today_focus_min,
        })
    }

    fn query_sessions<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, SessionRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|row| row.decode().map_err(Into::into))
            .collect()
    }

    // ── Custom messages ──────────────────────────────────────────────

    pub fn custom_messages(&self) -> Result<Vec<MotivationalMessage>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, text, message_type, enabled FROM custom_messages ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(id, text, kind, enabled)| {
                let message_type = MessageType::parse(&kind).ok_or_else(|| DatabaseError::CorruptRow {
                    table: "custom_messages",
                    message: format!("id {id}: message_type '{kind}'"),
                })?;
                Ok(MotivationalMessage {
                    id,
                    text,
                    message_type,
                    custom: true,
                    enabled,
                })
            })
            .collect()
    }

    /// Built-in plus stored custom messages.
    pub fn message_catalog(&self) -> Result<MessageCatalog> {
        Ok(MessageCatalog::new(self.custom_messages()?))
    }

    /// Store a new custom message. Ids are allocated above the built-in range.
    pub fn add_custom_message(&self, text: &str, message_type: MessageType) -> Result<MotivationalMessage> {
        let text = validate_text(text)?;
        self.conn.execute(
            "INSERT INTO custom_messages (id, text, message_type, enabled)
             VALUES ((SELECT COALESCE(MAX(id), ?1) + 1 FROM custom_messages), ?2, ?3, 1)",
            params![crate::notifications::BUILTIN_ID_LIMIT, text, message_type.as_str()],
        )?;
        Ok(MotivationalMessage {
            id: self.conn.last_insert_rowid(),
            text,
            message_type,
            custom: true,
            enabled: true,
        })
    }

    /// Replace text, type and enabled flag of a custom message.
    pub fn update_custom_message(&self, message: &MotivationalMessage) -> Result<()> {
        ensure_custom_id(message.id)?;
        let text = validate_text(&message.text)?;
        let changed = self.conn.execute(
            "UPDATE custom_messages SET text = ?2, message_type = ?3, enabled = ?4 WHERE id = ?1",
            params![message.id, text, message.message_type.as_str(), message.enabled],
        )?;
        if changed == 0 {
            return Err(ValidationError::NotFound {
                kind: "message",
                id: message.id,
            }
            .into());
        }
        Ok(())
    }

    pub fn delete_custom_message(&self, id: i64) -> Result<bool> {
        ensure_custom_id(id)?;
        let removed = self.conn.execute("DELETE FROM custom_messages WHERE id = ?1", [id])?;
        Ok(removed == 1)
    }

    // ── Key-value store ──────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, TimeZone};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn focus_on(db: &Database, date: NaiveDate, minutes: u64) -> i64 {
        let started = Utc
            .from_utc_datetime(&date.and_hms_opt(9, 0, 0).unwrap());
        db.add_session(&NewSession::focus(started, minutes, 25, date)).unwrap()
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let id = focus_on(&db, day(14), 25);
        let session = db.session_by_id(id).unwrap().unwrap();
        assert_eq!(session.duration_min, 25);
        assert_eq!(session.date, day(14));
        assert_eq!(session.session_type, TimerMode::Focus);
        assert!(session.completed);
        assert!(db.session_by_id(id + 1).unwrap().is_none());
    }

    #[test]
    fn delete_removes_exactly_one_row() {
        let db = Database::open_memory().unwrap();
        let ids: Vec<i64> = (0..4).map(|_| focus_on(&db, day(14), 25)).collect();
        assert!(db.delete_session(ids[1]).unwrap());
        assert_eq!(db.session_count().unwrap(), 3);
        let left: Vec<i64> = db.all_sessions().unwrap().iter().map(|s| s.id).collect();
        assert!(!left.contains(&ids[1]));
        assert!(left.contains(&ids[0]) && left.contains(&ids[2]) && left.contains(&ids[3]));

        assert!(!db.delete_session(ids[1]).unwrap());
        assert_eq!(db.session_count().unwrap(), 3);
    }

    #[test]
    fn sessions_by_date_filters_and_orders() {
        let db = Database::open_memory().unwrap();
        focus_on(&db, day(13), 25);
        let started = Utc.with_ymd_and_hms(2025, 3, 14, 8, 0, 0).unwrap();
        let early = db.add_session(&NewSession::focus(started, 25, 25, day(14))).unwrap();
        let late = focus_on(&db, day(14), 30);
        let sessions = db.sessions_by_date(day(14)).unwrap();
        assert_eq!(sessions.iter().map(|s| s.id).collect::<Vec<_>>(), vec![late, early]);
    }

    #[test]
    fn stats_cover_totals_days_and_streak() {
        let db = Database::open_memory().unwrap();
        focus_on(&db, day(12), 25);
        focus_on(&db, day(13), 25);
        focus_on(&db, day(14), 25);
        focus_on(&db, day(14), 50);
        let stats = db.stats(day(14)).unwrap();
        assert_eq!(stats.total_sessions, 4);
        assert_eq!(stats.total_focus_min, 125);
        assert_eq!(stats.active_days, 3);
        assert_eq!(stats.streak_days, 3);
        assert_eq!(stats.today_sessions, 2);
        assert_eq!(stats.today_focus_min, 75);

        let later = day(14).checked_add_days(Days::new(3)).unwrap();
        assert_eq!(db.stats(later).unwrap().streak_days, 0);
    }

    #[test]
    fn session_dates_are_distinct_and_newest_first() {
        let db = Database::open_memory().unwrap();
        focus_on(&db, day(2), 25);
        focus_on(&db, day(9), 25);
        focus_on(&db, day(9), 25);
        assert_eq!(db.session_dates().unwrap(), vec![day(9), day(2)]);
        assert_eq!(
            db.session_days_in_month(2025, 3).unwrap().into_iter().collect::<Vec<_>>(),
            vec![2, 9]
        );
        assert!(db.session_days_in_month(2025, 4).unwrap().is_empty());
        assert!(db.session_days_in_month(2025, 13).is_err());
    }

    #[test]
    fn delete_all_reports_count() {
        let db = Database::open_memory().unwrap();
        focus_on(&db, day(1), 25);
        focus_on(&db, day(2), 25);
        assert_eq!(db.delete_all_sessions().unwrap(), 2);
        assert_eq!(db.session_count().unwrap(), 0);
        assert_eq!(db.total_focus_minutes().unwrap(), 0);
    }

    #[test]
    fn custom_messages_start_after_builtin_ids() {
        let db = Database::open_memory().unwrap();
        let first = db.add_custom_message("Deep breath", MessageType::StartBreak).unwrap();
        let second = db.add_custom_message("Ship it", MessageType::General).unwrap();
        assert_eq!(first.id, 101);
        assert_eq!(second.id, 102);
        assert!(db.add_custom_message("  ", MessageType::General).is_err());

        let mut edited = first.clone();
        edited.text = "Slow breath".into();
        edited.enabled = false;
        db.update_custom_message(&edited).unwrap();
        let stored = db.custom_messages().unwrap();
        assert_eq!(stored[0].text, "Slow breath");
        assert!(!stored[0].enabled);

        assert!(db.delete_custom_message(102).unwrap());
        assert!(db.delete_custom_message(5).is_err());
        assert_eq!(db.message_catalog().unwrap().custom().len(), 1);
    }

    #[test]
    fn updating_missing_message_fails() {
        let db = Database::open_memory().unwrap();
        let ghost = MotivationalMessage {
            id: 150,
            text: "ghost".into(),
            message_type: MessageType::General,
            custom: true,
            enabled: true,
        };
        assert!(db.update_custom_message(&ghost).is_err());
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn open_at_persists_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let db = Database::open_at(&path).unwrap();
            focus_on(&db, day(5), 25);
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.session_count().unwrap(), 1);
    }
}
