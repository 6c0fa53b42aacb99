//! SQLite-backed subject storage.
//!
//! Provides persistent storage for:
//! - Subjects and their check-in history
//! - Emergency contacts (one per subject)
//! - Notification markers used by the scheduler

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{data_dir, SubjectStore};
use crate::error::StorageError;
use crate::model::{CheckInHistory, Contact, NotificationState, SubjectId};

/// SQLite database for subject records.
///
/// The connection sits behind a mutex so one `Database` can be shared by
/// the scheduler's workers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/vigil/vigil.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, StorageError> {
        let dir = data_dir().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Self::open_path(dir.join("vigil.db"))
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection mutex poisoned".into()))
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS subjects (
                id TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS check_ins (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_id TEXT NOT NULL REFERENCES subjects(id),
                checked_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS contacts (
                subject_id TEXT PRIMARY KEY REFERENCES subjects(id),
                name       TEXT NOT NULL,
                email      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notification_state (
                subject_id       TEXT PRIMARY KEY REFERENCES subjects(id),
                last_notified_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_check_ins_subject ON check_ins(subject_id, checked_at);",
        )?;
        Ok(())
    }

    fn ensure_subject(conn: &Connection, subject: &SubjectId) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT OR IGNORE INTO subjects (id) VALUES (?1)",
            params![subject.as_str()],
        )?;
        Ok(())
    }
}

/// Fixed-width UTC encoding so text order matches chronological order.
fn encode_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_instant(subject: &SubjectId, raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            subject: subject.to_string(),
            message: format!("bad timestamp '{raw}': {e}"),
        })
}

impl SubjectStore for Database {
    fn list_subjects(&self) -> Result<Vec<SubjectId>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM subjects ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut subjects = Vec::new();
        for row in rows {
            subjects.push(SubjectId::new(row?));
        }
        Ok(subjects)
    }

    fn load_history(&self, subject: &SubjectId) -> Result<CheckInHistory, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT checked_at FROM check_ins WHERE subject_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![subject.as_str()], |row| row.get::<_, String>(0))?;

        let mut history = CheckInHistory::new();
        for row in rows {
            history.push(decode_instant(subject, &row?)?);
        }
        Ok(history)
    }

    fn append_check_in(&self, subject: &SubjectId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::ensure_subject(&tx, subject)?;
        tx.execute(
            "INSERT INTO check_ins (subject_id, checked_at) VALUES (?1, ?2)",
            params![subject.as_str(), encode_instant(at)],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_contact(&self, subject: &SubjectId) -> Result<Contact, StorageError> {
        let conn = self.conn()?;
        let contact = conn
            .query_row(
                "SELECT name, email FROM contacts WHERE subject_id = ?1",
                params![subject.as_str()],
                |row| {
                    Ok(Contact {
                        name: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(contact.unwrap_or_default())
    }

    fn save_contact(&self, subject: &SubjectId, contact: &Contact) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::ensure_subject(&tx, subject)?;
        tx.execute(
            "INSERT INTO contacts (subject_id, name, email) VALUES (?1, ?2, ?3)
             ON CONFLICT(subject_id) DO UPDATE SET name = excluded.name, email = excluded.email",
            params![subject.as_str(), contact.name, contact.email],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_notification_state(
        &self,
        subject: &SubjectId,
    ) -> Result<NotificationState, StorageError> {
        let conn = self.conn()?;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT last_notified_at FROM notification_state WHERE subject_id = ?1",
                params![subject.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let last_notified_at = match raw.flatten() {
            Some(raw) => Some(decode_instant(subject, &raw)?),
            None => None,
        };
        Ok(NotificationState { last_notified_at })
    }

    fn save_notification_state(
        &self,
        subject: &SubjectId,
        notified_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::ensure_subject(&tx, subject)?;
        tx.execute(
            "INSERT INTO notification_state (subject_id, last_notified_at) VALUES (?1, ?2)
             ON CONFLICT(subject_id) DO UPDATE SET
                last_notified_at = MAX(COALESCE(last_notified_at, ''), excluded.last_notified_at)",
            params![subject.as_str(), encode_instant(notified_at)],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn append_and_load_history() {
        let db = Database::open_memory().unwrap();
        let alice = SubjectId::from("alice");

        db.append_check_in(&alice, t0()).unwrap();
        db.append_check_in(&alice, t0() + Duration::days(1)).unwrap();

        let history = db.load_history(&alice).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.last_check_in(), Some(t0() + Duration::days(1)));
    }

    #[test]
    fn unknown_subject_has_empty_records() {
        let db = Database::open_memory().unwrap();
        let ghost = SubjectId::from("ghost");

        assert!(db.load_history(&ghost).unwrap().is_empty());
        assert!(!db.load_contact(&ghost).unwrap().is_set());
        assert_eq!(db.load_notification_state(&ghost).unwrap().last_notified_at, None);
        assert!(db.list_subjects().unwrap().is_empty());
    }

    #[test]
    fn contact_is_replaced_wholesale() {
        let db = Database::open_memory().unwrap();
        let bob = SubjectId::from("bob");

        db.save_contact(&bob, &Contact::new("Ann", "ann@example.com").unwrap())
            .unwrap();
        db.save_contact(&bob, &Contact::new("Cid", "cid@example.org").unwrap())
            .unwrap();

        let contact = db.load_contact(&bob).unwrap();
        assert_eq!(contact.name, "Cid");
        assert_eq!(contact.email, "cid@example.org");
    }

    #[test]
    fn subjects_are_listed_once_in_order() {
        let db = Database::open_memory().unwrap();
        db.append_check_in(&SubjectId::from("b"), t0()).unwrap();
        db.append_check_in(&SubjectId::from("b"), t0()).unwrap();
        db.save_contact(&SubjectId::from("a"), &Contact::new("X", "x@y.io").unwrap())
            .unwrap();

        let ids: Vec<String> = db
            .list_subjects()
            .unwrap()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn notification_marker_never_moves_backward() {
        let db = Database::open_memory().unwrap();
        let carol = SubjectId::from("carol");

        db.save_notification_state(&carol, t0()).unwrap();
        db.save_notification_state(&carol, t0() - Duration::hours(5))
            .unwrap();
        assert_eq!(
            db.load_notification_state(&carol).unwrap().last_notified_at,
            Some(t0())
        );

        db.save_notification_state(&carol, t0() + Duration::hours(5))
            .unwrap();
        assert_eq!(
            db.load_notification_state(&carol).unwrap().last_notified_at,
            Some(t0() + Duration::hours(5))
        );
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.db");
        let dave = SubjectId::from("dave");

        {
            let db = Database::open_path(&path).unwrap();
            db.append_check_in(&dave, t0()).unwrap();
        }

        let db = Database::open_path(&path).unwrap();
        assert_eq!(db.load_history(&dave).unwrap().last_check_in(), Some(t0()));
    }
}
