//! Discipline repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the storage collaborator used by the catalog service.
//! - Keep SQL details inside the persistence boundary.
//! - Provide `relocate`, the single atomic unit behind renames.
//!
//! # Invariants
//! - Every write validates the record before touching SQL.
//! - Every multi-statement write runs in one `IMMEDIATE` transaction; a
//!   failure rolls back, so no record is visible under two keys and no note is
//!   left under a removed key.
//! - Notes are returned in insertion order (`seq ASC`).

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::discipline::{Discipline, DisciplineKey, DisciplineRecord};
use crate::model::note::{Note, NoteId};
use crate::model::validation::ValidationError;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage-level error for discipline and note persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Record failed validation before the write.
    Validation(ValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// No discipline is stored under the key.
    DisciplineNotFound(DisciplineKey),
    /// The discipline has no note with this id.
    NoteNotFound {
        key: DisciplineKey,
        note_id: NoteId,
    },
    /// Another discipline already uses the key.
    KeyConflict(DisciplineKey),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// A thread panicked while holding the storage lock.
    LockPoisoned,
    /// Caller passed arguments that contradict each other.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::DisciplineNotFound(key) => write!(f, "discipline not found: {key}"),
            Self::NoteNotFound { key, note_id } => {
                write!(f, "note not found: {note_id} in discipline {key}")
            }
            Self::KeyConflict(key) => write!(f, "discipline already exists: {key}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "discipline repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "discipline repository requires table `{table}`")
            }
            Self::LockPoisoned => write!(f, "storage lock poisoned"),
            Self::InvalidData(message) => write!(f, "invalid repository input: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage collaborator for disciplines and their notes.
///
/// Each method is atomic on its own. Check-then-act sequences spanning several
/// calls are serialized by the service, not here.
pub trait DisciplineRepository: Send + Sync {
    /// Loads one discipline with its notes.
    fn get(&self, key: &DisciplineKey) -> RepoResult<Option<Discipline>>;
    /// Lists all disciplines with notes, in insertion order.
    fn list(&self) -> RepoResult<Vec<Discipline>>;
    /// Stores a new discipline and its initial notes.
    fn insert(&self, discipline: &Discipline) -> RepoResult<()>;
    /// Overwrites name and teacher of an existing discipline; key must not change.
    fn put(&self, key: &DisciplineKey, record: &DisciplineRecord) -> RepoResult<()>;
    /// Moves a discipline and all of its notes from `from` to `record.key()`.
    fn relocate(&self, from: &DisciplineKey, record: &DisciplineRecord) -> RepoResult<()>;
    /// Deletes a discipline and cascades to its notes.
    fn delete(&self, key: &DisciplineKey) -> RepoResult<()>;
    /// Lists the notes of one discipline, in insertion order.
    fn list_notes(&self, key: &DisciplineKey) -> RepoResult<Vec<Note>>;
    fn note_exists(&self, key: &DisciplineKey, note_id: &NoteId) -> RepoResult<bool>;
    fn has_any_notes(&self, key: &DisciplineKey) -> RepoResult<bool>;
    /// Inserts a note, or replaces its text when the id already exists.
    fn put_note(&self, key: &DisciplineKey, note: &Note) -> RepoResult<()>;
    /// Replaces the text of an existing note.
    fn replace_note(&self, key: &DisciplineKey, note_id: &NoteId, value: &str) -> RepoResult<()>;
    fn delete_note(&self, key: &DisciplineKey, note_id: &NoteId) -> RepoResult<()>;
}

/// SQLite-backed discipline repository.
pub struct SqliteDisciplineRepository {
    conn: Mutex<Connection>,
}

impl SqliteDisciplineRepository {
    /// Takes ownership of a migrated connection.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> RepoResult<T>) -> RepoResult<T> {
        let mut conn = self.conn.lock().map_err(|_| RepoError::LockPoisoned)?;
        f(&mut *conn)
    }
}

impl DisciplineRepository for SqliteDisciplineRepository {
    fn get(&self, key: &DisciplineKey) -> RepoResult<Option<Discipline>> {
        self.with_conn(|conn| {
            let Some(record) = load_record(conn, key.as_str())? else {
                return Ok(None);
            };
            let notes = load_notes(conn, key.as_str())?;
            Ok(Some(Discipline::from_parts(record, notes)))
        })
    }

    fn list(&self) -> RepoResult<Vec<Discipline>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, name, teacher
                 FROM disciplines
                 ORDER BY rowid ASC;",
            )?;
            let mut rows = stmt.query([])?;
            let mut disciplines = Vec::new();
            while let Some(row) = rows.next()? {
                let key: String = row.get("key")?;
                let record = DisciplineRecord {
                    name: row.get("name")?,
                    teacher: row.get("teacher")?,
                };
                let notes = load_notes(conn, &key)?;
                disciplines.push(Discipline::from_parts(record, notes));
            }
            Ok(disciplines)
        })
    }

    fn insert(&self, discipline: &Discipline) -> RepoResult<()> {
        let record = discipline.record();
        record.validate()?;
        let key = record.key();

        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if discipline_exists(&tx, key.as_str())? {
                return Err(RepoError::KeyConflict(key.clone()));
            }
            tx.execute(
                "INSERT INTO disciplines (key, name, teacher) VALUES (?1, ?2, ?3);",
                params![key.as_str(), record.name, record.teacher],
            )?;
            for note in &discipline.notes {
                tx.execute(
                    "INSERT INTO notes (discipline_key, note_id, value) VALUES (?1, ?2, ?3);",
                    params![key.as_str(), note.id.as_str(), note.value],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn put(&self, key: &DisciplineKey, record: &DisciplineRecord) -> RepoResult<()> {
        record.validate()?;
        if record.key() != *key {
            return Err(RepoError::InvalidData(format!(
                "put cannot change key `{key}` to `{}`; use relocate",
                record.key()
            )));
        }

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE disciplines
                 SET name = ?2,
                     teacher = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE key = ?1;",
                params![key.as_str(), record.name, record.teacher],
            )?;
            if changed == 0 {
                return Err(RepoError::DisciplineNotFound(key.clone()));
            }
            Ok(())
        })
    }

    fn relocate(&self, from: &DisciplineKey, record: &DisciplineRecord) -> RepoResult<()> {
        let to = record.key();
        if to == *from {
            return self.put(from, record);
        }
        record.validate()?;

        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !discipline_exists(&tx, from.as_str())? {
                return Err(RepoError::DisciplineNotFound(from.clone()));
            }
            if discipline_exists(&tx, to.as_str())? {
                return Err(RepoError::KeyConflict(to.clone()));
            }

            // New row first so the notes' foreign key stays valid while they move.
            tx.execute(
                "INSERT INTO disciplines (key, name, teacher, created_at)
                 SELECT ?2, ?3, ?4, created_at
                 FROM disciplines
                 WHERE key = ?1;",
                params![from.as_str(), to.as_str(), record.name, record.teacher],
            )?;
            tx.execute(
                "UPDATE notes SET discipline_key = ?2 WHERE discipline_key = ?1;",
                params![from.as_str(), to.as_str()],
            )?;
            tx.execute(
                "DELETE FROM disciplines WHERE key = ?1;",
                [from.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn delete(&self, key: &DisciplineKey) -> RepoResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM disciplines WHERE key = ?1;", [key.as_str()])?;
            if changed == 0 {
                return Err(RepoError::DisciplineNotFound(key.clone()));
            }
            Ok(())
        })
    }

    fn list_notes(&self, key: &DisciplineKey) -> RepoResult<Vec<Note>> {
        self.with_conn(|conn| load_notes(conn, key.as_str()))
    }

    fn note_exists(&self, key: &DisciplineKey, note_id: &NoteId) -> RepoResult<bool> {
        self.with_conn(|conn| {
            let exists: i64 = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM notes WHERE discipline_key = ?1 AND note_id = ?2
                );",
                params![key.as_str(), note_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(exists == 1)
        })
    }

    fn has_any_notes(&self, key: &DisciplineKey) -> RepoResult<bool> {
        self.with_conn(|conn| {
            let exists: i64 = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM notes WHERE discipline_key = ?1);",
                [key.as_str()],
                |row| row.get(0),
            )?;
            Ok(exists == 1)
        })
    }

    fn put_note(&self, key: &DisciplineKey, note: &Note) -> RepoResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !discipline_exists(&tx, key.as_str())? {
                return Err(RepoError::DisciplineNotFound(key.clone()));
            }
            // Upsert keeps `seq`, so a replaced note keeps its position.
            tx.execute(
                "INSERT INTO notes (discipline_key, note_id, value)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (discipline_key, note_id) DO UPDATE SET value = excluded.value;",
                params![key.as_str(), note.id.as_str(), note.value],
            )?;
            touch_discipline(&tx, key.as_str())?;
            tx.commit()?;
            Ok(())
        })
    }

    fn replace_note(&self, key: &DisciplineKey, note_id: &NoteId, value: &str) -> RepoResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let changed = tx.execute(
                "UPDATE notes SET value = ?3 WHERE discipline_key = ?1 AND note_id = ?2;",
                params![key.as_str(), note_id.as_str(), value],
            )?;
            if changed == 0 {
                return Err(RepoError::NoteNotFound {
                    key: key.clone(),
                    note_id: note_id.clone(),
                });
            }
            touch_discipline(&tx, key.as_str())?;
            tx.commit()?;
            Ok(())
        })
    }

    fn delete_note(&self, key: &DisciplineKey, note_id: &NoteId) -> RepoResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let changed = tx.execute(
                "DELETE FROM notes WHERE discipline_key = ?1 AND note_id = ?2;",
                params![key.as_str(), note_id.as_str()],
            )?;
            if changed == 0 {
                return Err(RepoError::NoteNotFound {
                    key: key.clone(),
                    note_id: note_id.clone(),
                });
            }
            touch_discipline(&tx, key.as_str())?;
            tx.commit()?;
            Ok(())
        })
    }
}

fn load_record(conn: &Connection, key: &str) -> RepoResult<Option<DisciplineRecord>> {
    let record = conn
        .query_row(
            "SELECT name, teacher FROM disciplines WHERE key = ?1;",
            [key],
            |row| {
                Ok(DisciplineRecord {
                    name: row.get("name")?,
                    teacher: row.get("teacher")?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

fn load_notes(conn: &Connection, key: &str) -> RepoResult<Vec<Note>> {
    let mut stmt = conn.prepare(
        "SELECT note_id, value
         FROM notes
         WHERE discipline_key = ?1
         ORDER BY seq ASC;",
    )?;
    let mut rows = stmt.query([key])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(Note {
            id: NoteId::from_stored(row.get("note_id")?),
            value: row.get("value")?,
        });
    }
    Ok(notes)
}

fn discipline_exists(tx: &Transaction<'_>, key: &str) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM disciplines WHERE key = ?1);",
        [key],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn touch_discipline(tx: &Transaction<'_>, key: &str) -> RepoResult<()> {
    tx.execute(
        "UPDATE disciplines
         SET updated_at = (strftime('%s', 'now') * 1000)
         WHERE key = ?1;",
        [key],
    )?;
    Ok(())
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["disciplines", "notes"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
