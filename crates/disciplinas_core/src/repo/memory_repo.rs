//! In-memory discipline repository.
//!
//! # Responsibility
//! - Provide a guarded, ordered map implementation of `DisciplineRepository`
//!   for tests and throwaway servers.
//!
//! # Invariants
//! - All reads and writes happen under one mutex, so every method is atomic.
//! - Entries keep insertion order; a relocated entry moves to the end.

use crate::model::discipline::{Discipline, DisciplineKey, DisciplineRecord};
use crate::model::note::{Note, NoteId};
use crate::repo::discipline_repo::{DisciplineRepository, RepoError, RepoResult};
use std::sync::{Mutex, MutexGuard};

struct Entry {
    key: DisciplineKey,
    record: DisciplineRecord,
    notes: Vec<Note>,
}

impl Entry {
    fn to_discipline(&self) -> Discipline {
        Discipline::from_parts(self.record.clone(), self.notes.clone())
    }

    fn note_position(&self, note_id: &NoteId) -> Option<usize> {
        self.notes.iter().position(|note| note.id == *note_id)
    }
}

/// Mutex-guarded, insertion-ordered discipline store.
#[derive(Default)]
pub struct MemoryDisciplineRepository {
    entries: Mutex<Vec<Entry>>,
}

impl MemoryDisciplineRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Vec<Entry>>> {
        self.entries.lock().map_err(|_| RepoError::LockPoisoned)
    }
}

fn position(entries: &[Entry], key: &DisciplineKey) -> Option<usize> {
    entries.iter().position(|entry| entry.key == *key)
}

fn entry_mut<'a>(entries: &'a mut [Entry], key: &DisciplineKey) -> RepoResult<&'a mut Entry> {
    entries
        .iter_mut()
        .find(|entry| entry.key == *key)
        .ok_or_else(|| RepoError::DisciplineNotFound(key.clone()))
}

impl DisciplineRepository for MemoryDisciplineRepository {
    fn get(&self, key: &DisciplineKey) -> RepoResult<Option<Discipline>> {
        let entries = self.lock()?;
        Ok(position(&entries, key).map(|index| entries[index].to_discipline()))
    }

    fn list(&self) -> RepoResult<Vec<Discipline>> {
        let entries = self.lock()?;
        Ok(entries.iter().map(Entry::to_discipline).collect())
    }

    fn insert(&self, discipline: &Discipline) -> RepoResult<()> {
        let record = discipline.record();
        record.validate()?;
        let key = record.key();

        let mut entries = self.lock()?;
        if position(&entries, &key).is_some() {
            return Err(RepoError::KeyConflict(key));
        }
        entries.push(Entry {
            key,
            record,
            notes: discipline.notes.clone(),
        });
        Ok(())
    }

    fn put(&self, key: &DisciplineKey, record: &DisciplineRecord) -> RepoResult<()> {
        record.validate()?;
        if record.key() != *key {
            return Err(RepoError::InvalidData(format!(
                "put cannot change key `{key}` to `{}`; use relocate",
                record.key()
            )));
        }

        let mut entries = self.lock()?;
        entry_mut(&mut entries, key)?.record = record.clone();
        Ok(())
    }

    fn relocate(&self, from: &DisciplineKey, record: &DisciplineRecord) -> RepoResult<()> {
        let to = record.key();
        if to == *from {
            return self.put(from, record);
        }
        record.validate()?;

        let mut entries = self.lock()?;
        let Some(index) = position(&entries, from) else {
            return Err(RepoError::DisciplineNotFound(from.clone()));
        };
        if position(&entries, &to).is_some() {
            return Err(RepoError::KeyConflict(to));
        }
        let moved = entries.remove(index);
        entries.push(Entry {
            key: to,
            record: record.clone(),
            notes: moved.notes,
        });
        Ok(())
    }

    fn delete(&self, key: &DisciplineKey) -> RepoResult<()> {
        let mut entries = self.lock()?;
        let Some(index) = position(&entries, key) else {
            return Err(RepoError::DisciplineNotFound(key.clone()));
        };
        entries.remove(index);
        Ok(())
    }

    fn list_notes(&self, key: &DisciplineKey) -> RepoResult<Vec<Note>> {
        let entries = self.lock()?;
        Ok(position(&entries, key)
            .map(|index| entries[index].notes.clone())
            .unwrap_or_default())
    }

    fn note_exists(&self, key: &DisciplineKey, note_id: &NoteId) -> RepoResult<bool> {
        let entries = self.lock()?;
        Ok(position(&entries, key)
            .and_then(|index| entries[index].note_position(note_id))
            .is_some())
    }

    fn has_any_notes(&self, key: &DisciplineKey) -> RepoResult<bool> {
        let entries = self.lock()?;
        Ok(position(&entries, key).is_some_and(|index| !entries[index].notes.is_empty()))
    }

    fn put_note(&self, key: &DisciplineKey, note: &Note) -> RepoResult<()> {
        let mut entries = self.lock()?;
        let entry = entry_mut(&mut entries, key)?;
        match entry.note_position(&note.id) {
            Some(index) => entry.notes[index].value = note.value.clone(),
            None => entry.notes.push(note.clone()),
        }
        Ok(())
    }

    fn replace_note(&self, key: &DisciplineKey, note_id: &NoteId, value: &str) -> RepoResult<()> {
        let mut entries = self.lock()?;
        let entry = entry_mut(&mut entries, key)?;
        let Some(index) = entry.note_position(note_id) else {
            return Err(RepoError::NoteNotFound {
                key: key.clone(),
                note_id: note_id.clone(),
            });
        };
        entry.notes[index].value = value.to_string();
        Ok(())
    }

    fn delete_note(&self, key: &DisciplineKey, note_id: &NoteId) -> RepoResult<()> {
        let mut entries = self.lock()?;
        let entry = entry_mut(&mut entries, key)?;
        let Some(index) = entry.note_position(note_id) else {
            return Err(RepoError::NoteNotFound {
                key: key.clone(),
                note_id: note_id.clone(),
            });
        };
        entry.notes.remove(index);
        Ok(())
    }
}
