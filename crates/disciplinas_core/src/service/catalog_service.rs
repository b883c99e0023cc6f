//! Discipline catalog use-case service.
//!
//! # Responsibility
//! - Run lookup guards before every mutation (fail fast, no partial writes).
//! - Apply partial updates and renames through the repository's atomic
//!   `put`/`relocate`.
//! - Provide note list/add/replace/delete scoped to one discipline.
//!
//! # Invariants
//! - Every name received from a caller is case-folded before lookup.
//! - Mutations hold the per-key lock of every key they touch; a rename holds
//!   both the old and the new key.
//! - Note guards run in order: discipline exists, discipline has notes, note
//!   exists. Each failure has its own error variant, and all of them run
//!   before the note id or text is validated. An id the active rule rejects
//!   can never be stored, so it reports `NoteNotFound`.

use crate::model::discipline::{Discipline, DisciplineKey, DisciplinePatch};
use crate::model::note::{Note, NoteId, NoteIdRule};
use crate::model::validation::{validate_note_value, ValidationError};
use crate::repo::discipline_repo::{DisciplineRepository, RepoError};
use crate::service::key_locks::KeyLocks;
use crate::service::merge::{merge_partial_update, target_key, UpdatePlan};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse classification used by transport layers to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

/// Service error for catalog use-cases.
#[derive(Debug)]
pub enum CatalogError {
    /// Input rejected before any storage access.
    Validation(ValidationError),
    /// No discipline under the key.
    DisciplineNotFound(DisciplineKey),
    /// Discipline exists but owns no notes.
    NoNotes(DisciplineKey),
    /// Discipline has notes, none with this id.
    NoteNotFound {
        key: DisciplineKey,
        note_id: NoteId,
    },
    /// Create or rename target is already used by another discipline.
    Conflict(DisciplineKey),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::DisciplineNotFound(_) | Self::NoNotes(_) | Self::NoteNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Repo(_) | Self::InconsistentState(_) => ErrorKind::Internal,
        }
    }
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DisciplineNotFound(key) => write!(f, "discipline not found: {key}"),
            Self::NoNotes(key) => write!(f, "discipline has no notes: {key}"),
            Self::NoteNotFound { key, note_id } => {
                write!(f, "note not found: {note_id} in discipline {key}")
            }
            Self::Conflict(key) => write!(f, "discipline already exists: {key}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent catalog state: {details}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CatalogError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for CatalogError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::DisciplineNotFound(key) => Self::DisciplineNotFound(key),
            RepoError::NoteNotFound { key, note_id } => Self::NoteNotFound { key, note_id },
            RepoError::KeyConflict(key) => Self::Conflict(key),
            other => Self::Repo(other),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog service facade over a repository implementation.
pub struct CatalogService<R: DisciplineRepository> {
    repo: R,
    locks: KeyLocks,
    note_id_rule: NoteIdRule,
}

impl<R: DisciplineRepository> CatalogService<R> {
    /// Creates a service accepting token note ids.
    pub fn new(repo: R) -> Self {
        Self::with_note_id_rule(repo, NoteIdRule::default())
    }

    pub fn with_note_id_rule(repo: R, note_id_rule: NoteIdRule) -> Self {
        Self {
            repo,
            locks: KeyLocks::new(),
            note_id_rule,
        }
    }

    pub fn note_id_rule(&self) -> NoteIdRule {
        self.note_id_rule
    }

    /// Resolves a discipline name (any casing) to its stored state.
    pub fn resolve(&self, name: &str) -> CatalogResult<Option<Discipline>> {
        Ok(self.repo.get(&DisciplineKey::from_name(name))?)
    }

    pub fn note_exists(&self, key: &DisciplineKey, note_id: &NoteId) -> CatalogResult<bool> {
        Ok(self.repo.note_exists(key, note_id)?)
    }

    pub fn has_any_notes(&self, key: &DisciplineKey) -> CatalogResult<bool> {
        Ok(self.repo.has_any_notes(key)?)
    }

    /// Lists every discipline with its notes, in insertion order.
    pub fn list_disciplines(&self) -> CatalogResult<Vec<Discipline>> {
        Ok(self.repo.list()?)
    }

    /// Lists display names, in insertion order.
    pub fn list_names(&self) -> CatalogResult<Vec<String>> {
        Ok(self
            .repo
            .list()?
            .into_iter()
            .map(|discipline| discipline.name)
            .collect())
    }

    pub fn get_discipline(&self, name: &str) -> CatalogResult<Discipline> {
        self.require_discipline(&DisciplineKey::from_name(name))
    }

    /// Creates a discipline with optional initial notes.
    pub fn create_discipline(&self, input: Discipline) -> CatalogResult<Discipline> {
        let discipline = self.normalize_new_discipline(input)?;
        let key = discipline.key();

        let _guard = self.locks.acquire(&[&key]);
        if self.repo.get(&key)?.is_some() {
            warn!("event=discipline_create module=service status=conflict key={key}");
            return Err(CatalogError::Conflict(key));
        }
        self.repo.insert(&discipline)?;
        info!(
            "event=discipline_create module=service status=ok key={key} notes={}",
            discipline.notes.len()
        );
        self.read_back(&key, "created discipline not found in read-back")
    }

    /// Merges a partial update; renames move the discipline and its notes.
    pub fn update_discipline(
        &self,
        name: &str,
        update: &DisciplinePatch,
    ) -> CatalogResult<Discipline> {
        let key = DisciplineKey::from_name(name);
        let target = target_key(&key, update);

        let _guard = self.locks.acquire(&[&key, &target]);
        let existing = self.require_discipline(&key)?;
        let plan = merge_partial_update(&existing.record(), update)?;

        match &plan {
            UpdatePlan::Unchanged { .. } => return Ok(existing),
            UpdatePlan::InPlace { key, record } => self.repo.put(key, record)?,
            UpdatePlan::Relocate { from, record } => {
                let to = record.key();
                if self.repo.get(&to)?.is_some() {
                    warn!(
                        "event=discipline_update module=service status=conflict key={from} target={to}"
                    );
                    return Err(CatalogError::Conflict(to));
                }
                self.repo.relocate(from, record)?;
            }
        }

        let target = plan.target_key();
        info!(
            "event=discipline_update module=service status=ok key={key} target={target} renamed={}",
            plan.is_rename()
        );
        self.read_back(&target, "updated discipline not found in read-back")
    }

    /// Deletes a discipline and all of its notes.
    pub fn delete_discipline(&self, name: &str) -> CatalogResult<()> {
        let key = DisciplineKey::from_name(name);
        let _guard = self.locks.acquire(&[&key]);
        self.require_discipline(&key)?;
        self.repo.delete(&key)?;
        info!("event=discipline_delete module=service status=ok key={key}");
        Ok(())
    }

    /// Lists the notes of a discipline that has at least one.
    ///
    /// Both guards read one snapshot, so a concurrent delete reports
    /// `DisciplineNotFound`, never `NoNotes`.
    pub fn list_notes(&self, name: &str) -> CatalogResult<Vec<Note>> {
        let key = DisciplineKey::from_name(name);
        let discipline = self.require_discipline(&key)?;
        if discipline.notes.is_empty() {
            return Err(CatalogError::NoNotes(key));
        }
        Ok(discipline.notes)
    }

    /// Adds a note, or replaces the text of an existing id.
    ///
    /// When `note_id` is `None` an id is assigned by the active rule.
    pub fn add_note(
        &self,
        name: &str,
        note_id: Option<&str>,
        value: &str,
    ) -> CatalogResult<Discipline> {
        validate_note_value(value)?;
        let requested = note_id.map(|raw| self.parse_note_id(raw)).transpose()?;
        let key = DisciplineKey::from_name(name);

        let _guard = self.locks.acquire(&[&key]);
        let discipline = self.require_discipline(&key)?;
        let note_id = match requested {
            Some(note_id) => note_id,
            None => self.assign_note_id(&discipline.notes),
        };
        self.repo.put_note(&key, &Note::new(note_id.clone(), value))?;
        info!("event=note_put module=service status=ok key={key} note_id={note_id}");
        self.read_back(&key, "discipline missing after note insert")
    }

    /// Replaces the text of one existing note.
    ///
    /// Returns the owning discipline's full state.
    pub fn replace_note(&self, name: &str, note_id: &str, value: &str) -> CatalogResult<Discipline> {
        let key = DisciplineKey::from_name(name);

        let _guard = self.locks.acquire(&[&key]);
        let note_id = self.require_note(&key, note_id)?;
        validate_note_value(value)?;
        self.repo.replace_note(&key, &note_id, value)?;
        info!("event=note_replace module=service status=ok key={key} note_id={note_id}");
        self.read_back(&key, "discipline missing after note replace")
    }

    /// Deletes one note and returns the owning discipline's state.
    pub fn delete_note(&self, name: &str, note_id: &str) -> CatalogResult<Discipline> {
        let key = DisciplineKey::from_name(name);

        let _guard = self.locks.acquire(&[&key]);
        let note_id = self.require_note(&key, note_id)?;
        self.repo.delete_note(&key, &note_id)?;
        info!("event=note_delete module=service status=ok key={key} note_id={note_id}");
        self.read_back(&key, "discipline missing after note delete")
    }

    /// Loads `disciplines` into an empty catalog. Returns how many were added.
    pub fn seed_if_empty(&self, disciplines: Vec<Discipline>) -> CatalogResult<usize> {
        if !self.repo.list()?.is_empty() {
            info!("event=catalog_seed module=service status=skipped reason=not_empty");
            return Ok(0);
        }
        let mut added = 0;
        for discipline in disciplines {
            self.create_discipline(self.fit_seed_note_ids(discipline))?;
            added += 1;
        }
        info!("event=catalog_seed module=service status=ok added={added}");
        Ok(added)
    }

    fn parse_note_id(&self, raw: &str) -> CatalogResult<NoteId> {
        Ok(NoteId::parse(raw, self.note_id_rule)?)
    }

    fn assign_note_id(&self, existing: &[Note]) -> NoteId {
        match self.note_id_rule {
            NoteIdRule::Sequential => {
                let last = existing
                    .iter()
                    .filter_map(|note| note.id.sequence_number())
                    .max()
                    .unwrap_or(0);
                NoteId::from_sequence(last.saturating_add(1))
            }
            NoteIdRule::Token | NoteIdRule::Uuid => NoteId::generate(),
        }
    }

    // Demo ids are UUIDs; under the sequential rule they are renumbered.
    fn fit_seed_note_ids(&self, mut discipline: Discipline) -> Discipline {
        if self.note_id_rule == NoteIdRule::Sequential {
            for (index, note) in discipline.notes.iter_mut().enumerate() {
                note.id = NoteId::from_sequence(index as u64 + 1);
            }
        }
        discipline
    }

    fn normalize_new_discipline(&self, input: Discipline) -> CatalogResult<Discipline> {
        input.record().validate()?;
        let mut seen = HashSet::new();
        let mut notes = Vec::with_capacity(input.notes.len());
        for note in input.notes {
            let id = self.parse_note_id(note.id.as_str())?;
            validate_note_value(&note.value)?;
            if !seen.insert(id.clone()) {
                return Err(ValidationError::DuplicateNoteId(id.to_string()).into());
            }
            notes.push(Note::new(id, note.value));
        }
        Ok(Discipline {
            name: input.name,
            teacher: input.teacher,
            notes,
        })
    }

    fn require_discipline(&self, key: &DisciplineKey) -> CatalogResult<Discipline> {
        self.repo
            .get(key)?
            .ok_or_else(|| CatalogError::DisciplineNotFound(key.clone()))
    }

    /// Runs the three note guards and returns the parsed id.
    fn require_note(&self, key: &DisciplineKey, raw_id: &str) -> CatalogResult<NoteId> {
        let discipline = self.require_discipline(key)?;
        if discipline.notes.is_empty() {
            return Err(CatalogError::NoNotes(key.clone()));
        }
        let parsed = NoteId::parse(raw_id, self.note_id_rule).ok();
        match parsed {
            Some(note_id) if discipline.notes.iter().any(|note| note.id == note_id) => {
                Ok(note_id)
            }
            Some(note_id) => Err(CatalogError::NoteNotFound {
                key: key.clone(),
                note_id,
            }),
            None => Err(CatalogError::NoteNotFound {
                key: key.clone(),
                note_id: NoteId::from_stored(raw_id.trim().to_string()),
            }),
        }
    }

    fn read_back(&self, key: &DisciplineKey, details: &'static str) -> CatalogResult<Discipline> {
        self.repo
            .get(key)?
            .ok_or(CatalogError::InconsistentState(details))
    }
}
