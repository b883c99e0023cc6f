//! Discipline domain model.
//!
//! # Responsibility
//! - Define the stored row (`DisciplineRecord`), the full read model with
//!   notes (`Discipline`) and the partial update input (`DisciplinePatch`).
//! - Derive the case-folded storage key from a display name.
//!
//! # Invariants
//! - `DisciplineKey` is only built from a name through [`DisciplineKey::from_name`].
//! - Wire field names (`nome`, `professor`, `anotacoes`) match the external
//!   schema of the catalog API.

use crate::model::note::{notes_as_map, Note};
use crate::model::validation::{validate_name, validate_teacher, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Case-folded storage key of a discipline.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisciplineKey(String);

impl DisciplineKey {
    /// Derives the storage key for a display name (or an already-folded key).
    pub fn from_name(name: &str) -> Self {
        Self(casefold(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DisciplineKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unicode lowercase folding used for storage keys.
///
/// Lowercasing is idempotent, so folding a stored key yields the same key.
pub fn casefold(value: &str) -> String {
    value.to_lowercase()
}

/// Stored discipline attributes without notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisciplineRecord {
    /// Display name, original casing.
    pub name: String,
    /// Optional teacher name.
    pub teacher: Option<String>,
}

impl DisciplineRecord {
    pub fn new(name: impl Into<String>, teacher: Option<String>) -> Self {
        Self {
            name: name.into(),
            teacher,
        }
    }

    pub fn key(&self) -> DisciplineKey {
        DisciplineKey::from_name(&self.name)
    }

    /// Checks name and teacher limits.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if let Some(teacher) = self.teacher.as_deref() {
            validate_teacher(teacher)?;
        }
        Ok(())
    }
}

/// Full discipline state: stored attributes plus owned notes in insertion order.
///
/// Also the creation payload; initial notes are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discipline {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(
        rename = "professor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub teacher: Option<String>,
    #[serde(
        rename = "anotacoes",
        default,
        with = "notes_as_map",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub notes: Vec<Note>,
}

impl Discipline {
    pub fn new(name: impl Into<String>, teacher: Option<String>) -> Self {
        Self {
            name: name.into(),
            teacher,
            notes: Vec::new(),
        }
    }

    pub fn from_parts(record: DisciplineRecord, notes: Vec<Note>) -> Self {
        Self {
            name: record.name,
            teacher: record.teacher,
            notes,
        }
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    pub fn key(&self) -> DisciplineKey {
        DisciplineKey::from_name(&self.name)
    }

    pub fn record(&self) -> DisciplineRecord {
        DisciplineRecord {
            name: self.name.clone(),
            teacher: self.teacher.clone(),
        }
    }
}

/// Partial update input.
///
/// `None` and `Some("")` both mean "leave unchanged"; a teacher cannot be
/// cleared through a patch. Unknown fields (such as `anotacoes`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DisciplinePatch {
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
    #[serde(rename = "professor", default)]
    pub teacher: Option<String>,
}

impl DisciplinePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            teacher: None,
        }
    }

    pub fn teacher(mut self, teacher: impl Into<String>) -> Self {
        self.teacher = Some(teacher.into());
        self
    }
}
