//! Note domain model.
//!
//! # Responsibility
//! - Define the note identifier and its versioned validation rules.
//! - Serialize a discipline's notes as an ordered `id -> text` JSON object.
//!
//! # Invariants
//! - A `NoteId` built through [`NoteId::parse`] satisfies the given rule.
//! - Ids read back from storage or decoded from payloads are re-validated by
//!   the service before any write.

use crate::model::validation::{ValidationError, NOTE_ID_MAX_CHARS};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static NOTE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid note token regex"));

/// Accepted shape of client-supplied note ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteIdRule {
    /// Path-safe token: ASCII letters, digits, `_` and `-`, up to 64 chars.
    #[default]
    Token,
    /// UUID only; stored in canonical hyphenated lowercase form.
    Uuid,
    /// Positive integer, stored without leading zeros. Omitted ids are
    /// assigned as one past the largest id of the discipline.
    Sequential,
}

impl NoteIdRule {
    /// Parses a rule name as used by configuration (`token`, `uuid` or
    /// `sequential`).
    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "token" => Some(Self::Token),
            "uuid" => Some(Self::Uuid),
            "sequential" => Some(Self::Sequential),
            _ => None,
        }
    }
}

/// Note identifier, unique within one discipline.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Validates a client-supplied id against `rule`.
    pub fn parse(raw: &str, rule: NoteIdRule) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        match rule {
            NoteIdRule::Token => {
                if trimmed.chars().count() > NOTE_ID_MAX_CHARS || !NOTE_TOKEN_RE.is_match(trimmed)
                {
                    return Err(ValidationError::InvalidNoteId(raw.to_string()));
                }
                Ok(Self(trimmed.to_string()))
            }
            NoteIdRule::Uuid => Uuid::parse_str(trimmed)
                .map(|uuid| Self(uuid.hyphenated().to_string()))
                .map_err(|_| ValidationError::InvalidNoteId(raw.to_string())),
            NoteIdRule::Sequential => match sequence_number(trimmed) {
                Some(number) => Ok(Self::from_sequence(number)),
                None => Err(ValidationError::InvalidNoteId(raw.to_string())),
            },
        }
    }

    /// Generates a random id. Valid under the `Token` and `Uuid` rules.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Id for position `number` under [`NoteIdRule::Sequential`].
    pub fn from_sequence(number: u64) -> Self {
        Self(number.to_string())
    }

    /// Numeric value of the id, when it is a sequential id.
    pub fn sequence_number(&self) -> Option<u64> {
        sequence_number(&self.0)
    }

    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn sequence_number(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().filter(|number| *number > 0)
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One free-text annotation owned by a discipline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    #[serde(rename = "nota")]
    pub value: String,
}

impl Note {
    pub fn new(id: NoteId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

/// Serde adapter: `Vec<Note>` <-> ordered JSON object of `id -> text`.
pub(crate) mod notes_as_map {
    use super::{Note, NoteId};
    use serde::de::{MapAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt::Formatter;

    pub fn serialize<S: Serializer>(notes: &[Note], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            notes
                .iter()
                .map(|note| (note.id.as_str(), note.value.as_str())),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Note>, D::Error> {
        deserializer.deserialize_any(NotesVisitor)
    }

    struct NotesVisitor;

    impl<'de> Visitor<'de> for NotesVisitor {
        type Value = Vec<Note>;

        fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str("an object mapping note ids to note text")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut notes = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((id, value)) = map.next_entry::<String, String>()? {
                notes.push(Note {
                    id: NoteId(id),
                    value,
                });
            }
            Ok(notes)
        }
    }
}
