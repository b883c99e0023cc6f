//! Validation errors for discipline and note input.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum display-name length, in characters.
pub const NAME_MAX_CHARS: usize = 40;
/// Maximum teacher-name length, in characters.
pub const TEACHER_MAX_CHARS: usize = 40;
/// Maximum note token length, in characters.
pub const NOTE_ID_MAX_CHARS: usize = 64;

/// Input rejected before reaching storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Display name is empty or whitespace only.
    BlankName,
    /// Display name exceeds [`NAME_MAX_CHARS`].
    NameTooLong { chars: usize },
    /// Teacher name exceeds [`TEACHER_MAX_CHARS`].
    TeacherTooLong { chars: usize },
    /// Note id does not satisfy the active [`crate::NoteIdRule`].
    InvalidNoteId(String),
    /// The same note id appears twice in one payload.
    DuplicateNoteId(String),
    /// Note value is empty.
    EmptyNote,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "discipline name must not be blank"),
            Self::NameTooLong { chars } => write!(
                f,
                "discipline name has {chars} characters; maximum is {NAME_MAX_CHARS}"
            ),
            Self::TeacherTooLong { chars } => write!(
                f,
                "teacher name has {chars} characters; maximum is {TEACHER_MAX_CHARS}"
            ),
            Self::InvalidNoteId(value) => write!(f, "invalid note id: `{value}`"),
            Self::DuplicateNoteId(value) => write!(f, "duplicate note id: `{value}`"),
            Self::EmptyNote => write!(f, "note must not be empty"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::BlankName);
    }
    let chars = name.chars().count();
    if chars > NAME_MAX_CHARS {
        return Err(ValidationError::NameTooLong { chars });
    }
    Ok(())
}

pub(crate) fn validate_teacher(teacher: &str) -> Result<(), ValidationError> {
    let chars = teacher.chars().count();
    if chars > TEACHER_MAX_CHARS {
        return Err(ValidationError::TeacherTooLong { chars });
    }
    Ok(())
}

pub(crate) fn validate_note_value(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyNote);
    }
    Ok(())
}
