//! Canonical domain model for disciplines and their notes.
//!
//! # Responsibility
//! - Define the single Discipline/Note shape shared by storage and transport.
//! - Own input validation rules, including the versioned note id rules.
//!
//! # Invariants
//! - A discipline's storage key is always the case-folded display name.
//! - Note ids are unique within their owning discipline.

pub mod discipline;
pub mod note;
pub mod validation;
