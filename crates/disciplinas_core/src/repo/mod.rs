//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage contract the catalog service is written against.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Both implementations pass the same behavioral tests.
//! - Repository APIs return semantic errors (`DisciplineNotFound`,
//!   `NoteNotFound`, `KeyConflict`) in addition to transport errors.

pub mod discipline_repo;
pub mod memory_repo;
