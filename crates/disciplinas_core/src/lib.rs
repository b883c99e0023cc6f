//! Core domain logic for the disciplines catalog.
//! This crate is the single source of truth for catalog invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod seed;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::discipline::{
    casefold, Discipline, DisciplineKey, DisciplinePatch, DisciplineRecord,
};
pub use model::note::{Note, NoteId, NoteIdRule};
pub use model::validation::ValidationError;
pub use repo::discipline_repo::{
    DisciplineRepository, RepoError, RepoResult, SqliteDisciplineRepository,
};
pub use repo::memory_repo::MemoryDisciplineRepository;
pub use seed::demo_catalog;
pub use service::catalog_service::{CatalogError, CatalogResult, CatalogService, ErrorKind};
pub use service::merge::{merge_partial_update, UpdatePlan};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
