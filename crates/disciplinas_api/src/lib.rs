//! HTTP boundary for the disciplines catalog.

pub mod api;

pub use api::{app, ApiFailure, AppState};
