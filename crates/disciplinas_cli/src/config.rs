//! Command-line and environment configuration.

use clap::{Parser, ValueEnum};
use disciplinas_core::{default_log_level, NoteIdRule};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Storage backend behind the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// SQLite file at `--db`.
    Sqlite,
    /// Process-local store, lost on exit.
    Memory,
}

#[derive(Debug, Parser)]
#[command(name = "disciplinas", version)]
#[command(about = "HTTP service for the disciplines catalog")]
pub struct Args {
    /// SQLite database file (sqlite store only).
    #[arg(long, env = "DISCIPLINAS_DB", default_value = "./disciplinas.sqlite3")]
    pub db: PathBuf,

    #[arg(long, env = "DISCIPLINAS_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    #[arg(long, env = "DISCIPLINAS_STORE", value_enum, default_value = "sqlite")]
    pub store: StoreKind,

    /// trace|debug|info|warn|error; defaults by build mode.
    #[arg(long, env = "DISCIPLINAS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files; stderr when unset.
    #[arg(long, env = "DISCIPLINAS_LOG_DIR")]
    pub log_dir: Option<String>,

    /// Accepted note id shape: `token`, `uuid` or `sequential`.
    #[arg(long, env = "DISCIPLINAS_NOTE_IDS", default_value = "token", value_parser = parse_note_id_rule)]
    pub note_ids: NoteIdRule,

    /// Load the demo catalog when the store is empty.
    #[arg(long)]
    pub seed: bool,
}

/// Resolved server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub bind: SocketAddr,
    pub store: StoreKind,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub note_id_rule: NoteIdRule,
    pub seed: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            db_path: args.db,
            bind: args.bind,
            store: args.store,
            log_level: args
                .log_level
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: args.log_dir.filter(|dir| !dir.trim().is_empty()),
            note_id_rule: args.note_ids,
            seed: args.seed,
        }
    }
}

fn parse_note_id_rule(value: &str) -> Result<NoteIdRule, String> {
    NoteIdRule::from_name(value)
        .ok_or_else(|| format!("unknown note id rule `{value}`; expected token|uuid|sequential"))
}
