//! Error types for SpecGraph operations.
//!
//! This module defines the canonical error type used throughout SpecGraph.
//! All subsystems return `Result<T, SpecGraphError>` for error handling.
//!
//! Per-file findings (schema violations, dangling references, intent-spec
//! orphans) are NOT errors: they accumulate in report structures and never
//! abort a run. The variants below are reserved for process-level failures
//! and API misuse.

use rusqlite;
use std::io;
use thiserror::Error;

/// Canonical error type for all SpecGraph operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// Several variants auto-convert from standard library errors via `#[from]`.
#[derive(Error, Debug)]
pub enum SpecGraphError {
    /// SQLite database error (auto-converts from `rusqlite::Error`)
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),

    /// I/O error (auto-converts from `std::io::Error`)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// The meta-schema node is absent or malformed. Fatal: without the
    /// grammar every downstream validation would be silently relaxed.
    #[error("Meta-schema unavailable: {0}")]
    MetaSchemaUnavailable(String),

    /// A single node file could not be parsed. Per-file, non-fatal at the
    /// run level; the offending node is excluded from this run's writes.
    #[error("Parse failure in {path}: {detail}")]
    ParseFailure { path: String, detail: String },

    /// A dependency cycle blocks a planning projection (`depends_on` must
    /// stay acyclic within a kind).
    #[error("Cycle detected among {kind} nodes: {}", .cycle.join(" -> "))]
    CycleDetected { kind: String, cycle: Vec<String> },

    /// A focus id the caller passed does not exist in the graph.
    #[error("Unknown node '{id}' for phase '{phase}'")]
    UnknownNode { id: String, phase: String },

    /// A phase was invoked without a parameter it requires.
    #[error("Phase '{phase}' requires argument '{arg}'")]
    PhaseArgumentMissing { phase: String, arg: String },

    /// Database initialization failure
    #[error("Failed to initialize database: {0}")]
    DatabaseInitializationError(String),

    /// Path resolution or validation error
    #[error("Path error: {0}")]
    PathError(String),

    /// Input or argument validation failure
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Resource not found (missing file, node, anchor, etc.)
    #[error("Not found: {0}")]
    NotFound(String),
}
