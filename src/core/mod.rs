//! Core subsystems of the SpecGraph oracle.
//!
//! This is the engine behind the CLI: everything that reads the node
//! store and prose document, maintains the derived graph database, and
//! projects context for downstream AI agents lives here.
//!
//! # For AI Agents
//!
//! This is a **spec-first system**. Humans and agents author node files
//! and prose; the core observes and reports. It never edits source code,
//! never touches version control, and never calls a model.
//!
//! ## Module Overview
//!
//! - **`config`**: workspace path resolution (`specgraph.toml`)
//! - **`registry`**: the node grammar, loaded from `sub_meta_schema`
//! - **`store`**: node file discovery, parsing, validation, hashing
//! - **`prose`**: anchored-heading index over the PRD
//! - **`schemas`**: SQL DDL for the graph database
//! - **`db`**: connection bootstrap and schema-version handling
//! - **`graph`**: read-side query surface
//! - **`sync`**: full/incremental projection into the database
//! - **`monitor`**: the intent-spec consistency dashboard
//! - **`context`**: phase-parameterised context assembly
//! - **`scaffold`** / **`assets`**: `specgraph init` templates
//! - **`error`**: canonical error type for all operations
//!
//! ## Agent Contract
//!
//! 1. **Files are truth**: edit node files, then `specgraph sync`
//! 2. **Check the dashboard**: `specgraph monitor` before claiming done
//! 3. **Ask for context by phase**: `specgraph context --phase …`
//! 4. **Never touch `.runtime/`**: derived state, safe to delete

pub mod assets;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod graph;
pub mod monitor;
pub mod output;
pub mod prose;
pub mod registry;
pub mod scaffold;
pub mod schemas;
pub mod store;
pub mod sync;
pub mod time;
