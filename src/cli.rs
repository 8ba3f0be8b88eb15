//! CLI struct definitions for the specgraph command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.
//! The CLI is a thin collaborator shell: argument handling, library calls,
//! and rendering — no core logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "specgraph",
    version = env!("CARGO_PKG_VERSION"),
    about = "Spec-first development core: a typed node store, intent-spec consistency monitor, SQLite graph synchroniser, and phase-aware context assembler for AI agents.",
    disable_version_flag = true
)]
pub(crate) struct Cli {
    /// Project root (defaults to the current working directory).
    #[clap(short, long, global = true)]
    pub dir: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Scaffold a starter spec root (grammar, product file, PRD skeleton)
    Init(InitCli),
    /// Project the node store and prose index into the graph database
    Sync(SyncCli),
    /// Run the intent-spec consistency check and render the dashboard
    Monitor(MonitorCli),
    /// Assemble a phase-appropriate context bundle for an AI agent
    Context(ContextCli),
    /// Check the prose document's anchor structure
    ValidatePrd(ValidatePrdCli),
    /// Keyword search over node names, intents, and descriptions
    Search(SearchCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct InitCli {
    /// Overwrite files that already exist.
    #[clap(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct SyncCli {
    /// Force a full rebuild (truncate and reproject everything).
    #[clap(long, conflicts_with = "changed")]
    pub full: bool,
    /// Changed file paths for an incremental run; omit for a full rebuild.
    #[clap(long = "changed", value_delimiter = ',')]
    pub changed: Vec<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct MonitorCli {
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ContextCli {
    /// Assembly phase: understanding|locating|evaluating|planning.
    #[clap(long)]
    pub phase: String,
    /// Focus node id (required for evaluating and planning).
    #[clap(long)]
    pub focus: Option<String>,
    /// Domain filter for the locating phase.
    #[clap(long)]
    pub domain: Option<String>,
    /// Output format: 'json' or 'ids'.
    #[clap(long, default_value = "json")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ValidatePrdCli {
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct SearchCli {
    /// Search query.
    pub query: String,
}
