//! SpecGraph: a spec-first development core for AI agents.
//!
//! **SpecGraph ties product intent to typed specification nodes to code.**
//!
//! The repository around a product carries two descriptions of it: prose
//! requirements (what humans agreed to build) and typed node files (the
//! structural specification an agent works from). SpecGraph keeps the two
//! honest against each other and projects minimal slices of the result
//! for downstream AI agents.
//!
//! # Core Principles
//!
//! - **Files are truth**: the node store is the single source of truth;
//!   the SQLite graph database is derived state, safe to delete
//! - **Deterministic**: identical snapshots always produce identical
//!   databases, reports, and context bundles
//! - **Passive oracle**: reads prose and typed files, writes an index and
//!   reports; never edits code, never drives version control, never calls
//!   a model
//! - **Grammar-gated**: one meta-schema node defines every kind's shape;
//!   without it, nothing validates and every run refuses to proceed
//!
//! # For AI Agents
//!
//! **You MUST:**
//! 1. Edit node files, never the database: `.runtime/` is derived state
//! 2. Re-project after editing: `specgraph sync`
//! 3. Check the dashboard before claiming done: `specgraph monitor`
//! 4. Ask for context by phase: `specgraph context --phase planning --focus feat_x`
//!
//! # Crate Structure
//!
//! - [`core`]: the four subsystems (store+registry, prose index,
//!   synchroniser+graph database, monitor+context assembler)
//! - `cli`: clap types for the thin CLI shell; dispatch lives here in
//!   `lib.rs`

pub mod core;

mod cli;

use crate::cli::{Cli, Command};
use crate::core::config::Workspace;
use crate::core::context::{self, ContextRequest, Phase};
use crate::core::error::SpecGraphError;
use crate::core::graph::GraphDb;
use crate::core::monitor::{self, MonitorReport, SyncStatus};
use crate::core::output;
use crate::core::prose::{self, ProseIndex};
use crate::core::scaffold::{self, ScaffoldOptions};
use crate::core::store::Severity;
use crate::core::sync::{self, SyncReport};
use clap::Parser;
use colored::Colorize;

/// Parse arguments and dispatch. Returns the process exit code:
/// 0 on success, 1 when schema/consistency errors were reported.
/// Internal failures (meta-schema missing, database open failure) come
/// back as `Err` and map to exit code 2 in `main`.
pub fn run() -> Result<i32, SpecGraphError> {
    let cli = Cli::parse();
    let project_root = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(SpecGraphError::IoError)?,
    };
    let ws = Workspace::discover(&project_root)?;

    match cli.command {
        Command::Init(args) => run_init(&ws, args.force),
        Command::Sync(args) => run_sync(&ws, &args),
        Command::Monitor(args) => run_monitor_command(&ws, &args.format),
        Command::Context(args) => run_context(&ws, &args),
        Command::ValidatePrd(args) => run_validate_prd(&ws, &args.format),
        Command::Search(args) => run_search(&ws, &args.query),
    }
}

fn run_init(ws: &Workspace, force: bool) -> Result<i32, SpecGraphError> {
    let report = scaffold::scaffold_workspace(ws, &ScaffoldOptions { force })?;
    for path in &report.created {
        pass(&format!("created {}", path));
    }
    for path in &report.skipped {
        skip(&format!("kept {}", path));
    }
    println!(
        "\nSpec root ready at {}. Next: `specgraph sync`, then `specgraph monitor`.",
        ws.spec_root.display()
    );
    Ok(0)
}

fn run_sync(ws: &Workspace, args: &cli::SyncCli) -> Result<i32, SpecGraphError> {
    let report = if args.full || args.changed.is_empty() {
        sync::sync_full(ws)?
    } else {
        sync::sync_incremental(ws, &args.changed)?
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        render_sync_report(&report);
    }
    Ok(if report.has_errors() { 1 } else { 0 })
}

fn render_sync_report(report: &SyncReport) {
    println!(
        "Sync ({}): {} written, {} skipped, {} removed, {} edges, {} APIs",
        report.mode,
        report.nodes_written,
        report.nodes_skipped,
        report.nodes_removed,
        report.edges_written,
        report.apis_written
    );
    for failure in &report.failures {
        fail(&format!(
            "{}: {}",
            failure.path,
            output::one_line(&failure.detail, 100)
        ));
    }
    for edge in &report.dangling {
        warn(&format!(
            "dangling {}: {} -> {}",
            edge.relation, edge.source, edge.target
        ));
    }
}

fn run_monitor_command(ws: &Workspace, format: &str) -> Result<i32, SpecGraphError> {
    let report = monitor::run_monitor(ws)?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        render_dashboard(&report);
    }
    Ok(if report.has_errors() { 1 } else { 0 })
}

fn render_dashboard(report: &MonitorReport) {
    println!("Schema");
    for file in &report.files {
        let line = if file.messages.is_empty() {
            file.path.clone()
        } else {
            format!(
                "{} ({})",
                file.path,
                output::summarize(&file.messages, 3, 60)
            )
        };
        if file.errors > 0 {
            fail(&line);
        } else if file.warnings > 0 {
            warn(&line);
        } else {
            pass(&line);
        }
    }
    for failure in &report.failures {
        fail(&format!(
            "{}: {}",
            failure.path,
            output::one_line(&failure.detail, 80)
        ));
    }

    println!("\nIntent-Spec");
    for feature in &report.features {
        let line = format!("{} [{}] [{}]", feature.id, feature.sync, feature.assignment);
        match feature.sync {
            SyncStatus::Synced => pass(&line),
            _ => warn(&line),
        }
    }
    for component in &report.components {
        let line = format!("{} [{}]", component.id, component.sync);
        match component.sync {
            SyncStatus::Synced => pass(&line),
            _ => warn(&line),
        }
    }
    for design in &report.designs {
        let line = format!("{} [{}]", design.id, design.sync);
        match design.sync {
            SyncStatus::Synced => pass(&line),
            _ => warn(&line),
        }
    }

    println!("\nProgress");
    println!(
        "    Schema compliance    {:>4}  ({}/{})",
        output::percent(report.schema.score),
        report.schema.passed,
        report.schema.total
    );
    println!(
        "    Intent-spec sync     {:>4}  ({}/{})",
        output::percent(report.sync.score),
        report.sync.passed,
        report.sync.total
    );
    println!(
        "    Feature assignment   {:>4}  ({}/{})",
        output::percent(report.assignment.score),
        report.assignment.passed,
        report.assignment.total
    );
    println!("    Overall              {:>4}", output::percent(report.overall));
}

fn run_context(ws: &Workspace, args: &cli::ContextCli) -> Result<i32, SpecGraphError> {
    let phase = Phase::parse(&args.phase).ok_or_else(|| {
        SpecGraphError::ValidationError(format!(
            "unknown phase '{}'; expected understanding|locating|evaluating|planning",
            args.phase
        ))
    })?;
    let db = GraphDb::open(&ws.graph_db_path())?;
    let request = ContextRequest {
        phase,
        domain: args.domain.clone(),
        focus: args.focus.clone(),
    };
    let bundle = context::assemble(&db, &request)?;

    if args.format == "ids" {
        for id in &bundle.order {
            println!("{}", id);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&bundle).unwrap());
    }
    Ok(0)
}

fn run_validate_prd(ws: &Workspace, format: &str) -> Result<i32, SpecGraphError> {
    let index = ProseIndex::parse(&ws.prd_path)?;
    let issues = prose::validate_prd(&index);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&issues).unwrap());
    } else {
        println!(
            "{}: {} anchors",
            ws.relative(&index.doc_path),
            index.anchors().len()
        );
        for issue in &issues {
            match issue.severity {
                Severity::Error => fail(&issue.message),
                Severity::Warning => warn(&issue.message),
            }
        }
        if issues.is_empty() {
            pass("prose structure is clean");
        }
    }
    let has_errors = issues.iter().any(|i| i.severity == Severity::Error);
    Ok(if has_errors { 1 } else { 0 })
}

fn run_search(ws: &Workspace, query: &str) -> Result<i32, SpecGraphError> {
    let db = GraphDb::open(&ws.graph_db_path())?;
    let rows = db.search(query)?;
    for row in &rows {
        let detail = row
            .intent
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&row.description);
        println!(
            "{:10} {}  {}",
            row.kind,
            row.id,
            output::one_line(detail, 80)
        );
    }
    if rows.is_empty() {
        println!("no matches for '{}'", query);
    }
    Ok(0)
}

fn pass(message: &str) {
    println!("    {} {}", "●".bright_green(), message.bright_white());
}

fn fail(message: &str) {
    eprintln!("    {} {}", "●".bright_red(), message.bright_white());
}

fn warn(message: &str) {
    println!("    {} {}", "●".bright_yellow(), message.bright_white());
}

fn skip(message: &str) {
    println!("    {} {}", "○".bright_yellow(), message.bright_white());
}
