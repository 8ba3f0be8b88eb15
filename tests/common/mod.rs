//! Shared fixtures for integration tests: a small but complete workspace
//! with a product, two domains, one feature, and one component, mirroring
//! the shape real projects start from.
#![allow(dead_code)]

use specgraph::core::assets;
use specgraph::core::config::Workspace;
use std::fs;
use std::path::Path;

pub const PRODUCT: &str = r#"id: prod_demo
type: product
name: Demo Product
version: 0.1.0
description: A demo product used by the integration suite.
vision: Keep intent and specification in lockstep.
domains:
  - id: dom_core
    name: Core
    description: Scanning and indexing.
    exports:
      - name: scan_files
        signature: scan_files(root) -> report
        description: Walk the tree and report.
  - id: dom_cli
    name: CLI
    description: Command surface.
"#;

pub const FEAT_SCAN: &str = r#"id: feat_scan
type: feature
domain: dom_core
source_anchor: "PRD.md#feat_scan"
intent: Scan the repository and build the index.
realized_by:
  - comp_scanner
consumes:
  - dom_core.scan_files
"#;

pub const COMP_SCANNER: &str = r#"id: comp_scanner
type: module
desc: Walks the filesystem and hashes files.
file_path: src/scanner.rs
design:
  api: "scan(root) -> ScanReport"
  logic: Walk directories, hash each file, emit a report.
"#;

pub const PRD: &str = r#"# Demo Product Requirements

## Demo Product <!-- id: prod_demo -->

Why this product exists.

## Core <!-- id: dom_core -->

Scanning and indexing requirements.

### Feature: Scan <!-- id: feat_scan -->

- comp_scanner walks the tree.

## CLI <!-- id: dom_cli -->

Command surface notes.
"#;

/// Write the happy-path workspace into `root` and resolve it.
pub fn setup_workspace(root: &Path) -> Workspace {
    let ws = Workspace::discover(root).expect("workspace discovery");
    write_spec_file(&ws, "substrate/sub_meta_schema.yaml", assets::TEMPLATE_META_SCHEMA);
    write_spec_file(&ws, "product.yaml", PRODUCT);
    write_spec_file(&ws, "features/feat_scan.yaml", FEAT_SCAN);
    write_spec_file(&ws, "components/comp_scanner.yaml", COMP_SCANNER);
    fs::write(&ws.prd_path, PRD).expect("write PRD");
    ws
}

/// Write one file under the spec root, creating parents.
pub fn write_spec_file(ws: &Workspace, rel: &str, content: &str) {
    let path = ws.spec_root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create spec dirs");
    }
    fs::write(path, content).expect("write spec file");
}

/// Deterministic dump of the three graph tables, for whole-database
/// equality assertions.
pub fn dump_database(ws: &Workspace) -> String {
    let conn = rusqlite::Connection::open(ws.graph_db_path()).expect("open db");
    let mut out = String::new();

    let mut stmt = conn
        .prepare(
            "SELECT id, kind, name, description, source_file, source_anchor, intent,
                    file_path, content_hash, raw_payload, created_at, updated_at
             FROM nodes ORDER BY id",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |row| {
            let mut line = String::new();
            for i in 0..12 {
                let value: Option<String> = row.get(i)?;
                line.push_str(value.as_deref().unwrap_or("<null>"));
                line.push('|');
            }
            Ok(line)
        })
        .unwrap();
    for row in rows {
        out.push_str(&row.unwrap());
        out.push('\n');
    }

    let mut stmt = conn
        .prepare(
            "SELECT source_id, target_id, relation, metadata FROM edges
             ORDER BY source_id, relation, target_id",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |row| {
            Ok(format!(
                "{}|{}|{}|{}",
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?
            ))
        })
        .unwrap();
    for row in rows {
        out.push_str(&row.unwrap());
        out.push('\n');
    }

    let mut stmt = conn
        .prepare(
            "SELECT id, domain_id, name, signature, description, input_schema, output_schema
             FROM domain_apis ORDER BY id",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |row| {
            let mut line = String::new();
            for i in 0..7 {
                line.push_str(&row.get::<_, String>(i)?);
                line.push('|');
            }
            Ok(line)
        })
        .unwrap();
    for row in rows {
        out.push_str(&row.unwrap());
        out.push('\n');
    }

    out
}

/// Count rows in a table.
pub fn count_rows(ws: &Workspace, table: &str) -> i64 {
    let conn = rusqlite::Connection::open(ws.graph_db_path()).expect("open db");
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}
