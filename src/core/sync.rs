//! Synchroniser: one-way projection of the node store and prose index into
//! the graph database.
//!
//! Two modes: a full rebuild (truncate, walk everything, insert) and an
//! incremental run over a set of changed file paths with per-file
//! content-hash short-circuiting. All reads complete before any writes;
//! writes happen inside one transaction under the in-process writer lock.
//!
//! Node files are parsed and validated in parallel, but rows are sorted by
//! (kind, path, id) before insert, so identical snapshots always produce
//! identical databases.
//!
//! Failure semantics: a parse or validation error in one file is recorded
//! in the run's report and leaves that node un-upserted (its edges go
//! stale); a corrupted meta-schema aborts the whole run.

use crate::core::config::Workspace;
use crate::core::db;
use crate::core::error::SpecGraphError;
use crate::core::prose::ProseIndex;
use crate::core::registry::SchemaRegistry;
use crate::core::store::{
    FileFailure, NodeFile, NodeKind, NodeStore, Severity, ValidationContext,
};
use crate::core::time;
use rayon::prelude::*;
use rusqlite::{params, Transaction};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// An edge that was not created because its target does not exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DanglingEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
}

/// Outcome of one synchroniser run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub mode: String,
    pub nodes_written: usize,
    pub nodes_skipped: usize,
    pub nodes_removed: usize,
    pub edges_written: usize,
    pub apis_written: usize,
    pub failures: Vec<FileFailure>,
    pub dangling: Vec<DanglingEdge>,
}

impl SyncReport {
    fn new(mode: &str) -> Self {
        SyncReport {
            mode: mode.to_string(),
            nodes_written: 0,
            nodes_skipped: 0,
            nodes_removed: 0,
            edges_written: 0,
            apis_written: 0,
            failures: Vec::new(),
            dangling: Vec::new(),
        }
    }

    /// True when at least one file was rejected this run.
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeData {
    source: String,
    target: String,
    relation: String,
    metadata: String,
}

#[derive(Debug, Clone)]
struct ApiData {
    id: String,
    domain_id: String,
    name: String,
    signature: String,
    description: String,
    input_schema: String,
    output_schema: String,
}

/// Everything read from disk before any write happens.
struct SyncInputs {
    accepted: Vec<NodeFile>,
    failures: Vec<FileFailure>,
    prose: ProseIndex,
}

/// Full rebuild: truncate all tables and project the entire store.
pub fn sync_full(ws: &Workspace) -> Result<SyncReport, SpecGraphError> {
    let inputs = read_inputs(ws)?;
    let mut report = SyncReport::new("full");
    report.failures = inputs.failures.clone();

    let known_ids: FxHashSet<String> = inputs
        .accepted
        .iter()
        .map(|f| f.doc.id.clone())
        .collect();
    let apis = derive_domain_apis(&inputs.accepted);
    let api_ids: FxHashSet<String> = apis.iter().map(|a| a.id.clone()).collect();

    let mut edges = Vec::new();
    for file in &inputs.accepted {
        edges.extend(derive_edges(file, &known_ids, &api_ids, &mut report.dangling));
    }
    edges.sort();
    edges.dedup();

    let db_path = ws.graph_db_path();
    db::with_write_lock(&db_path, || {
        let mut conn = db::initialize_graph_db(&db_path)?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM domain_apis", [])?;
        tx.execute("DELETE FROM edges", [])?;
        tx.execute("DELETE FROM nodes", [])?;

        for file in &inputs.accepted {
            insert_node(&tx, ws, &inputs.prose, file)?;
            report.nodes_written += 1;
        }
        for edge in &edges {
            report.edges_written += insert_edge(&tx, edge)?;
        }
        for api in &apis {
            insert_api(&tx, api)?;
            report.apis_written += 1;
        }

        tx.commit()?;
        Ok(())
    })?;

    Ok(report)
}

/// Incremental run over a set of changed file paths. Unchanged content
/// hashes are skipped; removed files cascade to edge deletions.
pub fn sync_incremental(
    ws: &Workspace,
    changed: &[PathBuf],
) -> Result<SyncReport, SpecGraphError> {
    let inputs = read_inputs(ws)?;
    let mut report = SyncReport::new("incremental");
    report.failures = inputs.failures.clone();

    // Group accepted files by their project-relative source path; a change
    // to product.yaml reprocesses the product and every inline domain.
    let mut by_source: BTreeMap<String, Vec<&NodeFile>> = BTreeMap::new();
    for file in &inputs.accepted {
        by_source
            .entry(ws.relative(&file.path))
            .or_default()
            .push(file);
    }

    let mut changed_sources: Vec<String> = changed
        .iter()
        .map(|p| {
            if p.is_absolute() {
                ws.relative(p)
            } else {
                ws.relative(&ws.project_root.join(p))
            }
        })
        .collect();
    changed_sources.sort();
    changed_sources.dedup();

    let apis = derive_domain_apis(&inputs.accepted);
    let api_ids: FxHashSet<String> = apis.iter().map(|a| a.id.clone()).collect();
    let product_changed = changed_sources
        .iter()
        .any(|s| by_source.get(s).is_some_and(|files| {
            files.iter().any(|f| f.doc.kind == NodeKind::Product)
        }) || s.ends_with("product.yaml"));

    let db_path = ws.graph_db_path();
    db::with_write_lock(&db_path, || {
        let mut conn = db::initialize_graph_db(&db_path)?;
        let tx = conn.transaction()?;

        // Removed files first, so cascaded edge deletions cannot resurrect.
        for source in &changed_sources {
            if !by_source.contains_key(source) {
                report.nodes_removed += tx.execute(
                    "DELETE FROM nodes WHERE source_file = ?1",
                    params![source],
                )?;
            }
        }

        // Upsert pass: hash short-circuit per node.
        let mut touched: Vec<&NodeFile> = Vec::new();
        for source in &changed_sources {
            let Some(files) = by_source.get(source) else {
                continue;
            };
            for file in files {
                let stored: Option<String> = tx
                    .query_row(
                        "SELECT content_hash FROM nodes WHERE id = ?1",
                        params![file.doc.id],
                        |row| row.get(0),
                    )
                    .ok();
                if stored.as_deref() == Some(file.content_hash.as_str()) {
                    report.nodes_skipped += 1;
                    continue;
                }
                upsert_node(&tx, ws, &inputs.prose, file)?;
                report.nodes_written += 1;
                touched.push(file);
            }
        }

        // Replace outgoing edges for every touched node.
        let known_ids = db_node_ids(&tx)?;
        for file in &touched {
            tx.execute(
                "DELETE FROM edges WHERE source_id = ?1",
                params![file.doc.id],
            )?;
            // The owns edge is derived from the feature file, but its
            // source is the domain; refresh it alongside.
            if file.doc.kind == NodeKind::Feature {
                tx.execute(
                    "DELETE FROM edges WHERE target_id = ?1 AND relation = 'owns'",
                    params![file.doc.id],
                )?;
            }
            let mut edges =
                derive_edges(file, &known_ids, &api_ids, &mut report.dangling);
            edges.sort();
            edges.dedup();
            for edge in &edges {
                report.edges_written += insert_edge(&tx, edge)?;
            }
        }

        // Domain APIs are a pure function of the product file.
        if product_changed {
            tx.execute("DELETE FROM domain_apis", [])?;
            for api in &apis {
                insert_api(&tx, api)?;
                report.apis_written += 1;
            }
        }

        tx.commit()?;
        Ok(())
    })?;

    Ok(report)
}

/// Read and validate everything the run needs before any write.
fn read_inputs(ws: &Workspace) -> Result<SyncInputs, SpecGraphError> {
    let registry = SchemaRegistry::load(&ws.spec_root)?;
    let store = NodeStore::new(&ws.spec_root);
    let scan = store.iterate(None);
    let prose = ProseIndex::parse(&ws.prd_path)?;

    let ctx = ValidationContext::from_scan(&scan);
    let validations: Vec<_> = scan
        .files
        .par_iter()
        .map(|file| store.validate(file, &registry, &ctx))
        .collect();

    let mut accepted = Vec::new();
    let mut failures = scan.failures.clone();
    for (file, issues) in scan.files.iter().zip(validations) {
        if file.is_meta_schema {
            continue; // grammar, not a sentence in it
        }
        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .collect();
        if errors.is_empty() {
            accepted.push(file.clone());
        } else {
            failures.push(FileFailure {
                path: ws.relative(&file.path),
                detail: errors
                    .iter()
                    .map(|i| i.message.clone())
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }
    }

    accepted.sort_by(|a, b| {
        (a.doc.kind, &a.path, &a.doc.id).cmp(&(b.doc.kind, &b.path, &b.doc.id))
    });

    Ok(SyncInputs {
        accepted,
        failures,
        prose,
    })
}

/// Derive outgoing edges for one node. Dangling endpoints are recorded and
/// produce no edge; self-references never reach here (schema-time error).
fn derive_edges(
    file: &NodeFile,
    known_ids: &FxHashSet<String>,
    api_ids: &FxHashSet<String>,
    dangling: &mut Vec<DanglingEdge>,
) -> Vec<EdgeData> {
    let doc = &file.doc;
    let mut edges = Vec::new();

    match doc.kind {
        NodeKind::Product => {
            if let Some(serde_yaml::Value::Sequence(seq)) =
                doc.raw.get(serde_yaml::Value::from("domains"))
            {
                for entry in seq {
                    if let Some(id) = entry
                        .as_mapping()
                        .and_then(|m| m.get(serde_yaml::Value::from("id")))
                        .and_then(|v| v.as_str())
                    {
                        push_edge(known_ids, &mut edges, dangling, &doc.id, id, "contains", None);
                    }
                }
            }
        }
        NodeKind::Feature => {
            if let Some(domain) = doc.str_field("domain") {
                push_edge(known_ids, &mut edges, dangling, domain, &doc.id, "owns", None);
            }
            for target in doc.list_field("depends_on") {
                push_edge(
                    known_ids, &mut edges, dangling, &doc.id, &target, "depends_on", None,
                );
            }
            for target in doc.list_field("realized_by") {
                push_edge(
                    known_ids, &mut edges, dangling, &doc.id, &target, "realized_by", None,
                );
            }
            for api in doc.list_field("consumes") {
                let domain = api.split('.').next().unwrap_or("");
                if api_ids.contains(&api) {
                    let metadata = serde_json::json!({ "api": api }).to_string();
                    push_edge(
                        known_ids,
                        &mut edges,
                        dangling,
                        &doc.id,
                        domain,
                        "consumes",
                        Some(metadata),
                    );
                } else {
                    dangling.push(DanglingEdge {
                        source: doc.id.clone(),
                        target: api,
                        relation: "consumes".to_string(),
                    });
                }
            }
        }
        NodeKind::Component => {
            for target in doc.list_field("dependencies") {
                push_edge(
                    known_ids, &mut edges, dangling, &doc.id, &target, "depends_on", None,
                );
            }
        }
        NodeKind::Domain | NodeKind::Design | NodeKind::Substrate => {}
    }

    edges
}

fn push_edge(
    known_ids: &FxHashSet<String>,
    edges: &mut Vec<EdgeData>,
    dangling: &mut Vec<DanglingEdge>,
    source: &str,
    target: &str,
    relation: &str,
    metadata: Option<String>,
) {
    if source == target {
        return;
    }
    if known_ids.contains(source) && known_ids.contains(target) {
        edges.push(EdgeData {
            source: source.to_string(),
            target: target.to_string(),
            relation: relation.to_string(),
            metadata: metadata.unwrap_or_else(|| "{}".to_string()),
        });
    } else {
        dangling.push(DanglingEdge {
            source: source.to_string(),
            target: target.to_string(),
            relation: relation.to_string(),
        });
    }
}

/// Domain APIs are derived from the product file's per-domain exports.
/// Entries may be plain names or mappings with signature/description and
/// input/output schemas.
fn derive_domain_apis(accepted: &[NodeFile]) -> Vec<ApiData> {
    let mut apis = Vec::new();
    for file in accepted {
        if file.doc.kind != NodeKind::Domain {
            continue;
        }
        let Some(serde_yaml::Value::Sequence(exports)) =
            file.doc.raw.get(serde_yaml::Value::from("exports"))
        else {
            continue;
        };
        for entry in exports {
            let (name, signature, description, input_schema, output_schema) = match entry {
                serde_yaml::Value::String(name) => (
                    name.clone(),
                    String::new(),
                    String::new(),
                    "{}".to_string(),
                    "{}".to_string(),
                ),
                serde_yaml::Value::Mapping(m) => {
                    let get = |key: &str| {
                        m.get(serde_yaml::Value::from(key))
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string()
                    };
                    let schema = |key: &str| {
                        m.get(serde_yaml::Value::from(key))
                            .map(|v| crate::core::store::canonical_json(v).to_string())
                            .unwrap_or_else(|| "{}".to_string())
                    };
                    let name = get("name");
                    if name.is_empty() {
                        continue;
                    }
                    (
                        name,
                        get("signature"),
                        get("description"),
                        schema("input"),
                        schema("output"),
                    )
                }
                _ => continue,
            };
            apis.push(ApiData {
                id: format!("{}.{}", file.doc.id, name),
                domain_id: file.doc.id.clone(),
                name,
                signature,
                description,
                input_schema,
                output_schema,
            });
        }
    }
    apis.sort_by(|a, b| a.id.cmp(&b.id));
    apis
}

fn node_row_values(
    ws: &Workspace,
    prose: &ProseIndex,
    file: &NodeFile,
) -> (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
) {
    let doc = &file.doc;
    let name = doc.str_field("name").unwrap_or("").to_string();
    let description = doc
        .str_field("description")
        .or_else(|| doc.str_field("desc"))
        .unwrap_or("")
        .to_string();
    let source_anchor = prose
        .source_anchor(&doc.id)
        .or_else(|| doc.str_field("source_anchor").map(|s| s.to_string()));
    let intent = doc.str_field("intent").map(|s| s.to_string());
    let file_path = doc.str_field("file_path").map(|s| s.to_string());
    let stamp = time::file_epoch_z(&file.path);
    (
        doc.id.clone(),
        doc.kind.as_str().to_string(),
        name,
        description,
        ws.relative(&file.path),
        source_anchor,
        intent,
        file_path,
        file.content_hash.clone(),
        doc.canonical_payload(),
        stamp,
    )
}

fn insert_node(
    tx: &Transaction<'_>,
    ws: &Workspace,
    prose: &ProseIndex,
    file: &NodeFile,
) -> Result<(), SpecGraphError> {
    let (id, kind, name, description, source_file, source_anchor, intent, file_path, hash, payload, stamp) =
        node_row_values(ws, prose, file);
    tx.execute(
        "INSERT INTO nodes(id, kind, name, description, source_file, source_anchor,
                           intent, file_path, content_hash, raw_payload, created_at, updated_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            id,
            kind,
            name,
            description,
            source_file,
            source_anchor,
            intent,
            file_path,
            hash,
            payload,
            stamp
        ],
    )?;
    Ok(())
}

fn upsert_node(
    tx: &Transaction<'_>,
    ws: &Workspace,
    prose: &ProseIndex,
    file: &NodeFile,
) -> Result<(), SpecGraphError> {
    let (id, kind, name, description, source_file, source_anchor, intent, file_path, hash, payload, stamp) =
        node_row_values(ws, prose, file);
    tx.execute(
        "INSERT INTO nodes(id, kind, name, description, source_file, source_anchor,
                           intent, file_path, content_hash, raw_payload, created_at, updated_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
         ON CONFLICT(id) DO UPDATE SET
             kind = excluded.kind,
             name = excluded.name,
             description = excluded.description,
             source_file = excluded.source_file,
             source_anchor = excluded.source_anchor,
             intent = excluded.intent,
             file_path = excluded.file_path,
             content_hash = excluded.content_hash,
             raw_payload = excluded.raw_payload,
             updated_at = excluded.updated_at",
        params![
            id,
            kind,
            name,
            description,
            source_file,
            source_anchor,
            intent,
            file_path,
            hash,
            payload,
            stamp
        ],
    )?;
    Ok(())
}

fn insert_edge(tx: &Transaction<'_>, edge: &EdgeData) -> Result<usize, SpecGraphError> {
    let n = tx.execute(
        "INSERT OR IGNORE INTO edges(source_id, target_id, relation, metadata)
         VALUES(?1, ?2, ?3, ?4)",
        params![edge.source, edge.target, edge.relation, edge.metadata],
    )?;
    Ok(n)
}

fn insert_api(tx: &Transaction<'_>, api: &ApiData) -> Result<(), SpecGraphError> {
    tx.execute(
        "INSERT OR REPLACE INTO domain_apis(id, domain_id, name, signature, description,
                                            input_schema, output_schema)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            api.id,
            api.domain_id,
            api.name,
            api.signature,
            api.description,
            api.input_schema,
            api.output_schema
        ],
    )?;
    Ok(())
}

fn db_node_ids(tx: &Transaction<'_>) -> Result<FxHashSet<String>, SpecGraphError> {
    let mut stmt = tx.prepare("SELECT id FROM nodes")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut ids = FxHashSet::default();
    for row in rows {
        ids.insert(row?);
    }
    Ok(ids)
}
