//! Consistency monitor: the layered dashboard over schema validity,
//! intent-spec agreement, and structural assignment.
//!
//! The monitor reads the filesystem snapshot directly (node store + prose
//! index); it never consults or writes the graph database, so it can run
//! before the first sync. Given a frozen snapshot its report is fully
//! deterministic.
//!
//! Dimension weights are fixed: schema 0.30, intent-spec sync 0.30,
//! feature assignment 0.40.

use crate::core::config::Workspace;
use crate::core::error::SpecGraphError;
use crate::core::prose::ProseIndex;
use crate::core::registry::SchemaRegistry;
use crate::core::store::{
    FileFailure, NodeKind, NodeStore, Severity, ValidationContext,
};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const SCHEMA_WEIGHT: f64 = 0.30;
pub const SYNC_WEIGHT: f64 = 0.30;
pub const ASSIGNMENT_WEIGHT: f64 = 0.40;

/// Intent-spec classification for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Present as both a prose anchor and a node definition.
    Synced,
    /// Anchored in prose with no node definition behind it.
    PrdOnly,
    /// Defined as a node with no anchored prose intent.
    YamlOnly,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::PrdOnly => write!(f, "prd_only"),
            SyncStatus::YamlOnly => write!(f, "yaml_only"),
        }
    }
}

/// Whether a feature has at least one realizing component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignment {
    Assigned,
    Unassigned,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignment::Assigned => write!(f, "assigned"),
            Assignment::Unassigned => write!(f, "unassigned"),
        }
    }
}

/// One dimension's pass count over its population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub passed: usize,
    pub total: usize,
    pub score: f64,
}

impl DimensionScore {
    fn new(passed: usize, total: usize) -> Self {
        let score = if total == 0 {
            1.0
        } else {
            passed as f64 / total as f64
        };
        DimensionScore {
            passed,
            total,
            score,
        }
    }
}

/// Per-file schema validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSchemaStatus {
    pub path: String,
    pub node_id: String,
    pub errors: usize,
    pub warnings: usize,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureStatus {
    pub id: String,
    pub sync: SyncStatus,
    pub assignment: Assignment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub id: String,
    pub sync: SyncStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignStatus {
    pub id: String,
    pub sync: SyncStatus,
}

/// The dashboard: layered progress plus per-node detail rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorReport {
    pub schema: DimensionScore,
    pub sync: DimensionScore,
    pub assignment: DimensionScore,
    pub overall: f64,
    pub files: Vec<FileSchemaStatus>,
    pub features: Vec<FeatureStatus>,
    pub components: Vec<ComponentStatus>,
    pub designs: Vec<DesignStatus>,
    pub failures: Vec<FileFailure>,
}

impl MonitorReport {
    /// True when the run surfaced at least one schema error, parse
    /// failure, or intent-spec orphan.
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
            || self.files.iter().any(|f| f.errors > 0)
            || self.features.iter().any(|f| f.sync != SyncStatus::Synced)
            || self.components.iter().any(|c| c.sync != SyncStatus::Synced)
            || self.designs.iter().any(|d| d.sync != SyncStatus::Synced)
    }
}

/// Run the consistency check over one workspace snapshot.
pub fn run_monitor(ws: &Workspace) -> Result<MonitorReport, SpecGraphError> {
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

    // Schema dimension: real node files only. The meta-schema is the
    // grammar and synthetic domains have no file of their own; neither is
    // counted. Unparseable files count against the dimension.
    let mut files = Vec::new();
    let mut schema_passed = 0usize;
    for (file, issues) in scan.files.iter().zip(&validations) {
        if file.is_meta_schema || file.synthetic {
            continue;
        }
        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        let warnings = issues.len() - errors;
        if errors == 0 {
            schema_passed += 1;
        }
        files.push(FileSchemaStatus {
            path: ws.relative(&file.path),
            node_id: file.doc.id.clone(),
            errors,
            warnings,
            messages: issues.iter().map(|i| i.message.clone()).collect(),
        });
    }
    let schema_total = files.len() + scan.failures.len();
    let schema = DimensionScore::new(schema_passed, schema_total);

    // Intent-spec sync universe: features, components, designs, and
    // non-meta substrates, from the union of prose anchors and node files.
    // Product and inline domains are deliberately excluded.
    let feature_ids: FxHashSet<&str> = scan
        .files_of_kind(NodeKind::Feature)
        .map(|f| f.doc.id.as_str())
        .collect();
    let component_ids: FxHashSet<&str> = scan
        .files_of_kind(NodeKind::Component)
        .map(|f| f.doc.id.as_str())
        .collect();

    let mut realized: FxHashSet<String> = FxHashSet::default();
    for feature in scan.files_of_kind(NodeKind::Feature) {
        for target in feature.doc.list_field("realized_by") {
            realized.insert(target);
        }
    }

    let mut universe: BTreeMap<String, NodeKind> = BTreeMap::new();
    for file in &scan.files {
        match file.doc.kind {
            NodeKind::Feature | NodeKind::Component | NodeKind::Design => {
                universe.insert(file.doc.id.clone(), file.doc.kind);
            }
            NodeKind::Substrate if !file.is_meta_schema => {
                universe.insert(file.doc.id.clone(), file.doc.kind);
            }
            _ => {}
        }
    }
    for anchor in prose.anchors() {
        match NodeKind::from_id(&anchor.id) {
            Some(kind @ (NodeKind::Feature | NodeKind::Component)) => {
                universe.entry(anchor.id.clone()).or_insert(kind);
            }
            Some(NodeKind::Design) => {
                let eligible = anchor
                    .parent_h2
                    .as_deref()
                    .is_some_and(|h| h.to_lowercase().contains("design principles"));
                if eligible || universe.contains_key(&anchor.id) {
                    universe.entry(anchor.id.clone()).or_insert(NodeKind::Design);
                }
            }
            Some(NodeKind::Substrate) if anchor.id != crate::core::store::META_SCHEMA_ID => {
                universe.entry(anchor.id.clone()).or_insert(NodeKind::Substrate);
            }
            _ => {}
        }
    }

    let anchored: FxHashSet<&str> = prose.anchors().iter().map(|a| a.id.as_str()).collect();

    let mut features = Vec::new();
    let mut components = Vec::new();
    let mut designs = Vec::new();
    let mut sync_passed = 0usize;

    for (id, kind) in &universe {
        let has_file = match kind {
            NodeKind::Feature => feature_ids.contains(id.as_str()),
            NodeKind::Component => component_ids.contains(id.as_str()),
            _ => scan.find(id).is_some(),
        };
        let status = match kind {
            // Intent reaches components through their feature: a component
            // is synced when an existing feature realizes it.
            NodeKind::Component => {
                if has_file && realized.contains(id.as_str()) {
                    SyncStatus::Synced
                } else if has_file {
                    SyncStatus::YamlOnly
                } else {
                    SyncStatus::PrdOnly
                }
            }
            _ => {
                if has_file && anchored.contains(id.as_str()) {
                    SyncStatus::Synced
                } else if has_file {
                    SyncStatus::YamlOnly
                } else {
                    SyncStatus::PrdOnly
                }
            }
        };
        if status == SyncStatus::Synced {
            sync_passed += 1;
        }
        match kind {
            NodeKind::Feature => {
                let assignment = scan
                    .find(id)
                    .filter(|f| !f.doc.list_field("realized_by").is_empty())
                    .map(|_| Assignment::Assigned)
                    .unwrap_or(Assignment::Unassigned);
                features.push(FeatureStatus {
                    id: id.clone(),
                    sync: status,
                    assignment,
                });
            }
            NodeKind::Component => components.push(ComponentStatus {
                id: id.clone(),
                sync: status,
            }),
            _ => designs.push(DesignStatus {
                id: id.clone(),
                sync: status,
            }),
        }
    }
    let sync = DimensionScore::new(sync_passed, universe.len());

    // Assignment dimension: features with a non-empty realized_by list.
    let assigned = features
        .iter()
        .filter(|f| f.assignment == Assignment::Assigned)
        .count();
    let feature_file_count = features
        .iter()
        .filter(|f| f.sync != SyncStatus::PrdOnly)
        .count();
    let assignment = DimensionScore::new(assigned, feature_file_count);

    let overall = SCHEMA_WEIGHT * schema.score
        + SYNC_WEIGHT * sync.score
        + ASSIGNMENT_WEIGHT * assignment.score;

    Ok(MonitorReport {
        schema,
        sync,
        assignment,
        overall,
        files,
        features,
        components,
        designs,
        failures: scan.failures.clone(),
    })
}
