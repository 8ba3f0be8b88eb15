//! Context assembler: phase-parameterised minimal projections of the graph.
//!
//! Given a phase (`understanding`, `locating`, `evaluating`, `planning`)
//! and optional focus ids, emits the smallest closed node set a downstream
//! AI agent needs for that phase. Pure read-side projection: the assembler
//! never writes, and its output is canonically ordered so identical
//! databases always produce identical bundles.

use crate::core::error::SpecGraphError;
use crate::core::graph::{GraphDb, NodeRow};
use crate::core::store::NodeKind;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tiktoken_rs::cl100k_base;

/// Assembly phase; determines the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Understanding,
    Locating,
    Evaluating,
    Planning,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Understanding => "understanding",
            Phase::Locating => "locating",
            Phase::Evaluating => "evaluating",
            Phase::Planning => "planning",
        }
    }

    pub fn parse(value: &str) -> Option<Phase> {
        match value {
            "understanding" => Some(Phase::Understanding),
            "locating" => Some(Phase::Locating),
            "evaluating" => Some(Phase::Evaluating),
            "planning" => Some(Phase::Planning),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for one assembly call.
#[derive(Debug, Clone)]
pub struct ContextRequest {
    pub phase: Phase,
    /// Domain filter for `locating`.
    pub domain: Option<String>,
    /// Focus node for `evaluating` (a Feature) and `planning` (any node).
    pub focus: Option<String>,
}

/// One projected node payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: String,
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Deterministic, canonically ordered assembly output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub phase: String,
    pub focus: Option<String>,
    pub nodes: Vec<ContextNode>,
    /// Node ids in projection order; for `planning` this is the
    /// topological order of the dependency closure.
    pub order: Vec<String>,
    pub token_estimate: usize,
}

/// Assemble the minimal node set for a phase.
pub fn assemble(db: &GraphDb, req: &ContextRequest) -> Result<ContextBundle, SpecGraphError> {
    let nodes = match req.phase {
        Phase::Understanding => assemble_understanding(db)?,
        Phase::Locating => assemble_locating(db, req.domain.as_deref())?,
        Phase::Evaluating => {
            let focus = require_arg(req, "focus")?;
            assemble_evaluating(db, focus)?
        }
        Phase::Planning => {
            let focus = require_arg(req, "focus")?;
            assemble_planning(db, focus)?
        }
    };

    let order = nodes.iter().map(|n| n.id.clone()).collect();
    let token_estimate = estimate_tokens(&bundle_text(&nodes));

    Ok(ContextBundle {
        phase: req.phase.as_str().to_string(),
        focus: req.focus.clone(),
        nodes,
        order,
        token_estimate,
    })
}

fn require_arg<'a>(req: &'a ContextRequest, arg: &str) -> Result<&'a str, SpecGraphError> {
    req.focus
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SpecGraphError::PhaseArgumentMissing {
            phase: req.phase.as_str().to_string(),
            arg: arg.to_string(),
        })
}

/// `understanding`: the Product node alone, with its domain list reduced
/// to a summary. No features, no components.
fn assemble_understanding(db: &GraphDb) -> Result<Vec<ContextNode>, SpecGraphError> {
    let product = product_node(db)?;
    Ok(vec![ContextNode {
        id: product.id.clone(),
        kind: product.kind.clone(),
        payload: product_summary(&product),
    }])
}

/// `locating`: the Product plus the features of one domain (or all
/// features when no domain is given), each reduced to id/intent/realized_by.
fn assemble_locating(
    db: &GraphDb,
    domain: Option<&str>,
) -> Result<Vec<ContextNode>, SpecGraphError> {
    let product = product_node(db)?;
    let mut nodes = vec![ContextNode {
        id: product.id.clone(),
        kind: product.kind.clone(),
        payload: product_summary(&product),
    }];

    let features = match domain {
        Some(domain_id) => {
            let row = db.node(domain_id)?.ok_or_else(|| SpecGraphError::UnknownNode {
                id: domain_id.to_string(),
                phase: Phase::Locating.as_str().to_string(),
            })?;
            if row.kind != NodeKind::Domain.as_str() {
                return Err(SpecGraphError::ValidationError(format!(
                    "'{}' is a {} node, not a domain",
                    domain_id, row.kind
                )));
            }
            let mut features = Vec::new();
            for edge in db.edges_from(domain_id, Some("owns"))? {
                if let Some(feature) = db.node(&edge.target_id)? {
                    features.push(feature);
                }
            }
            features
        }
        None => db.nodes_by_kind(NodeKind::Feature)?,
    };

    for feature in features {
        nodes.push(ContextNode {
            id: feature.id.clone(),
            kind: feature.kind.clone(),
            payload: feature_locator(&feature),
        });
    }
    Ok(nodes)
}

/// `evaluating`: the focus feature with every component it is realized by
/// (full design body), plus components one hop away via `dependencies`.
fn assemble_evaluating(db: &GraphDb, focus: &str) -> Result<Vec<ContextNode>, SpecGraphError> {
    let feature = db.node(focus)?.ok_or_else(|| SpecGraphError::UnknownNode {
        id: focus.to_string(),
        phase: Phase::Evaluating.as_str().to_string(),
    })?;
    if feature.kind != NodeKind::Feature.as_str() {
        return Err(SpecGraphError::ValidationError(format!(
            "evaluating focus '{}' is a {} node, not a feature",
            focus, feature.kind
        )));
    }

    let mut nodes = vec![ContextNode {
        id: feature.id.clone(),
        kind: feature.kind.clone(),
        payload: feature.payload(),
    }];

    let mut component_ids: Vec<String> = db
        .edges_from(focus, Some("realized_by"))?
        .into_iter()
        .map(|e| e.target_id)
        .collect();

    // One further hop through component dependencies.
    let direct: Vec<String> = component_ids.clone();
    for component in &direct {
        for edge in db.edges_from(component, Some("depends_on"))? {
            if !component_ids.contains(&edge.target_id) {
                component_ids.push(edge.target_id);
            }
        }
    }
    component_ids.sort();
    component_ids.dedup();

    for id in component_ids {
        if let Some(row) = db.node(&id)? {
            if row.kind == NodeKind::Component.as_str() {
                nodes.push(ContextNode {
                    id: row.id.clone(),
                    kind: row.kind.clone(),
                    payload: row.payload(),
                });
            }
        }
    }
    Ok(nodes)
}

/// `planning`: the transitive `depends_on` closure restricted to the
/// focus's kind, topologically sorted with dependencies first.
fn assemble_planning(db: &GraphDb, focus: &str) -> Result<Vec<ContextNode>, SpecGraphError> {
    let row = db.node(focus)?.ok_or_else(|| SpecGraphError::UnknownNode {
        id: focus.to_string(),
        phase: Phase::Planning.as_str().to_string(),
    })?;
    let kind = NodeKind::parse(&row.kind).ok_or_else(|| {
        SpecGraphError::ValidationError(format!("node '{}' has unknown kind '{}'", focus, row.kind))
    })?;

    let order = planning_order(db, focus, kind)?;
    let mut nodes = Vec::new();
    for id in &order {
        if let Some(node) = db.node(id)? {
            nodes.push(ContextNode {
                id: node.id.clone(),
                kind: node.kind.clone(),
                payload: node.payload(),
            });
        }
    }
    Ok(nodes)
}

/// DFS post-order over `depends_on`, dependencies visited in sorted order:
/// every node appears after everything it depends on.
pub fn planning_order(
    db: &GraphDb,
    focus: &str,
    kind: NodeKind,
) -> Result<Vec<String>, SpecGraphError> {
    const IN_STACK: u8 = 1;
    const DONE: u8 = 2;

    fn visit(
        db: &GraphDb,
        id: &str,
        kind: NodeKind,
        state: &mut FxHashMap<String, u8>,
        stack: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<(), SpecGraphError> {
        match state.get(id) {
            Some(&DONE) => return Ok(()),
            Some(&IN_STACK) => {
                let start = stack.iter().position(|s| s == id).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].to_vec();
                cycle.push(id.to_string());
                return Err(SpecGraphError::CycleDetected {
                    kind: kind.as_str().to_string(),
                    cycle,
                });
            }
            _ => {}
        }
        state.insert(id.to_string(), IN_STACK);
        stack.push(id.to_string());
        for dep in db.depends_on_of(id, kind)? {
            visit(db, &dep, kind, state, stack, out)?;
        }
        stack.pop();
        state.insert(id.to_string(), DONE);
        out.push(id.to_string());
        Ok(())
    }

    let mut state = FxHashMap::default();
    let mut stack = Vec::new();
    let mut out = Vec::new();
    visit(db, focus, kind, &mut state, &mut stack, &mut out)?;
    Ok(out)
}

fn product_node(db: &GraphDb) -> Result<NodeRow, SpecGraphError> {
    db.nodes_by_kind(NodeKind::Product)?
        .into_iter()
        .next()
        .ok_or_else(|| SpecGraphError::NotFound("product node".to_string()))
}

/// Product payload with each domain reduced to id/name/description.
fn product_summary(product: &NodeRow) -> serde_json::Value {
    let mut payload = product.payload();
    if let Some(domains) = payload.get_mut("domains").and_then(|d| d.as_array_mut()) {
        for domain in domains {
            if let Some(obj) = domain.as_object_mut() {
                obj.retain(|key, _| matches!(key.as_str(), "id" | "name" | "description"));
            }
        }
    }
    payload
}

/// Feature reduced to the locating projection: id, intent, realized_by.
fn feature_locator(feature: &NodeRow) -> serde_json::Value {
    let payload = feature.payload();
    serde_json::json!({
        "id": feature.id,
        "intent": payload.get("intent").cloned().unwrap_or(serde_json::Value::Null),
        "realized_by": payload.get("realized_by").cloned().unwrap_or_else(|| serde_json::json!([])),
    })
}

fn bundle_text(nodes: &[ContextNode]) -> String {
    nodes
        .iter()
        .map(|n| n.payload.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Approximate token count of the bundle payloads (cl100k vocabulary).
fn estimate_tokens(text: &str) -> usize {
    match cl100k_base() {
        Ok(bpe) => bpe.encode_with_special_tokens(text).len(),
        // The vocabulary failing to load should never block assembly.
        Err(_) => text.len() / 4,
    }
}
