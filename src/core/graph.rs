//! Read-side query surface over the graph database.
//!
//! Consumed by the context assembler and by external surfaces (CLI search,
//! web viewer). Everything here opens read-only and never writes; the
//! synchroniser is the only writer.

use crate::core::db;
use crate::core::error::SpecGraphError;
use crate::core::store::NodeKind;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::path::Path;

const NODE_COLUMNS: &str = "id, kind, name, description, source_file, source_anchor, intent, \
                            file_path, content_hash, raw_payload, created_at, updated_at";

/// One row of the `nodes` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRow {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub description: String,
    pub source_file: String,
    pub source_anchor: Option<String>,
    pub intent: Option<String>,
    pub file_path: Option<String>,
    pub content_hash: String,
    pub raw_payload: String,
    pub created_at: String,
    pub updated_at: String,
}

impl NodeRow {
    /// Parsed canonical payload; `{}` for rows written without one.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::from_str(&self.raw_payload).unwrap_or(serde_json::Value::Null)
    }
}

/// One row of the `edges` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRow {
    pub source_id: String,
    pub target_id: String,
    pub relation: String,
    pub metadata: String,
}

/// One row of the `domain_apis` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainApiRow {
    pub id: String,
    pub domain_id: String,
    pub name: String,
    pub signature: String,
    pub description: String,
    pub input_schema: String,
    pub output_schema: String,
}

/// Read-only handle on the graph database.
pub struct GraphDb {
    conn: Connection,
}

impl GraphDb {
    /// Open the database read-only. `NotFound` when no sync has run yet.
    pub fn open(db_path: &Path) -> Result<GraphDb, SpecGraphError> {
        Ok(GraphDb {
            conn: db::db_connect_read_only(db_path)?,
        })
    }

    /// Wrap an existing connection (tests, in-process readers).
    pub fn from_connection(conn: Connection) -> GraphDb {
        GraphDb { conn }
    }

    /// Single-node fetch by identifier.
    pub fn node(&self, id: &str) -> Result<Option<NodeRow>, SpecGraphError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM nodes WHERE id = ?1",
            NODE_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], row_to_node)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All nodes of one kind, ordered by id.
    pub fn nodes_by_kind(&self, kind: NodeKind) -> Result<Vec<NodeRow>, SpecGraphError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM nodes WHERE kind = ?1 ORDER BY id",
            NODE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![kind.as_str()], row_to_node)?;
        collect_rows(rows)
    }

    /// Outgoing edges, optionally restricted to one relation. Ordered by
    /// (relation, target) for stable output.
    pub fn edges_from(
        &self,
        id: &str,
        relation: Option<&str>,
    ) -> Result<Vec<EdgeRow>, SpecGraphError> {
        match relation {
            Some(rel) => {
                let mut stmt = self.conn.prepare(
                    "SELECT source_id, target_id, relation, metadata FROM edges
                     WHERE source_id = ?1 AND relation = ?2
                     ORDER BY relation, target_id",
                )?;
                let rows = stmt.query_map(params![id, rel], row_to_edge)?;
                collect_rows(rows)
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT source_id, target_id, relation, metadata FROM edges
                     WHERE source_id = ?1
                     ORDER BY relation, target_id",
                )?;
                let rows = stmt.query_map(params![id], row_to_edge)?;
                collect_rows(rows)
            }
        }
    }

    /// Incoming edges, optionally restricted to one relation.
    pub fn edges_to(
        &self,
        id: &str,
        relation: Option<&str>,
    ) -> Result<Vec<EdgeRow>, SpecGraphError> {
        match relation {
            Some(rel) => {
                let mut stmt = self.conn.prepare(
                    "SELECT source_id, target_id, relation, metadata FROM edges
                     WHERE target_id = ?1 AND relation = ?2
                     ORDER BY relation, source_id",
                )?;
                let rows = stmt.query_map(params![id, rel], row_to_edge)?;
                collect_rows(rows)
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT source_id, target_id, relation, metadata FROM edges
                     WHERE target_id = ?1
                     ORDER BY relation, source_id",
                )?;
                let rows = stmt.query_map(params![id], row_to_edge)?;
                collect_rows(rows)
            }
        }
    }

    /// Direct `depends_on` targets of a node, restricted to a kind,
    /// sorted ascending.
    pub fn depends_on_of(
        &self,
        id: &str,
        kind: NodeKind,
    ) -> Result<Vec<String>, SpecGraphError> {
        let mut stmt = self.conn.prepare(
            "SELECT e.target_id FROM edges e
             JOIN nodes n ON n.id = e.target_id
             WHERE e.source_id = ?1 AND e.relation = 'depends_on' AND n.kind = ?2
             ORDER BY e.target_id",
        )?;
        let rows = stmt.query_map(params![id, kind.as_str()], |row| row.get::<_, String>(0))?;
        collect_rows(rows)
    }

    /// Recursive closure of `depends_on` within a node kind, excluding the
    /// start node, sorted ascending.
    pub fn depends_on_closure(
        &self,
        id: &str,
        kind: NodeKind,
    ) -> Result<Vec<String>, SpecGraphError> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([id.to_string()]);
        while let Some(current) = queue.pop_front() {
            for target in self.depends_on_of(&current, kind)? {
                if target != id && seen.insert(target.clone()) {
                    queue.push_back(target);
                }
            }
        }
        Ok(seen.into_iter().collect())
    }

    /// Keyword search over name, intent, and description.
    pub fn search(&self, query: &str) -> Result<Vec<NodeRow>, SpecGraphError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM nodes
             WHERE name LIKE ?1 OR intent LIKE ?1 OR description LIKE ?1
             ORDER BY kind, id",
            NODE_COLUMNS
        ))?;
        let q = format!("%{}%", query);
        let rows = stmt.query_map(params![q], row_to_node)?;
        collect_rows(rows)
    }

    /// Exported APIs of a domain, ordered by name.
    pub fn apis_of(&self, domain_id: &str) -> Result<Vec<DomainApiRow>, SpecGraphError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, domain_id, name, signature, description, input_schema, output_schema
             FROM domain_apis WHERE domain_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![domain_id], |row| {
            Ok(DomainApiRow {
                id: row.get(0)?,
                domain_id: row.get(1)?,
                name: row.get(2)?,
                signature: row.get(3)?,
                description: row.get(4)?,
                input_schema: row.get(5)?,
                output_schema: row.get(6)?,
            })
        })?;
        collect_rows(rows)
    }

    /// Physical binding of a component: the `binds_to` relation, stored as
    /// the node row's `file_path` column.
    pub fn binding_of(&self, component_id: &str) -> Result<Option<String>, SpecGraphError> {
        Ok(self.node(component_id)?.and_then(|n| n.file_path))
    }
}

fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok(NodeRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        source_file: row.get(4)?,
        source_anchor: row.get(5)?,
        intent: row.get(6)?,
        file_path: row.get(7)?,
        content_hash: row.get(8)?,
        raw_payload: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn row_to_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<EdgeRow> {
    Ok(EdgeRow {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        relation: row.get(2)?,
        metadata: row.get(3)?,
    })
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, SpecGraphError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
