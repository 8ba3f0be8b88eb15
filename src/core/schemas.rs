// src/core/schemas.rs
// Centralized database schema definitions for the graph database.

pub const GRAPH_DB_NAME: &str = "specgraph.db";
pub const RUNTIME_DIR_NAME: &str = ".runtime";

/// Bumped whenever the DDL below changes shape. A mismatch at open time
/// triggers a full drop-and-recreate: the database is derived state and is
/// never migrated in place.
pub const GRAPH_SCHEMA_VERSION: u32 = 1;

pub const GRAPH_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const GRAPH_DB_SCHEMA_NODES: &str = "
    CREATE TABLE IF NOT EXISTS nodes (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        source_file TEXT NOT NULL DEFAULT '',
        source_anchor TEXT,
        intent TEXT,
        file_path TEXT,
        content_hash TEXT NOT NULL DEFAULT '',
        raw_payload TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const GRAPH_DB_SCHEMA_EDGES: &str = "
    CREATE TABLE IF NOT EXISTS edges (
        source_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
        target_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
        relation TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}',
        UNIQUE(source_id, target_id, relation)
    )
";

pub const GRAPH_DB_SCHEMA_DOMAIN_APIS: &str = "
    CREATE TABLE IF NOT EXISTS domain_apis (
        id TEXT PRIMARY KEY,
        domain_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        signature TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        input_schema TEXT NOT NULL DEFAULT '{}',
        output_schema TEXT NOT NULL DEFAULT '{}'
    )
";

pub const GRAPH_DB_INDEX_NODES_KIND: &str =
    "CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind)";
pub const GRAPH_DB_INDEX_NODES_SOURCE: &str =
    "CREATE INDEX IF NOT EXISTS idx_nodes_source ON nodes(source_file)";
pub const GRAPH_DB_INDEX_NODES_FILE_PATH: &str =
    "CREATE INDEX IF NOT EXISTS idx_nodes_file_path ON nodes(file_path)";
pub const GRAPH_DB_INDEX_EDGES_SOURCE: &str =
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id)";
pub const GRAPH_DB_INDEX_EDGES_TARGET: &str =
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id)";
pub const GRAPH_DB_INDEX_EDGES_RELATION: &str =
    "CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation)";
pub const GRAPH_DB_INDEX_APIS_DOMAIN: &str =
    "CREATE INDEX IF NOT EXISTS idx_domain_apis_domain ON domain_apis(domain_id)";

/// All DDL statements in creation order.
pub const GRAPH_DB_DDL: &[&str] = &[
    GRAPH_DB_SCHEMA_META,
    GRAPH_DB_SCHEMA_NODES,
    GRAPH_DB_SCHEMA_EDGES,
    GRAPH_DB_SCHEMA_DOMAIN_APIS,
    GRAPH_DB_INDEX_NODES_KIND,
    GRAPH_DB_INDEX_NODES_SOURCE,
    GRAPH_DB_INDEX_NODES_FILE_PATH,
    GRAPH_DB_INDEX_EDGES_SOURCE,
    GRAPH_DB_INDEX_EDGES_TARGET,
    GRAPH_DB_INDEX_EDGES_RELATION,
    GRAPH_DB_INDEX_APIS_DOMAIN,
];

/// Tables dropped on schema-version mismatch, dependents first.
pub const GRAPH_DB_TABLES: &[&str] = &["domain_apis", "edges", "nodes", "meta"];
