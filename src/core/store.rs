//! Node store: discovery, parsing, validation, and hashing of typed nodes.
//!
//! The store is the single source of truth for the spec graph. One YAML file
//! per node under a convention-rooted directory; the graph database is a
//! derived projection that can be destroyed and rebuilt from here at any
//! time.
//!
//! # For AI Agents
//!
//! - **Files are truth**: never edit the graph database directly; edit node
//!   files and re-run `specgraph sync`
//! - **Domains live inline**: Domain nodes are entries in `product.yaml`'s
//!   `domains[]`, surfaced here as synthetic documents
//! - **The meta-schema is exempt**: `sub_meta_schema` is the grammar, not a
//!   sentence in it; it is discovered but never validated against itself

use crate::core::error::SpecGraphError;
use crate::core::registry::{FieldType, SchemaRegistry};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Identifier of the meta-schema node, the one file exempt from validation.
pub const META_SCHEMA_ID: &str = "sub_meta_schema";

/// Typed node kinds. Prefix conventions are fixed by the data model; the
/// meta-schema restates them and the registry enforces the restatement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Product,
    Domain,
    Feature,
    Component,
    Design,
    Substrate,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Product => "product",
            NodeKind::Domain => "domain",
            NodeKind::Feature => "feature",
            NodeKind::Component => "component",
            NodeKind::Design => "design",
            NodeKind::Substrate => "substrate",
        }
    }

    pub fn parse(value: &str) -> Option<NodeKind> {
        match value {
            "product" => Some(NodeKind::Product),
            "domain" => Some(NodeKind::Domain),
            "feature" => Some(NodeKind::Feature),
            // Component files declare `type: module`.
            "component" | "module" => Some(NodeKind::Component),
            "design" => Some(NodeKind::Design),
            "substrate" => Some(NodeKind::Substrate),
            _ => None,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::Product => "prod_",
            NodeKind::Domain => "dom_",
            NodeKind::Feature => "feat_",
            NodeKind::Component => "comp_",
            NodeKind::Design => "des_",
            NodeKind::Substrate => "sub_",
        }
    }

    /// Infer the intended kind from an identifier's prefix.
    pub fn from_id(id: &str) -> Option<NodeKind> {
        NodeKind::all()
            .iter()
            .copied()
            .find(|k| id.starts_with(k.prefix()))
    }

    /// Directory holding this kind's files, relative to the spec root.
    /// Product sits at the root; domains have no files of their own.
    pub fn dir_name(&self) -> Option<&'static str> {
        match self {
            NodeKind::Product | NodeKind::Domain => None,
            NodeKind::Feature => Some("features"),
            NodeKind::Component => Some("components"),
            NodeKind::Design => Some("design"),
            NodeKind::Substrate => Some("substrate"),
        }
    }

    pub fn all() -> &'static [NodeKind] {
        &[
            NodeKind::Product,
            NodeKind::Domain,
            NodeKind::Feature,
            NodeKind::Component,
            NodeKind::Design,
            NodeKind::Substrate,
        ]
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a single validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// One validation finding for one node file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub field: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    fn error(field: Option<&str>, message: String) -> Self {
        ValidationIssue {
            severity: Severity::Error,
            field: field.map(|s| s.to_string()),
            message,
        }
    }

    fn warning(field: Option<&str>, message: String) -> Self {
        ValidationIssue {
            severity: Severity::Warning,
            field: field.map(|s| s.to_string()),
            message,
        }
    }
}

/// A node file that could not be parsed or read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub detail: String,
}

/// Parsed node document: identifier, kind, and the raw structured payload.
#[derive(Debug, Clone)]
pub struct NodeDoc {
    pub id: String,
    pub kind: NodeKind,
    pub raw: serde_yaml::Mapping,
}

impl NodeDoc {
    /// Parse a YAML document into a node. The document must be a mapping
    /// with string `id` and `type` fields.
    pub fn parse(content: &str, path: &str) -> Result<NodeDoc, SpecGraphError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| SpecGraphError::ParseFailure {
                path: path.to_string(),
                detail: e.to_string(),
            })?;
        let mapping = value
            .as_mapping()
            .ok_or_else(|| SpecGraphError::ParseFailure {
                path: path.to_string(),
                detail: "document is not a mapping".to_string(),
            })?
            .clone();
        NodeDoc::from_mapping(mapping, path)
    }

    pub fn from_mapping(raw: serde_yaml::Mapping, path: &str) -> Result<NodeDoc, SpecGraphError> {
        let id = mapping_str(&raw, "id")
            .ok_or_else(|| SpecGraphError::ParseFailure {
                path: path.to_string(),
                detail: "missing string field 'id'".to_string(),
            })?
            .to_string();
        let type_str = mapping_str(&raw, "type").ok_or_else(|| SpecGraphError::ParseFailure {
            path: path.to_string(),
            detail: "missing string field 'type'".to_string(),
        })?;
        let kind = NodeKind::parse(type_str).ok_or_else(|| SpecGraphError::ParseFailure {
            path: path.to_string(),
            detail: format!("unknown node type '{}'", type_str),
        })?;
        Ok(NodeDoc { id, kind, raw })
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        mapping_str(&self.raw, name)
    }

    /// String items of a sequence field; absent or non-sequence yields empty.
    pub fn list_field(&self, name: &str) -> Vec<String> {
        match self.raw.get(serde_yaml::Value::from(name)) {
            Some(serde_yaml::Value::Sequence(seq)) => seq
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn map_field(&self, name: &str) -> Option<&serde_yaml::Mapping> {
        self.raw
            .get(serde_yaml::Value::from(name))
            .and_then(|v| v.as_mapping())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.raw.contains_key(serde_yaml::Value::from(name))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.raw
            .keys()
            .filter_map(|k| k.as_str().map(|s| s.to_string()))
            .collect()
    }

    /// Canonical content hash of the parsed payload. Stable under
    /// whitespace-only reformatting of the file.
    pub fn content_hash(&self) -> String {
        canonical_hash(&serde_yaml::Value::Mapping(self.raw.clone()))
    }

    /// Canonical JSON rendering of the payload, used as `raw_payload` in
    /// the graph database.
    pub fn canonical_payload(&self) -> String {
        canonical_json(&serde_yaml::Value::Mapping(self.raw.clone())).to_string()
    }
}

fn mapping_str<'a>(raw: &'a serde_yaml::Mapping, name: &str) -> Option<&'a str> {
    raw.get(serde_yaml::Value::from(name)).and_then(|v| v.as_str())
}

/// A discovered node: its path, parsed document, and content hash.
#[derive(Debug, Clone)]
pub struct NodeFile {
    pub path: PathBuf,
    pub doc: NodeDoc,
    pub content_hash: String,
    /// The grammar file itself (`sub_meta_schema`); exempt from validation.
    pub is_meta_schema: bool,
    /// Synthetic Domain document lifted out of `product.yaml`'s `domains[]`.
    pub synthetic: bool,
}

/// Result of one store walk: parsed files plus per-file failures.
#[derive(Debug, Default)]
pub struct StoreScan {
    pub files: Vec<NodeFile>,
    pub failures: Vec<FileFailure>,
}

impl StoreScan {
    pub fn files_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &NodeFile> {
        self.files.iter().filter(move |f| f.doc.kind == kind)
    }

    pub fn find(&self, id: &str) -> Option<&NodeFile> {
        self.files.iter().find(|f| f.doc.id == id)
    }
}

/// Cross-reference sets consulted by per-file validation.
#[derive(Debug, Default)]
pub struct ValidationContext {
    pub domain_ids: FxHashSet<String>,
    pub node_ids: FxHashSet<String>,
    pub component_ids: FxHashSet<String>,
}

impl ValidationContext {
    pub fn from_scan(scan: &StoreScan) -> Self {
        let mut ctx = ValidationContext::default();
        for file in &scan.files {
            ctx.node_ids.insert(file.doc.id.clone());
            match file.doc.kind {
                NodeKind::Domain => {
                    ctx.domain_ids.insert(file.doc.id.clone());
                }
                NodeKind::Component => {
                    ctx.component_ids.insert(file.doc.id.clone());
                }
                _ => {}
            }
        }
        ctx
    }
}

/// Filesystem-backed collection of typed nodes.
#[derive(Debug, Clone)]
pub struct NodeStore {
    root: PathBuf,
}

impl NodeStore {
    pub fn new(spec_root: &Path) -> Self {
        NodeStore {
            root: spec_root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the store, parsing every node file. Rereads the filesystem on
    /// each call; results are sorted by kind directory then file name so a
    /// scan of a frozen snapshot is always identical.
    pub fn iterate(&self, kind: Option<NodeKind>) -> StoreScan {
        let mut scan = StoreScan::default();

        self.read_product(&mut scan);
        for dir in ["features", "components", "design", "substrate"] {
            self.read_dir_nodes(dir, &mut scan);
        }

        if let Some(kind) = kind {
            scan.files.retain(|f| f.doc.kind == kind);
        }
        scan
    }

    /// Single-node read by identifier.
    pub fn load(&self, id: &str) -> Result<NodeFile, SpecGraphError> {
        let scan = self.iterate(None);
        scan.files
            .into_iter()
            .find(|f| f.doc.id == id)
            .ok_or_else(|| SpecGraphError::NotFound(format!("node '{}'", id)))
    }

    /// Canonical content hash of a node file on disk.
    pub fn hash(&self, path: &Path) -> Result<String, SpecGraphError> {
        let content = fs::read_to_string(path).map_err(SpecGraphError::IoError)?;
        let value: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| SpecGraphError::ParseFailure {
                path: path.to_string_lossy().to_string(),
                detail: e.to_string(),
            })?;
        Ok(canonical_hash(&value))
    }

    fn read_product(&self, scan: &mut StoreScan) {
        let path = self.root.join("product.yaml");
        if !path.exists() {
            return;
        }
        let file = match self.read_node_file(&path) {
            Ok(f) => f,
            Err(e) => {
                scan.failures.push(FileFailure {
                    path: path.to_string_lossy().to_string(),
                    detail: e.to_string(),
                });
                return;
            }
        };

        // Lift inline domains out of the product payload before pushing the
        // product itself, keeping kind grouping stable.
        let mut domains = Vec::new();
        if let Some(serde_yaml::Value::Sequence(seq)) =
            file.doc.raw.get(serde_yaml::Value::from("domains"))
        {
            for entry in seq {
                let Some(mapping) = entry.as_mapping() else {
                    continue;
                };
                let mut raw = mapping.clone();
                raw.entry(serde_yaml::Value::from("type"))
                    .or_insert(serde_yaml::Value::from("domain"));
                match NodeDoc::from_mapping(raw, &path.to_string_lossy()) {
                    Ok(doc) if doc.kind == NodeKind::Domain => {
                        let content_hash = doc.content_hash();
                        domains.push(NodeFile {
                            path: path.clone(),
                            doc,
                            content_hash,
                            is_meta_schema: false,
                            synthetic: true,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => scan.failures.push(FileFailure {
                        path: path.to_string_lossy().to_string(),
                        detail: e.to_string(),
                    }),
                }
            }
        }
        domains.sort_by(|a, b| a.doc.id.cmp(&b.doc.id));

        scan.files.push(file);
        scan.files.extend(domains);
    }

    fn read_dir_nodes(&self, dir: &str, scan: &mut StoreScan) {
        let dir_path = self.root.join(dir);
        if !dir_path.is_dir() {
            return;
        }
        let mut paths: Vec<PathBuf> = match fs::read_dir(&dir_path) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .and_then(|e| e.to_str())
                            .is_some_and(|e| e == "yaml" || e == "yml")
                })
                .collect(),
            Err(e) => {
                scan.failures.push(FileFailure {
                    path: dir_path.to_string_lossy().to_string(),
                    detail: e.to_string(),
                });
                return;
            }
        };
        paths.sort();

        for path in paths {
            match self.read_node_file(&path) {
                Ok(file) => scan.files.push(file),
                Err(e) => scan.failures.push(FileFailure {
                    path: path.to_string_lossy().to_string(),
                    detail: e.to_string(),
                }),
            }
        }
    }

    fn read_node_file(&self, path: &Path) -> Result<NodeFile, SpecGraphError> {
        let content = fs::read_to_string(path).map_err(SpecGraphError::IoError)?;
        let doc = NodeDoc::parse(&content, &path.to_string_lossy())?;
        let content_hash = doc.content_hash();
        let is_meta_schema = doc.id == META_SCHEMA_ID;
        Ok(NodeFile {
            path: path.to_path_buf(),
            doc,
            content_hash,
            is_meta_schema,
            synthetic: false,
        })
    }

    /// Validate a node against the registry and cross-reference context.
    ///
    /// Missing required field, type mismatch, prefix/file-name disagreement,
    /// self-reference, or an undefined `domain` are errors; unknown fields,
    /// dangling `realized_by`/`depends_on`/`consumes` targets, and path
    /// convention deviations are warnings. The meta-schema is exempt.
    pub fn validate(
        &self,
        file: &NodeFile,
        registry: &SchemaRegistry,
        ctx: &ValidationContext,
    ) -> Vec<ValidationIssue> {
        if file.is_meta_schema {
            return Vec::new();
        }
        let mut issues = Vec::new();
        let doc = &file.doc;
        let schema = match registry.descriptor(doc.kind) {
            Some(s) => s,
            None => {
                issues.push(ValidationIssue::error(
                    Some("type"),
                    format!("no schema descriptor for kind '{}'", doc.kind),
                ));
                return issues;
            }
        };

        if !doc.id.starts_with(&schema.prefix) {
            issues.push(ValidationIssue::error(
                Some("id"),
                format!(
                    "identifier '{}' does not carry the '{}' prefix required for {} nodes",
                    doc.id, schema.prefix, doc.kind
                ),
            ));
        }

        if !file.synthetic && doc.kind != NodeKind::Product {
            let stem = file
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("");
            if stem != doc.id {
                issues.push(ValidationIssue::error(
                    Some("id"),
                    format!("identifier '{}' does not match file name '{}'", doc.id, stem),
                ));
            }
            if let Some(expected_dir) = doc.kind.dir_name() {
                let parent = file
                    .path
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|s| s.to_str())
                    .unwrap_or("");
                if parent != expected_dir {
                    issues.push(ValidationIssue::warning(
                        None,
                        format!(
                            "{} node '{}' expected under {}/, found under {}/",
                            doc.kind, doc.id, expected_dir, parent
                        ),
                    ));
                }
            }
        }

        for field in &schema.required {
            if !doc.has_field(field) {
                issues.push(ValidationIssue::error(
                    Some(field.as_str()),
                    format!("required field '{}' is missing", field),
                ));
            }
        }

        for name in doc.field_names() {
            if !schema.required.contains(&name) && !schema.optional.contains(&name) {
                issues.push(ValidationIssue::warning(
                    Some(name.as_str()),
                    format!("unknown field '{}' for kind '{}'", name, doc.kind),
                ));
            }
        }

        for (field, ftype) in &schema.types {
            let Some(value) = doc.raw.get(serde_yaml::Value::from(field.as_str())) else {
                continue;
            };
            let ok = match ftype {
                FieldType::Text => value.as_str().is_some(),
                FieldType::List => value.is_sequence(),
                FieldType::Map => value.is_mapping(),
            };
            if !ok {
                issues.push(ValidationIssue::error(
                    Some(field.as_str()),
                    format!("field '{}' must be a {}", field, ftype),
                ));
            }
        }

        for field in ["depends_on", "realized_by", "dependencies", "consumes"] {
            if doc.list_field(field).iter().any(|t| t == &doc.id) {
                issues.push(ValidationIssue::error(
                    Some(field),
                    format!("'{}' lists the node itself", field),
                ));
            }
        }

        match doc.kind {
            NodeKind::Feature => self.validate_feature(doc, ctx, &mut issues),
            NodeKind::Component => self.validate_component(doc, ctx, &mut issues),
            _ => {}
        }

        issues
    }

    fn validate_feature(
        &self,
        doc: &NodeDoc,
        ctx: &ValidationContext,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if let Some(domain) = doc.str_field("domain") {
            if !ctx.domain_ids.contains(domain) {
                issues.push(ValidationIssue::error(
                    Some("domain"),
                    format!("domain '{}' is not defined in the product file", domain),
                ));
            }
        }
        for target in doc.list_field("realized_by") {
            if !ctx.component_ids.contains(&target) {
                issues.push(ValidationIssue::warning(
                    Some("realized_by"),
                    format!("component '{}' has no node file", target),
                ));
            }
        }
        for target in doc.list_field("depends_on") {
            if target != doc.id && !ctx.node_ids.contains(&target) {
                issues.push(ValidationIssue::warning(
                    Some("depends_on"),
                    format!("dependency '{}' does not exist", target),
                ));
            }
        }
        for api in doc.list_field("consumes") {
            let domain = api.split('.').next().unwrap_or("");
            if !ctx.domain_ids.contains(domain) {
                issues.push(ValidationIssue::warning(
                    Some("consumes"),
                    format!("consumed API '{}' names an unknown domain", api),
                ));
            }
        }
    }

    fn validate_component(
        &self,
        doc: &NodeDoc,
        ctx: &ValidationContext,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if let Some(file_path) = doc.str_field("file_path") {
            let dir_like = file_path.ends_with('/');
            let file_like = file_path
                .rsplit('/')
                .next()
                .is_some_and(|leaf| leaf.contains('.'));
            if !dir_like && !file_like {
                issues.push(ValidationIssue::error(
                    Some("file_path"),
                    format!(
                        "'{}' is neither file-like nor a directory path ending in '/'",
                        file_path
                    ),
                ));
            }
        }
        match doc.map_field("design") {
            Some(design) => {
                for part in ["api", "logic"] {
                    if !design.contains_key(serde_yaml::Value::from(part)) {
                        issues.push(ValidationIssue::error(
                            Some("design"),
                            format!("design.{} is required on components", part),
                        ));
                    }
                }
            }
            None => {
                if doc.has_field("design") {
                    issues.push(ValidationIssue::error(
                        Some("design"),
                        "field 'design' must be a map".to_string(),
                    ));
                }
                // Missing 'design' entirely is reported by the required-field pass.
            }
        }
        for target in doc.list_field("dependencies") {
            if target != doc.id && !ctx.node_ids.contains(&target) {
                issues.push(ValidationIssue::warning(
                    Some("dependencies"),
                    format!("dependency '{}' does not exist", target),
                ));
            }
        }
    }
}

/// Convert a parsed YAML value into canonical JSON: object keys sorted,
/// scalars carried through. Non-string mapping keys are stringified.
pub fn canonical_json(value: &serde_yaml::Value) -> serde_json::Value {
    match value {
        serde_yaml::Value::Null => serde_json::Value::Null,
        serde_yaml::Value::Bool(b) => serde_json::Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                serde_json::Value::from(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_yaml::Value::String(s) => serde_json::Value::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => {
            serde_json::Value::Array(seq.iter().map(canonical_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            // serde_json's default map is ordered by key, which gives the
            // canonical encoding its stability.
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => format!("{:?}", other),
                };
                out.insert(key, canonical_json(v));
            }
            serde_json::Value::Object(out)
        }
        serde_yaml::Value::Tagged(tagged) => canonical_json(&tagged.value),
    }
}

/// SHA-256 over the canonical JSON encoding, hex-encoded.
pub fn canonical_hash(value: &serde_yaml::Value) -> String {
    let canonical = canonical_json(value).to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_prefix_round_trip() {
        for kind in NodeKind::all() {
            let id = format!("{}example", kind.prefix());
            assert_eq!(NodeKind::from_id(&id), Some(*kind));
        }
        assert_eq!(NodeKind::from_id("unknown_x"), None);
    }

    #[test]
    fn test_module_type_maps_to_component() {
        let doc = NodeDoc::parse("id: comp_x\ntype: module\n", "comp_x.yaml").unwrap();
        assert_eq!(doc.kind, NodeKind::Component);
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        let err = NodeDoc::parse("- a\n- b\n", "list.yaml").unwrap_err();
        assert!(matches!(err, SpecGraphError::ParseFailure { .. }));
    }

    #[test]
    fn test_hash_stable_under_reformat() {
        let a = NodeDoc::parse("id: feat_x\ntype: feature\nintent: scan files\n", "f").unwrap();
        let b = NodeDoc::parse(
            "intent:   scan files\n\nid:    feat_x\ntype: feature\n",
            "f",
        )
        .unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_hash_sensitive_to_semantic_change() {
        let a = NodeDoc::parse("id: feat_x\ntype: feature\nintent: scan\n", "f").unwrap();
        let b = NodeDoc::parse("id: feat_x\ntype: feature\nintent: index\n", "f").unwrap();
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value: serde_yaml::Value = serde_yaml::from_str("b: 2\na: 1\n").unwrap();
        assert_eq!(canonical_json(&value).to_string(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_list_field_ignores_non_strings() {
        let doc = NodeDoc::parse(
            "id: feat_x\ntype: feature\ndepends_on: [feat_a, 3, feat_b]\n",
            "f",
        )
        .unwrap();
        assert_eq!(doc.list_field("depends_on"), vec!["feat_a", "feat_b"]);
    }

    fn write_fixture(root: &Path) {
        std::fs::write(
            root.join("product.yaml"),
            "id: prod_p\ntype: product\nname: P\nversion: 0.1.0\ndescription: d\nvision: v\ndomains:\n  - id: dom_a\n    name: A\n    description: a\n",
        )
        .unwrap();
        std::fs::create_dir_all(root.join("features")).unwrap();
        std::fs::write(
            root.join("features/feat_x.yaml"),
            "id: feat_x\ntype: feature\ndomain: dom_a\nsource_anchor: \"PRD.md#feat_x\"\nintent: do x\n",
        )
        .unwrap();
    }

    #[test]
    fn test_iterate_surfaces_inline_domains() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        let store = NodeStore::new(tmp.path());

        let scan = store.iterate(None);
        assert!(scan.failures.is_empty());
        let ids: Vec<&str> = scan.files.iter().map(|f| f.doc.id.as_str()).collect();
        assert_eq!(ids, vec!["prod_p", "dom_a", "feat_x"]);
        let domain = scan.find("dom_a").unwrap();
        assert!(domain.synthetic);
        assert!(domain.path.ends_with("product.yaml"));

        let features = store.iterate(Some(NodeKind::Feature));
        assert_eq!(features.files.len(), 1);
    }

    #[test]
    fn test_load_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        let store = NodeStore::new(tmp.path());

        let file = store.load("feat_x").unwrap();
        assert_eq!(file.doc.kind, NodeKind::Feature);
        assert!(matches!(
            store.load("feat_missing"),
            Err(SpecGraphError::NotFound(_))
        ));
    }

    #[test]
    fn test_hash_matches_parsed_document() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        let store = NodeStore::new(tmp.path());

        let file = store.load("feat_x").unwrap();
        assert_eq!(store.hash(&file.path).unwrap(), file.content_hash);
    }

    #[test]
    fn test_validate_self_reference_is_error() {
        let registry = crate::core::registry::SchemaRegistry::parse(
            crate::core::assets::TEMPLATE_META_SCHEMA,
        )
        .unwrap();
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        std::fs::write(
            tmp.path().join("features/feat_loop.yaml"),
            "id: feat_loop\ntype: feature\ndomain: dom_a\nsource_anchor: \"PRD.md#feat_loop\"\nintent: loops\ndepends_on:\n  - feat_loop\n",
        )
        .unwrap();
        let store = NodeStore::new(tmp.path());
        let scan = store.iterate(None);
        let ctx = ValidationContext::from_scan(&scan);
        let file = scan.find("feat_loop").unwrap();

        let issues = store.validate(file, &registry, &ctx);
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("itself")));
    }

    #[test]
    fn test_validate_unknown_field_is_warning() {
        let registry = crate::core::registry::SchemaRegistry::parse(
            crate::core::assets::TEMPLATE_META_SCHEMA,
        )
        .unwrap();
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        std::fs::write(
            tmp.path().join("features/feat_y.yaml"),
            "id: feat_y\ntype: feature\ndomain: dom_a\nsource_anchor: \"PRD.md#feat_y\"\nintent: y\ncolour: blue\n",
        )
        .unwrap();
        let store = NodeStore::new(tmp.path());
        let scan = store.iterate(None);
        let ctx = ValidationContext::from_scan(&scan);
        let file = scan.find("feat_y").unwrap();

        let issues = store.validate(file, &registry, &ctx);
        assert!(issues
            .iter()
            .all(|i| i.severity == Severity::Warning));
        assert!(issues.iter().any(|i| i.message.contains("colour")));
    }
}
