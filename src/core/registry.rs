//! Schema registry: the node grammar, loaded from the meta-schema node.
//!
//! One well-known file under the substrate directory (`sub_meta_schema`)
//! declares, for every node kind, the required and optional fields, field
//! type constraints, identifier prefix, and path pattern. The file is
//! itself exempt from schema validation: it is the grammar, not a sentence
//! in it.
//!
//! There is deliberately no fallback grammar. If this file is absent or
//! malformed, every downstream operation fails with
//! `MetaSchemaUnavailable` — otherwise the correctness of every validation
//! would be silently relaxed.

use crate::core::error::SpecGraphError;
use crate::core::store::{NodeKind, META_SCHEMA_ID};
use rustc_hash::FxHashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Field type constraints the grammar can impose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    List,
    Map,
}

impl FieldType {
    fn parse(value: &str) -> Option<FieldType> {
        match value {
            "text" => Some(FieldType::Text),
            "list" => Some(FieldType::List),
            "map" => Some(FieldType::Map),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::List => write!(f, "list"),
            FieldType::Map => write!(f, "map"),
        }
    }
}

/// Schema descriptor for one node kind.
#[derive(Debug, Clone)]
pub struct KindSchema {
    pub kind: NodeKind,
    pub prefix: String,
    pub path_pattern: String,
    pub required: Vec<String>,
    pub optional: Vec<String>,
    /// Per-field type constraints, sorted by field name so validation
    /// findings come out in a stable order.
    pub types: Vec<(String, FieldType)>,
}

/// Mapping from node kind to its schema descriptor.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    kinds: FxHashMap<NodeKind, KindSchema>,
}

impl SchemaRegistry {
    /// Well-known location of the grammar under a spec root.
    pub fn meta_schema_path(spec_root: &Path) -> PathBuf {
        spec_root
            .join("substrate")
            .join(format!("{}.yaml", META_SCHEMA_ID))
    }

    /// Load the registry from `{spec_root}/substrate/sub_meta_schema.yaml`.
    pub fn load(spec_root: &Path) -> Result<SchemaRegistry, SpecGraphError> {
        let path = Self::meta_schema_path(spec_root);
        let content = fs::read_to_string(&path).map_err(|e| {
            SpecGraphError::MetaSchemaUnavailable(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse the grammar document. Every failure mode maps to
    /// `MetaSchemaUnavailable` with a detail string.
    pub fn parse(content: &str) -> Result<SchemaRegistry, SpecGraphError> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| SpecGraphError::MetaSchemaUnavailable(e.to_string()))?;
        let root = value
            .as_mapping()
            .ok_or_else(|| malformed("document is not a mapping"))?;

        let id = str_entry(root, "id").ok_or_else(|| malformed("missing 'id'"))?;
        if id != META_SCHEMA_ID {
            return Err(malformed(&format!(
                "grammar id must be '{}', found '{}'",
                META_SCHEMA_ID, id
            )));
        }

        let kinds_map = root
            .get(serde_yaml::Value::from("kinds"))
            .and_then(|v| v.as_mapping())
            .ok_or_else(|| malformed("missing 'kinds' mapping"))?;

        let mut kinds = FxHashMap::default();
        for (key, entry) in kinds_map {
            let kind_name = key
                .as_str()
                .ok_or_else(|| malformed("kind names must be strings"))?;
            let kind = NodeKind::parse(kind_name)
                .ok_or_else(|| malformed(&format!("unknown kind '{}'", kind_name)))?;
            let entry = entry
                .as_mapping()
                .ok_or_else(|| malformed(&format!("kind '{}' is not a mapping", kind_name)))?;
            kinds.insert(kind, parse_kind_schema(kind, kind_name, entry)?);
        }

        for kind in NodeKind::all() {
            if !kinds.contains_key(kind) {
                return Err(malformed(&format!(
                    "grammar does not describe kind '{}'",
                    kind
                )));
            }
        }

        Ok(SchemaRegistry { kinds })
    }

    pub fn descriptor(&self, kind: NodeKind) -> Option<&KindSchema> {
        self.kinds.get(&kind)
    }
}

fn parse_kind_schema(
    kind: NodeKind,
    kind_name: &str,
    entry: &serde_yaml::Mapping,
) -> Result<KindSchema, SpecGraphError> {
    let prefix = str_entry(entry, "prefix")
        .ok_or_else(|| malformed(&format!("kind '{}' has no 'prefix'", kind_name)))?
        .to_string();
    let path_pattern = str_entry(entry, "path")
        .ok_or_else(|| malformed(&format!("kind '{}' has no 'path'", kind_name)))?
        .to_string();
    let required = str_list(entry, "required")
        .ok_or_else(|| malformed(&format!("kind '{}' has no 'required' list", kind_name)))?;
    let optional = str_list(entry, "optional").unwrap_or_default();

    let mut types = Vec::new();
    if let Some(type_map) = entry
        .get(serde_yaml::Value::from("types"))
        .and_then(|v| v.as_mapping())
    {
        for (field, ftype) in type_map {
            let field = field
                .as_str()
                .ok_or_else(|| malformed("type constraint keys must be strings"))?;
            let ftype_name = ftype.as_str().ok_or_else(|| {
                malformed(&format!("type constraint for '{}' must be a string", field))
            })?;
            let ftype = FieldType::parse(ftype_name).ok_or_else(|| {
                malformed(&format!(
                    "unknown field type '{}' for '{}'; expected text|list|map",
                    ftype_name, field
                ))
            })?;
            types.push((field.to_string(), ftype));
        }
    }
    types.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(KindSchema {
        kind,
        prefix,
        path_pattern,
        required,
        optional,
        types,
    })
}

fn malformed(detail: &str) -> SpecGraphError {
    SpecGraphError::MetaSchemaUnavailable(detail.to_string())
}

fn str_entry<'a>(map: &'a serde_yaml::Mapping, name: &str) -> Option<&'a str> {
    map.get(serde_yaml::Value::from(name)).and_then(|v| v.as_str())
}

fn str_list(map: &serde_yaml::Mapping, name: &str) -> Option<Vec<String>> {
    match map.get(serde_yaml::Value::from(name)) {
        Some(serde_yaml::Value::Sequence(seq)) => Some(
            seq.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAMMAR: &str = r#"
id: sub_meta_schema
type: substrate
kinds:
  product:
    prefix: prod_
    path: "product.yaml"
    required: [id, type, name, version, description, vision, domains]
    types:
      domains: list
  domain:
    prefix: dom_
    path: "product.yaml#domains"
    required: [id, name, description]
    optional: [exports, type]
  feature:
    prefix: feat_
    path: "features/feat_*.yaml"
    required: [id, type, domain, source_anchor, intent]
    optional: [user_stories, realized_by, depends_on, workflow, consumes]
    types:
      realized_by: list
      depends_on: list
  component:
    prefix: comp_
    path: "components/comp_*.yaml"
    required: [id, type, desc, file_path, design]
    optional: [tech_stack, dependencies]
    types:
      design: map
  design:
    prefix: des_
    path: "design/des_*.yaml"
    required: [id, type, desc]
    optional: [decision, alternatives]
  substrate:
    prefix: sub_
    path: "substrate/sub_*.yaml"
    required: [id, type, desc]
    optional: [kinds, version]
"#;

    #[test]
    fn test_parse_full_grammar() {
        let registry = SchemaRegistry::parse(GRAMMAR).unwrap();
        let feature = registry.descriptor(NodeKind::Feature).unwrap();
        assert_eq!(feature.prefix, "feat_");
        assert!(feature.required.contains(&"intent".to_string()));
        assert!(feature.optional.contains(&"realized_by".to_string()));
        assert_eq!(
            feature.types,
            vec![
                ("depends_on".to_string(), FieldType::List),
                ("realized_by".to_string(), FieldType::List),
            ]
        );
    }

    #[test]
    fn test_missing_kind_is_malformed() {
        let partial = r#"
id: sub_meta_schema
type: substrate
kinds:
  product:
    prefix: prod_
    path: "product.yaml"
    required: [id]
"#;
        let err = SchemaRegistry::parse(partial).unwrap_err();
        assert!(matches!(err, SpecGraphError::MetaSchemaUnavailable(_)));
    }

    #[test]
    fn test_wrong_id_is_malformed() {
        let wrong = GRAMMAR.replace("id: sub_meta_schema", "id: sub_other");
        assert!(SchemaRegistry::parse(&wrong).is_err());
    }

    #[test]
    fn test_unreadable_file_is_unavailable() {
        let err = SchemaRegistry::load(Path::new("/nonexistent")).unwrap_err();
        assert!(matches!(err, SpecGraphError::MetaSchemaUnavailable(_)));
    }

    #[test]
    fn test_bad_field_type_is_malformed() {
        let bad = GRAMMAR.replace("design: map", "design: tuple");
        assert!(SchemaRegistry::parse(&bad).is_err());
    }
}
