//! Workspace scaffolding for `specgraph init`.
//!
//! Writes a starter spec root from embedded templates: the meta-schema
//! grammar, a product file with one domain, one example feature, a PRD
//! skeleton with matching anchors, and a VCS-ignored runtime directory.
//! Existing files are never overwritten unless `force` is set.

use crate::core::assets;
use crate::core::config::Workspace;
use crate::core::error::SpecGraphError;
use crate::core::registry::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ScaffoldOptions {
    /// Overwrite files that already exist.
    pub force: bool,
}

/// What `init` actually did, path by path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaffoldReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// Scaffold a starter workspace. Returns the list of created and skipped
/// paths, project-relative.
pub fn scaffold_workspace(
    ws: &Workspace,
    options: &ScaffoldOptions,
) -> Result<ScaffoldReport, SpecGraphError> {
    let mut report = ScaffoldReport::default();

    for dir in ["features", "components", "design", "substrate"] {
        fs::create_dir_all(ws.spec_root.join(dir)).map_err(SpecGraphError::IoError)?;
    }
    fs::create_dir_all(&ws.runtime_dir).map_err(SpecGraphError::IoError)?;

    let meta_schema = SchemaRegistry::meta_schema_path(&ws.spec_root);
    write_template(ws, &meta_schema, assets::TEMPLATE_META_SCHEMA, options, &mut report)?;
    write_template(
        ws,
        &ws.spec_root.join("product.yaml"),
        assets::TEMPLATE_PRODUCT,
        options,
        &mut report,
    )?;
    write_template(
        ws,
        &ws.spec_root.join("features").join("feat_example.yaml"),
        assets::TEMPLATE_FEATURE,
        options,
        &mut report,
    )?;
    write_template(ws, &ws.prd_path, assets::TEMPLATE_PRD, options, &mut report)?;
    write_template(
        ws,
        &ws.runtime_dir.join(".gitignore"),
        assets::RUNTIME_GITIGNORE,
        options,
        &mut report,
    )?;

    Ok(report)
}

fn write_template(
    ws: &Workspace,
    path: &Path,
    content: &str,
    options: &ScaffoldOptions,
    report: &mut ScaffoldReport,
) -> Result<(), SpecGraphError> {
    let display = ws.relative(path);
    if path.exists() && !options.force {
        report.skipped.push(display);
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(SpecGraphError::IoError)?;
    }
    fs::write(path, content).map_err(SpecGraphError::IoError)?;
    report.created.push(display);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scaffold_creates_starter_workspace() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::discover(tmp.path()).unwrap();
        let report = scaffold_workspace(&ws, &ScaffoldOptions::default()).unwrap();

        assert!(ws.spec_root.join("product.yaml").exists());
        assert!(SchemaRegistry::meta_schema_path(&ws.spec_root).exists());
        assert!(ws.prd_path.exists());
        assert!(ws.runtime_dir.join(".gitignore").exists());
        assert!(report.skipped.is_empty());
        assert!(report.created.len() >= 5);

        // The scaffolded grammar must load.
        SchemaRegistry::load(&ws.spec_root).unwrap();
    }

    #[test]
    fn test_scaffold_never_clobbers_without_force() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::discover(tmp.path()).unwrap();
        fs::create_dir_all(&ws.spec_root).unwrap();
        fs::write(ws.spec_root.join("product.yaml"), "id: prod_mine\n").unwrap();

        let report = scaffold_workspace(&ws, &ScaffoldOptions::default()).unwrap();
        assert!(report.skipped.iter().any(|p| p.ends_with("product.yaml")));
        let content = fs::read_to_string(ws.spec_root.join("product.yaml")).unwrap();
        assert_eq!(content, "id: prod_mine\n");

        let report = scaffold_workspace(&ws, &ScaffoldOptions { force: true }).unwrap();
        assert!(report.created.iter().any(|p| p.ends_with("product.yaml")));
    }
}
