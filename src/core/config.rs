//! Workspace path resolution.
//!
//! A workspace ties together the three inputs the core reads (spec root,
//! PRD document, meta-schema under the spec root) and the one output it
//! owns (the runtime directory holding the graph database).
//!
//! An optional `specgraph.toml` at the project root overrides the default
//! layout:
//!
//! ```toml
//! [paths]
//! spec_root = "spec"
//! prd = "PRD.md"
//! runtime_dir = "spec/.runtime"
//! ```
//!
//! No config file means the defaults apply; a malformed config file is a
//! hard error rather than a silent fallback.

use crate::core::error::SpecGraphError;
use crate::core::schemas;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "specgraph.toml";

const DEFAULT_SPEC_ROOT: &str = "spec";
const DEFAULT_PRD: &str = "PRD.md";

/// Resolved workspace paths. All core entry points take a `&Workspace`.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Project root (the directory holding `specgraph.toml` and `PRD.md`).
    pub project_root: PathBuf,
    /// Spec root: `product.yaml`, `features/`, `components/`, `design/`, `substrate/`.
    pub spec_root: PathBuf,
    /// The prose requirements document.
    pub prd_path: PathBuf,
    /// Runtime directory for derived state; expected to be ignored by VCS.
    pub runtime_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    paths: PathsSection,
}

#[derive(Debug, Default, Deserialize)]
struct PathsSection {
    spec_root: Option<String>,
    prd: Option<String>,
    runtime_dir: Option<String>,
}

impl Workspace {
    /// Resolve a workspace rooted at `project_root`, honoring an optional
    /// `specgraph.toml` next to it.
    pub fn discover(project_root: &Path) -> Result<Self, SpecGraphError> {
        let config_path = project_root.join(CONFIG_FILE_NAME);
        let config: ConfigFile = if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(SpecGraphError::IoError)?;
            toml::from_str(&content).map_err(|e| {
                SpecGraphError::ValidationError(format!(
                    "Malformed {}: {}",
                    CONFIG_FILE_NAME, e
                ))
            })?
        } else {
            ConfigFile::default()
        };

        let spec_root = project_root.join(
            config
                .paths
                .spec_root
                .as_deref()
                .unwrap_or(DEFAULT_SPEC_ROOT),
        );
        let prd_path =
            project_root.join(config.paths.prd.as_deref().unwrap_or(DEFAULT_PRD));
        let runtime_dir = match config.paths.runtime_dir.as_deref() {
            Some(dir) => project_root.join(dir),
            None => spec_root.join(schemas::RUNTIME_DIR_NAME),
        };

        Ok(Workspace {
            project_root: project_root.to_path_buf(),
            spec_root,
            prd_path,
            runtime_dir,
        })
    }

    /// Path of the SQLite graph database inside the runtime directory.
    pub fn graph_db_path(&self) -> PathBuf {
        self.runtime_dir.join(schemas::GRAPH_DB_NAME)
    }

    /// Display-friendly path of a node file relative to the project root.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_config() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::discover(tmp.path()).unwrap();
        assert_eq!(ws.spec_root, tmp.path().join("spec"));
        assert_eq!(ws.prd_path, tmp.path().join("PRD.md"));
        assert_eq!(ws.runtime_dir, tmp.path().join("spec").join(".runtime"));
        assert!(ws.graph_db_path().ends_with(".runtime/specgraph.db"));
    }

    #[test]
    fn test_config_overrides() {
        let tmp = tempdir().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[paths]\nspec_root = \"blueprint\"\nprd = \"docs/REQ.md\"\n",
        )
        .unwrap();
        let ws = Workspace::discover(tmp.path()).unwrap();
        assert_eq!(ws.spec_root, tmp.path().join("blueprint"));
        assert_eq!(ws.prd_path, tmp.path().join("docs/REQ.md"));
        assert_eq!(ws.runtime_dir, tmp.path().join("blueprint").join(".runtime"));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "[paths\nbroken").unwrap();
        assert!(Workspace::discover(tmp.path()).is_err());
    }
}
