//! Prose index: anchored-section extraction from the requirements document.
//!
//! Headings in the PRD carry trailing HTML-comment anchors of shape
//! `<!-- id: {node_id} -->`. Only heading lines are scanned; anchors
//! anywhere else are ignored. The comment is whitespace-tolerant.

use crate::core::error::SpecGraphError;
use crate::core::store::{NodeKind, Severity, ValidationIssue};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One occurrence of a node identifier on a prose heading.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub id: String,
    pub heading_level: u8,
    pub heading_text: String,
    /// Section span: heading start to the start of the next heading of the
    /// same or higher level (or end of document).
    pub byte_range: (usize, usize),
    /// Text of the enclosing H2 heading, if any. Used by the monitor's
    /// Design-Principles eligibility rule.
    pub parent_h2: Option<String>,
}

#[derive(Debug)]
struct Heading {
    level: u8,
    byte_start: usize,
    text: String,
    anchor_id: Option<String>,
}

/// Restartable index over all anchors of one prose document, in document
/// order.
#[derive(Debug)]
pub struct ProseIndex {
    pub doc_path: PathBuf,
    anchors: Vec<Anchor>,
    /// Ids anchored more than once; a violation of the single-definition
    /// rule for that id's prose intent.
    pub duplicates: Vec<String>,
}

fn anchored_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(#{1,6})\s+(.*?)\s*<!--\s*id:\s*([A-Za-z0-9_][A-Za-z0-9_.]*)\s*-->\s*$")
            .unwrap()
    })
}

fn bare_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*?)\s*$").unwrap())
}

impl ProseIndex {
    /// Parse the prose document at `path`. A missing document is a
    /// process-level error, not a per-file finding.
    pub fn parse(path: &Path) -> Result<ProseIndex, SpecGraphError> {
        if !path.exists() {
            return Err(SpecGraphError::NotFound(format!(
                "prose document {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(SpecGraphError::IoError)?;
        Ok(Self::from_content(&content, path))
    }

    /// Build the index from already-loaded document content.
    pub fn from_content(content: &str, doc_path: &Path) -> ProseIndex {
        let headings = scan_headings(content);

        let mut anchors = Vec::new();
        let mut duplicates = Vec::new();
        let mut current_h2: Option<String> = None;

        for (i, heading) in headings.iter().enumerate() {
            if heading.level == 2 {
                current_h2 = Some(heading.text.clone());
            }
            let Some(id) = &heading.anchor_id else {
                continue;
            };
            if anchors.iter().any(|a: &Anchor| &a.id == id) {
                if !duplicates.contains(id) {
                    duplicates.push(id.clone());
                }
                continue;
            }
            let end = headings[i + 1..]
                .iter()
                .find(|h| h.level <= heading.level)
                .map(|h| h.byte_start)
                .unwrap_or(content.len());
            anchors.push(Anchor {
                id: id.clone(),
                heading_level: heading.level,
                heading_text: heading.text.clone(),
                byte_range: (heading.byte_start, end),
                parent_h2: if heading.level > 2 {
                    current_h2.clone()
                } else {
                    None
                },
            });
        }

        ProseIndex {
            doc_path: doc_path.to_path_buf(),
            anchors,
            duplicates,
        }
    }

    /// All anchors in document order.
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn anchor(&self, id: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.id == id)
    }

    /// Infer the intended kind from an anchor id's prefix.
    pub fn anchor_kind(&self, id: &str) -> Option<NodeKind> {
        NodeKind::from_id(id)
    }

    /// Raw heading level for an anchored id, used to validate structural
    /// nesting.
    pub fn heading_level_for(&self, id: &str) -> Option<u8> {
        self.anchor(id).map(|a| a.heading_level)
    }

    /// Anchor string recorded on node rows, e.g. `PRD.md#feat_scan`.
    pub fn source_anchor(&self, id: &str) -> Option<String> {
        self.anchor(id).map(|_| {
            let doc = self
                .doc_path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| self.doc_path.to_string_lossy().to_string());
            format!("{}#{}", doc, id)
        })
    }
}

fn scan_headings(content: &str) -> Vec<Heading> {
    let anchored = anchored_heading_re();
    let bare = bare_heading_re();

    let mut headings = Vec::new();
    let mut offset = 0usize;
    let mut in_fence = false;

    for line in content.split_inclusive('\n') {
        let trimmed_end = line.trim_end_matches(['\n', '\r']);
        if trimmed_end.trim_start().starts_with("```") {
            in_fence = !in_fence;
        } else if !in_fence {
            if let Some(caps) = anchored.captures(trimmed_end) {
                headings.push(Heading {
                    level: caps[1].len() as u8,
                    byte_start: offset,
                    text: caps[2].to_string(),
                    anchor_id: Some(caps[3].to_string()),
                });
            } else if let Some(caps) = bare.captures(trimmed_end) {
                headings.push(Heading {
                    level: caps[1].len() as u8,
                    byte_start: offset,
                    text: caps[2].to_string(),
                    anchor_id: None,
                });
            }
        }
        offset += line.len();
    }
    headings
}

/// Structural checks over the prose document: duplicate anchors, unknown
/// prefixes, and heading-level nesting (Product and Domain at H2, Feature
/// at H3). Components are expected as bullets, never heading anchors.
pub fn validate_prd(index: &ProseIndex) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for id in &index.duplicates {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            field: Some(id.clone()),
            message: format!("anchor '{}' is defined more than once", id),
        });
    }

    for anchor in index.anchors() {
        match NodeKind::from_id(&anchor.id) {
            Some(NodeKind::Product) | Some(NodeKind::Domain) => {
                if anchor.heading_level != 2 {
                    issues.push(ValidationIssue {
                        severity: Severity::Error,
                        field: Some(anchor.id.clone()),
                        message: format!(
                            "anchor '{}' must sit on an H2 heading, found H{}",
                            anchor.id, anchor.heading_level
                        ),
                    });
                }
            }
            Some(NodeKind::Feature) => {
                if anchor.heading_level != 3 {
                    issues.push(ValidationIssue {
                        severity: Severity::Error,
                        field: Some(anchor.id.clone()),
                        message: format!(
                            "anchor '{}' must sit on an H3 heading, found H{}",
                            anchor.id, anchor.heading_level
                        ),
                    });
                }
            }
            Some(NodeKind::Component) => {
                issues.push(ValidationIssue {
                    severity: Severity::Warning,
                    field: Some(anchor.id.clone()),
                    message: format!(
                        "component '{}' is anchored on a heading; components belong in bullets",
                        anchor.id
                    ),
                });
            }
            Some(_) => {}
            None => {
                issues.push(ValidationIssue {
                    severity: Severity::Warning,
                    field: Some(anchor.id.clone()),
                    message: format!("anchor '{}' carries an unknown prefix", anchor.id),
                });
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# Product Spec

## Vision <!-- id: prod_demo -->

Some prose.

## Core Domain <!--  id:  dom_core  -->

### Feature: Scan <!-- id: feat_scan -->

- comp_scanner does the walking

### Feature: Report <!-- id: feat_report -->

## Design Principles

### Layering <!-- id: des_layering -->
";

    fn index() -> ProseIndex {
        ProseIndex::from_content(DOC, Path::new("PRD.md"))
    }

    #[test]
    fn test_anchor_extraction_in_document_order() {
        let idx = index();
        let ids: Vec<&str> = idx.anchors().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["prod_demo", "dom_core", "feat_scan", "feat_report", "des_layering"]
        );
    }

    #[test]
    fn test_whitespace_tolerant_anchor() {
        let idx = index();
        assert_eq!(idx.heading_level_for("dom_core"), Some(2));
    }

    #[test]
    fn test_anchor_kind_inference() {
        let idx = index();
        assert_eq!(idx.anchor_kind("feat_scan"), Some(NodeKind::Feature));
        assert_eq!(idx.anchor_kind("des_layering"), Some(NodeKind::Design));
    }

    #[test]
    fn test_parent_h2_tracking() {
        let idx = index();
        let anchor = idx.anchor("des_layering").unwrap();
        assert_eq!(anchor.parent_h2.as_deref(), Some("Design Principles"));
        let feat = idx.anchor("feat_scan").unwrap();
        assert_eq!(feat.parent_h2.as_deref(), Some("Core Domain"));
    }

    #[test]
    fn test_byte_range_spans_section() {
        let idx = index();
        let scan = idx.anchor("feat_scan").unwrap();
        let section = &DOC[scan.byte_range.0..scan.byte_range.1];
        assert!(section.contains("comp_scanner"));
        assert!(!section.contains("Feature: Report"));
    }

    #[test]
    fn test_anchors_inside_fences_ignored() {
        let doc = "## Real <!-- id: dom_real -->\n```\n## Fake <!-- id: dom_fake -->\n```\n";
        let idx = ProseIndex::from_content(doc, Path::new("PRD.md"));
        assert!(idx.anchor("dom_real").is_some());
        assert!(idx.anchor("dom_fake").is_none());
    }

    #[test]
    fn test_duplicate_anchor_reported() {
        let doc = "## A <!-- id: dom_a -->\n## A again <!-- id: dom_a -->\n";
        let idx = ProseIndex::from_content(doc, Path::new("PRD.md"));
        assert_eq!(idx.duplicates, vec!["dom_a"]);
        let issues = validate_prd(&idx);
        assert!(issues.iter().any(|i| i.severity == Severity::Error));
    }

    #[test]
    fn test_heading_level_rules() {
        let doc = "# Top <!-- id: dom_top -->\n### Deep <!-- id: prod_deep -->\n## F <!-- id: feat_f -->\n";
        let idx = ProseIndex::from_content(doc, Path::new("PRD.md"));
        let issues = validate_prd(&idx);
        assert_eq!(
            issues
                .iter()
                .filter(|i| i.severity == Severity::Error)
                .count(),
            3
        );
    }

    #[test]
    fn test_source_anchor_format() {
        let idx = index();
        assert_eq!(
            idx.source_anchor("feat_scan").as_deref(),
            Some("PRD.md#feat_scan")
        );
        assert_eq!(idx.source_anchor("feat_ghost"), None);
    }

    #[test]
    fn test_missing_document_is_process_error() {
        let err = ProseIndex::parse(Path::new("/nonexistent/PRD.md")).unwrap_err();
        assert!(matches!(err, SpecGraphError::NotFound(_)));
    }
}
