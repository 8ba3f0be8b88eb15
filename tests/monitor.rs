mod common;

use common::{setup_workspace, write_spec_file, PRD};
use specgraph::core::error::SpecGraphError;
use specgraph::core::monitor::{run_monitor, Assignment, SyncStatus};
use std::fs;
use tempfile::tempdir;

#[test]
fn happy_run_scores_one_hundred_percent_everywhere() {
    let tmp = tempdir().unwrap();
    let ws = setup_workspace(tmp.path());

    let report = run_monitor(&ws).expect("monitor run");
    assert!(!report.has_errors());

    // product + feature + component files; the meta-schema is never counted.
    assert_eq!(report.schema.passed, 3);
    assert_eq!(report.schema.total, 3);
    assert_eq!(report.schema.score, 1.0);

    // feat_scan anchored + defined; comp_scanner realized by feat_scan.
    assert_eq!(report.sync.passed, 2);
    assert_eq!(report.sync.total, 2);
    assert_eq!(report.sync.score, 1.0);

    assert_eq!(report.assignment.passed, 1);
    assert_eq!(report.assignment.total, 1);

    assert!((report.overall - 1.0).abs() < f64::EPSILON);
}

#[test]
fn intent_spec_drift_classifies_orphans_both_ways() {
    let tmp = tempdir().unwrap();
    let ws = setup_workspace(tmp.path());

    // A node file without prose intent behind it.
    write_spec_file(
        &ws,
        "features/feat_orphan.yaml",
        r#"id: feat_orphan
type: feature
domain: dom_core
source_anchor: "PRD.md#feat_orphan"
intent: Exists only in YAML.
"#,
    );
    // A prose anchor without a node definition behind it.
    let prd = PRD.replace(
        "## CLI <!-- id: dom_cli -->",
        "### Feature: Ghost <!-- id: feat_ghost -->\n\n## CLI <!-- id: dom_cli -->",
    );
    fs::write(&ws.prd_path, prd).unwrap();

    let report = run_monitor(&ws).unwrap();
    assert!(report.has_errors());

    assert_eq!(report.sync.passed, 2);
    assert_eq!(report.sync.total, 4);
    assert!((report.sync.score - 0.5).abs() < f64::EPSILON);

    let orphan = report
        .features
        .iter()
        .find(|f| f.id == "feat_orphan")
        .expect("feat_orphan row");
    assert_eq!(orphan.sync, SyncStatus::YamlOnly);

    let ghost = report
        .features
        .iter()
        .find(|f| f.id == "feat_ghost")
        .expect("feat_ghost row");
    assert_eq!(ghost.sync, SyncStatus::PrdOnly);
}

#[test]
fn empty_realized_by_is_unassigned_not_an_error() {
    let tmp = tempdir().unwrap();
    let ws = setup_workspace(tmp.path());
    write_spec_file(
        &ws,
        "features/feat_bare.yaml",
        r#"id: feat_bare
type: feature
domain: dom_cli
source_anchor: "PRD.md#feat_bare"
intent: Not yet realized.
"#,
    );

    let report = run_monitor(&ws).unwrap();
    let bare = report
        .features
        .iter()
        .find(|f| f.id == "feat_bare")
        .expect("feat_bare row");
    assert_eq!(bare.assignment, Assignment::Unassigned);
    // Unassigned is progress information, not a schema failure.
    assert!(report
        .files
        .iter()
        .all(|f| f.node_id != "feat_bare" || f.errors == 0));
    assert_eq!(report.assignment.passed, 1);
    assert_eq!(report.assignment.total, 2);
}

#[test]
fn unreferenced_component_is_yaml_only() {
    let tmp = tempdir().unwrap();
    let ws = setup_workspace(tmp.path());
    write_spec_file(
        &ws,
        "components/comp_loose.yaml",
        r#"id: comp_loose
type: module
desc: Nothing realizes this yet.
file_path: src/loose.rs
design:
  api: "noop()"
  logic: Placeholder.
"#,
    );

    let report = run_monitor(&ws).unwrap();
    let loose = report
        .components
        .iter()
        .find(|c| c.id == "comp_loose")
        .expect("comp_loose row");
    assert_eq!(loose.sync, SyncStatus::YamlOnly);
}

#[test]
fn feature_with_undefined_domain_is_a_schema_error() {
    let tmp = tempdir().unwrap();
    let ws = setup_workspace(tmp.path());
    write_spec_file(
        &ws,
        "features/feat_lost.yaml",
        r#"id: feat_lost
type: feature
domain: dom_nowhere
source_anchor: "PRD.md#feat_lost"
intent: Points at a domain nobody defined.
"#,
    );

    let report = run_monitor(&ws).unwrap();
    assert!(report.has_errors());
    let row = report
        .files
        .iter()
        .find(|f| f.node_id == "feat_lost")
        .expect("feat_lost schema row");
    assert!(row.errors > 0);
    assert!(row.messages.iter().any(|m| m.contains("dom_nowhere")));
}

#[test]
fn design_anchor_under_design_principles_is_sync_eligible() {
    let tmp = tempdir().unwrap();
    let ws = setup_workspace(tmp.path());
    let prd = format!(
        "{}\n## Design Principles\n\n### Derived State <!-- id: des_derived_state -->\n",
        PRD
    );
    fs::write(&ws.prd_path, prd).unwrap();

    // Anchored but with no node file: prd_only drift.
    let report = run_monitor(&ws).unwrap();
    let row = report
        .designs
        .iter()
        .find(|d| d.id == "des_derived_state")
        .expect("design row");
    assert_eq!(row.sync, SyncStatus::PrdOnly);

    // With the node file present the pair is synced.
    write_spec_file(
        &ws,
        "design/des_derived_state.yaml",
        "id: des_derived_state\ntype: design\ndesc: The database is a cache over node files.\n",
    );
    let report = run_monitor(&ws).unwrap();
    let row = report
        .designs
        .iter()
        .find(|d| d.id == "des_derived_state")
        .unwrap();
    assert_eq!(row.sync, SyncStatus::Synced);
}

#[test]
fn overall_is_the_fixed_weighted_mean() {
    let tmp = tempdir().unwrap();
    let ws = setup_workspace(tmp.path());
    write_spec_file(
        &ws,
        "features/feat_bare.yaml",
        r#"id: feat_bare
type: feature
domain: dom_cli
source_anchor: "PRD.md#feat_bare"
intent: Not yet realized.
"#,
    );

    let report = run_monitor(&ws).unwrap();
    let expected =
        0.30 * report.schema.score + 0.30 * report.sync.score + 0.40 * report.assignment.score;
    assert!((report.overall - expected).abs() < 1e-9);
}

#[test]
fn broken_meta_schema_fails_the_run_but_is_never_schema_counted() {
    let tmp = tempdir().unwrap();
    let ws = setup_workspace(tmp.path());

    // Healthy grammar: the file exists but never appears in schema rows.
    let report = run_monitor(&ws).unwrap();
    assert!(report
        .files
        .iter()
        .all(|f| f.node_id != "sub_meta_schema"));

    // Unreadable grammar: the whole run refuses to proceed.
    write_spec_file(&ws, "substrate/sub_meta_schema.yaml", "kinds: [broken\n");
    let err = run_monitor(&ws).unwrap_err();
    assert!(matches!(err, SpecGraphError::MetaSchemaUnavailable(_)));
}
