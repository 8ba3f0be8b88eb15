// src/core/assets.rs
// Embedded scaffold templates for `specgraph init`.

// NOTE: All include_str! paths are relative to this source file.

pub const TEMPLATE_META_SCHEMA: &str = include_str!("../../templates/sub_meta_schema.yaml");
pub const TEMPLATE_PRODUCT: &str = include_str!("../../templates/product.yaml");
pub const TEMPLATE_PRD: &str = include_str!("../../templates/PRD.md");
pub const TEMPLATE_FEATURE: &str = include_str!("../../templates/feat_example.yaml");

/// Contents of `.runtime/.gitignore`: derived state stays out of VCS.
pub const RUNTIME_GITIGNORE: &str = "*\n";
