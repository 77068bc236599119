// aimdg-config/src/docs.rs
// ============================================================================
// Module: Config Docs Generator
// Description: Markdown generator for aimdg.toml documentation.
// Purpose: Keep config docs in sync with the schema module.
// Dependencies: serde_json, std
// ============================================================================

//! ## Overview
//! Generates `Docs/configuration/aimdg.toml.md` from the canonical
//! configuration schema ([`crate::schema::config_schema`]). This output is
//! deterministic: every field documented here comes straight off the schema,
//! so drift between docs and the accepted keys is caught by
//! [`verify_config_docs`] rather than discovered by an operator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::schema::config_schema;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default output path for generated configuration docs.
const DOCS_PATH: &str = "Docs/configuration/aimdg.toml.md";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when generating or verifying config docs.
#[derive(Debug, Error)]
pub enum DocsError {
    /// IO failure while reading or writing docs.
    #[error("docs io error: {0}")]
    Io(String),
    /// Schema traversal or rendering error.
    #[error("docs schema error: {0}")]
    Schema(String),
    /// Generated docs do not match the committed file.
    #[error("docs drift: {0}")]
    Drift(String),
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Generates the configuration markdown documentation.
///
/// # Errors
///
/// Returns [`DocsError::Schema`] if a documented field is missing from the
/// generated schema (a programming error, not an operator-facing one).
pub fn config_docs_markdown() -> Result<String, DocsError> {
    let schema = config_schema();
    let mut out = String::new();

    out.push_str("<!--\n");
    out.push_str("Docs/configuration/aimdg.toml.md\n");
    out.push_str("============================================================================\n");
    out.push_str("Document: Gateway Configuration Reference\n");
    out.push_str("Description: Reference for aimdg.toml configuration fields.\n");
    out.push_str("Purpose: Document fast-path, deep-path, and policy tier settings.\n");
    out.push_str("Generated: This file is auto-generated; do not edit manually.\n");
    out.push_str("============================================================================\n");
    out.push_str("-->\n\n");

    out.push_str("# aimdg.toml Configuration\n\n");
    out.push_str("## Overview\n\n");
    out.push_str(
        "`aimdg.toml` configures the gateway's three admission tiers: the fast-path \
         detector, the deep-path behavioral analyzer, and the policy/adaptive-response \
         stage. Every key is optional; an absent key takes the documented default. \
         Configuration is validated at startup and fails closed: an invalid file \
         prevents the gateway from starting rather than admitting requests under \
         unvalidated settings.\n\n",
    );

    out.push_str("## Settings\n\n");
    out.push_str("| Key | Type | Default | Description |\n");
    out.push_str("|---|---|---|---|\n");
    let properties = schema["properties"].as_object().ok_or_else(|| DocsError::Schema("missing properties".to_string()))?;
    for (key, value) in properties {
        let row = render_row(key, value)?;
        out.push_str(&row);
    }

    Ok(out)
}

fn render_row(key: &str, value: &Value) -> Result<String, DocsError> {
    let mut row = String::new();
    let type_name = value["type"].as_str().unwrap_or("number");
    let default = value
        .get("default")
        .map(|default| default.to_string())
        .unwrap_or_else(|| "(see Settings::default)".to_string());
    let description = value["description"].as_str().unwrap_or("");
    writeln!(row, "| `{key}` | {type_name} | {default} | {description} |").map_err(|err| DocsError::Schema(err.to_string()))?;
    Ok(row)
}

/// Writes the generated docs to `path`, or [`DOCS_PATH`] if `None`.
///
/// # Errors
///
/// Returns [`DocsError::Io`] if the file cannot be written, or any error
/// from [`config_docs_markdown`].
pub fn write_config_docs(path: Option<&Path>) -> Result<(), DocsError> {
    let path = path.unwrap_or_else(|| Path::new(DOCS_PATH));
    let content = config_docs_markdown()?;
    fs::write(path, content.as_bytes()).map_err(|err| DocsError::Io(err.to_string()))
}

/// Verifies the on-disk docs at `path` (or [`DOCS_PATH`]) match the
/// generated output.
///
/// # Errors
///
/// Returns [`DocsError::Io`] if the file cannot be read, or
/// [`DocsError::Drift`] if its contents do not match the generated output.
pub fn verify_config_docs(path: Option<&Path>) -> Result<(), DocsError> {
    let path = path.unwrap_or_else(|| Path::new(DOCS_PATH));
    let content = config_docs_markdown()?;
    let existing = fs::read_to_string(path).map_err(|err| DocsError::Io(err.to_string()))?;
    if existing != content {
        return Err(DocsError::Drift(format!("docs mismatch: {}", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_mentions_every_settings_field() {
        let markdown = config_docs_markdown().expect("docs should render");
        assert!(markdown.contains("tau_high"));
        assert!(markdown.contains("embedding_dimension"));
        assert!(markdown.contains("worker_pool_size"));
    }

    #[test]
    fn write_then_verify_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("aimdg.toml.md");
        write_config_docs(Some(&path)).expect("docs should write");
        verify_config_docs(Some(&path)).expect("freshly written docs should verify");
    }

    #[test]
    fn verify_detects_drift() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("aimdg.toml.md");
        fs::write(&path, "stale content").expect("write stale docs");
        let result = verify_config_docs(Some(&path));
        assert!(matches!(result, Err(DocsError::Drift(_))));
    }
}
