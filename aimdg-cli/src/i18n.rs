// aimdg-cli/src/i18n.rs
// ============================================================================
// Module: CLI Internationalization Helpers
// Description: Provides message catalog and translation utilities for the CLI.
// Purpose: Centralize user-facing strings for future localization support.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! The gateway CLI stores user-facing strings in a small translation
//! catalog to enforce consistent messaging and to prepare for future locales.
//! All runtime output should be routed through the [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to the key itself to avoid panics.
//! - Placeholder substitutions preserve deterministic order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static catalog entries loaded into the localized message bundle.
const CATALOG_ITEMS: &[(&str, &str)] = &[
    ("main.version", "aimdg {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("request.read_failed", "Failed to read request JSON at {path}: {error}"),
    ("request.parse_failed", "Failed to parse request JSON at {path}: {error}"),
    ("patterns.read_failed", "Failed to read pattern seed file at {path}: {error}"),
    ("patterns.parse_failed", "Failed to parse pattern seed file at {path}: {error}"),
    ("patterns.insert_failed", "Failed to seed pattern {index} from {path}: {error}"),
    ("policies.load_failed", "Failed to load policy file at {path}: {error}"),
    ("config.load_failed", "Failed to load config at {path}: {error}"),
    ("config.validate.ok", "Config at {path} is valid."),
    ("config.docs.write_ok", "Settings documentation written to {path}"),
    ("config.docs.write_failed", "Failed to write settings documentation: {error}"),
    ("coldstore.open_failed", "Failed to open cold episode store at {path}: {error}"),
    (
        "signing.key.dev_default",
        "Using the built-in development signing key; pass --signing-key-hex for a real \
         deployment.",
    ),
    ("signing.key.invalid_hex", "Invalid --signing-key-hex value: {error}"),
    ("replay.read_failed", "Failed to read decision record bytes at {path}: {error}"),
    ("replay.decode_failed", "Failed to decode canonical decision record: {error}"),
    ("replay.verify.ok", "Proof token verifies against the supplied signing key."),
    ("replay.verify.failed", "Proof token does NOT verify against the supplied signing key."),
];

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the English fallback catalog while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

/// Returns the static English catalog used by the CLI.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

    CATALOG.get_or_init(|| CATALOG_ITEMS.iter().copied().collect())
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a localized message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
///
/// # Returns
///
/// A localized [`String`] with placeholders substituted.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_falls_back_to_itself() {
        assert_eq!(translate("no.such.key", Vec::new()), "no.such.key");
    }

    #[test]
    fn placeholder_is_substituted() {
        let msg = t!("config.validate.ok", path = "aimdg.toml");
        assert_eq!(msg, "Config at aimdg.toml is valid.");
    }
}
