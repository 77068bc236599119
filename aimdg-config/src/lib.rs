// aimdg-config/src/lib.rs
// ============================================================================
// Module: Gateway Config Library
// Description: Canonical config model, validation, and artifact generation.
// Purpose: Single source of truth for aimdg.toml and policies.toml semantics.
// Dependencies: aimdg-core, aimdg-logic, serde, toml
// ============================================================================

//! ## Overview
//! `aimdg-config` loads, validates, and publishes the settings snapshot
//! described in spec.md §6 ("Configuration"), and compiles operator-authored
//! policy TOML into `aimdg_core::Policy` values (spec.md §4.4/§4.5). It
//! provides strict, fail-closed validation and deterministic generators for
//! config schema, examples, and docs, mirroring how `aimdg-core` itself is
//! structured: one module per concern, re-exported flat from the crate root.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod docs;
pub mod examples;
pub mod policy;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ColdStoreConfig;
pub use config::ConfigError;
pub use config::GatewaySettingsFile;
pub use config::default_config_path;
pub use config::load_settings_file;
pub use config::parse_cold_store_toml;
pub use config::parse_settings_toml;
pub use docs::config_docs_markdown;
pub use docs::verify_config_docs;
pub use docs::write_config_docs;
pub use examples::config_toml_example;
pub use examples::policy_toml_example;
pub use policy::FormulaSpec;
pub use policy::PolicyFile;
pub use policy::PolicyFileError;
pub use policy::PolicySpec;
pub use policy::load_policy_file;
pub use policy::parse_policy_toml;
pub use schema::config_schema;
pub use schema::policy_schema;
