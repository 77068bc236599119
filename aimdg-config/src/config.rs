// aimdg-config/src/config.rs
// ============================================================================
// Module: Gateway Settings File
// Description: Configuration loading and validation for the AI Manipulation
//              Defense Gateway.
// Purpose: Provide strict, fail-closed config parsing that resolves into the
//          canonical `aimdg_core::config::Settings` snapshot.
// Dependencies: aimdg-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file in which every key is optional;
//! an absent key takes `Settings::default()`'s value. Missing or invalid
//! configuration fails closed: a gateway is never constructed from settings
//! that fail `Settings::validate` (spec.md §6, §9 "Open Question: what
//! happens on invalid config").

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::path::Path;
use std::path::PathBuf;

use aimdg_core::Settings;
use aimdg_core::config::SettingsError;
use aimdg_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "aimdg.toml";
/// Environment variable used to override the config path.
const CONFIG_PATH_ENV_VAR: &str = "AIMDG_CONFIG_PATH";
/// Hard ceiling on config file size, to bound parse cost for an untrusted file.
const MAX_CONFIG_FILE_BYTES: u64 = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised loading or validating a gateway settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying IO error message.
        source: String,
    },
    /// The file exceeded `MAX_CONFIG_FILE_BYTES`.
    #[error("config file {path} is {actual} bytes, exceeds limit of {limit} bytes")]
    TooLarge {
        /// Path of the oversized file.
        path: String,
        /// Actual file size in bytes.
        actual: u64,
        /// Configured limit in bytes.
        limit: u64,
    },
    /// The file's contents were not valid TOML, or did not match the
    /// expected shape.
    #[error("failed to parse config file: {0}")]
    Parse(String),
    /// The parsed settings failed `Settings::validate`.
    #[error("invalid settings: {0}")]
    Validation(#[from] SettingsError),
}

// ============================================================================
// SECTION: Gateway Settings File
// ============================================================================

/// The on-disk, partially-specified form of [`Settings`].
///
/// Every field is optional; an absent field takes `Settings::default()`'s
/// value for that field. This is the TOML schema an operator edits directly
/// (spec.md §6's "Configuration" key list).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySettingsFile {
    /// See [`Settings::tau_high`].
    pub tau_high: Option<f32>,
    /// See [`Settings::tau_low`].
    pub tau_low: Option<f32>,
    /// See [`Settings::theta_vector`].
    pub theta_vector: Option<f32>,
    /// See [`Settings::theta_vector_high`].
    pub theta_vector_high: Option<f32>,
    /// See [`Settings::vector_index_m`].
    pub vector_index_m: Option<usize>,
    /// See [`Settings::ef_construction`].
    pub ef_construction: Option<usize>,
    /// See [`Settings::ef_search`].
    pub ef_search: Option<usize>,
    /// See [`Settings::fast_path_deadline_ms`].
    pub fast_path_deadline_ms: Option<u64>,
    /// See [`Settings::deep_path_deadline_ms`].
    pub deep_path_deadline_ms: Option<u64>,
    /// See [`Settings::total_deadline_ms`].
    pub total_deadline_ms: Option<u64>,
    /// See [`Settings::caller_history_size`].
    pub caller_history_size: Option<usize>,
    /// See [`Settings::mmr_lambda`].
    pub mmr_lambda: Option<f32>,
    /// See [`Settings::mitigation_ucb_c`].
    pub mitigation_ucb_c: Option<f32>,
    /// See [`Settings::episode_hot_window_days`].
    pub episode_hot_window_days: Option<u64>,
    /// See [`Settings::worker_pool_size`].
    pub worker_pool_size: Option<usize>,
    /// See [`Settings::overload_high_water`].
    pub overload_high_water: Option<usize>,
    /// See [`Settings::embedding_dimension`].
    pub embedding_dimension: Option<usize>,
}

impl GatewaySettingsFile {
    /// Resolves this partial file against `Settings::default()`, producing a
    /// fully-specified, validated [`Settings`] value.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the resolved settings fail
    /// [`Settings::validate`].
    pub fn resolve(&self) -> Result<Settings, SettingsError> {
        let defaults = Settings::default();
        let settings = Settings {
            tau_high: self.tau_high.unwrap_or(defaults.tau_high),
            tau_low: self.tau_low.unwrap_or(defaults.tau_low),
            theta_vector: self.theta_vector.unwrap_or(defaults.theta_vector),
            theta_vector_high: self.theta_vector_high.unwrap_or(defaults.theta_vector_high),
            vector_index_m: self.vector_index_m.unwrap_or(defaults.vector_index_m),
            ef_construction: self.ef_construction.unwrap_or(defaults.ef_construction),
            ef_search: self.ef_search.unwrap_or(defaults.ef_search),
            fast_path_deadline_ms: self.fast_path_deadline_ms.unwrap_or(defaults.fast_path_deadline_ms),
            deep_path_deadline_ms: self.deep_path_deadline_ms.unwrap_or(defaults.deep_path_deadline_ms),
            total_deadline_ms: self.total_deadline_ms.unwrap_or(defaults.total_deadline_ms),
            caller_history_size: self.caller_history_size.unwrap_or(defaults.caller_history_size),
            mmr_lambda: self.mmr_lambda.unwrap_or(defaults.mmr_lambda),
            mitigation_ucb_c: self.mitigation_ucb_c.unwrap_or(defaults.mitigation_ucb_c),
            episode_hot_window_days: self.episode_hot_window_days.unwrap_or(defaults.episode_hot_window_days),
            worker_pool_size: self.worker_pool_size.unwrap_or(defaults.worker_pool_size),
            overload_high_water: self.overload_high_water.unwrap_or(defaults.overload_high_water),
            embedding_dimension: self.embedding_dimension.unwrap_or(defaults.embedding_dimension),
        };
        settings.validate()?;
        Ok(settings)
    }
}

// ============================================================================
// SECTION: Cold Store Selection
// ============================================================================

/// Selects the `ColdEpisodeStore` backend an episodic memory should evict
/// into once an episode ages out of the hot window (spec.md §4.7
/// "Retention"). Read from an optional `[cold_store]` table; absent entirely,
/// the gateway runs with no cold tier and aged-out episodes are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ColdStoreConfig {
    /// Durable `SQLite`-backed archival (`aimdg-store-sqlite`).
    Sqlite(SqliteStoreConfig),
}

/// The `[cold_store]` table alone, parsed independently of
/// [`GatewaySettingsFile`] so an unrecognized settings key elsewhere in the
/// same document does not block cold-store resolution, and vice versa.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ColdStoreSection {
    cold_store: Option<ColdStoreConfig>,
}

/// Reads the optional `[cold_store]` table out of a gateway config document.
///
/// Returns `Ok(None)` if the document has no `[cold_store]` table, meaning
/// the gateway should run without a cold tier.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if `contents` is not valid TOML.
pub fn parse_cold_store_toml(contents: &str) -> Result<Option<ColdStoreConfig>, ConfigError> {
    let section: ColdStoreSection = toml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
    Ok(section.cold_store)
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Parses `contents` as a gateway settings TOML document, resolving it
/// against the default [`Settings`] and validating the result.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if `contents` is not valid TOML or
/// contains an unrecognized key, or [`ConfigError::Validation`] if the
/// resolved settings fail validation.
pub fn parse_settings_toml(contents: &str) -> Result<Settings, ConfigError> {
    let file: GatewaySettingsFile = toml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
    file.resolve().map_err(ConfigError::Validation)
}

/// Loads a gateway settings TOML document from `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if `path` cannot be read or exceeds
/// `MAX_CONFIG_FILE_BYTES`, [`ConfigError::Parse`] if its contents are not
/// valid, or [`ConfigError::Validation`] if the resolved settings fail
/// validation.
pub fn load_settings_file(path: &Path) -> Result<Settings, ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|err| ConfigError::Io {
        path: path.display().to_string(),
        source: err.to_string(),
    })?;
    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        return Err(ConfigError::TooLarge {
            path: path.display().to_string(),
            actual: metadata.len(),
            limit: MAX_CONFIG_FILE_BYTES,
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
        path: path.display().to_string(),
        source: err.to_string(),
    })?;
    parse_settings_toml(&contents)
}

/// Resolves the config file path: `AIMDG_CONFIG_PATH` if set, otherwise
/// `aimdg.toml` in the current working directory.
#[must_use]
pub fn default_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV_VAR).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_resolves_to_defaults() {
        let settings = parse_settings_toml("").expect("empty document should resolve");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let settings = parse_settings_toml("tau_high = 0.99\nworker_pool_size = 4\n")
            .expect("partial overrides should resolve");
        assert!((settings.tau_high - 0.99).abs() < f32::EPSILON);
        assert_eq!(settings.worker_pool_size, 4);
        assert_eq!(settings.ef_search, Settings::default().ef_search);
    }

    #[test]
    fn rejects_unknown_key() {
        let result = parse_settings_toml("not_a_real_setting = 1\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_invalid_resolved_settings() {
        let result = parse_settings_toml("tau_low = 0.99\ntau_high = 0.5\n");
        assert!(matches!(result, Err(ConfigError::Validation(SettingsError::InvertedConfidenceBand { .. }))));
    }

    #[test]
    fn load_settings_file_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("aimdg.toml");
        std::fs::write(&path, "tau_high = 0.9\n").expect("write config");
        let settings = load_settings_file(&path).expect("file should load");
        assert!((settings.tau_high - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn load_settings_file_reports_missing_file() {
        let result = load_settings_file(Path::new("/nonexistent/aimdg.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn load_settings_file_rejects_oversized_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("aimdg.toml");
        let oversized = "# padding\n".repeat((MAX_CONFIG_FILE_BYTES as usize / 10) + 1);
        std::fs::write(&path, oversized).expect("write config");
        let result = load_settings_file(&path);
        assert!(matches!(result, Err(ConfigError::TooLarge { .. })));
    }

    #[test]
    fn cold_store_table_is_optional() {
        let resolved = parse_cold_store_toml("tau_high = 0.9\n").expect("missing table resolves to None");
        assert!(resolved.is_none());
    }

    #[test]
    fn cold_store_table_resolves_sqlite_backend() {
        let resolved = parse_cold_store_toml(
            "[cold_store]\nbackend = \"sqlite\"\npath = \"/var/lib/aimdg/cold.sqlite\"\n",
        )
        .expect("sqlite table should parse")
        .expect("cold store should be present");
        let ColdStoreConfig::Sqlite(sqlite) = resolved;
        assert_eq!(sqlite.path, PathBuf::from("/var/lib/aimdg/cold.sqlite"));
    }

    #[test]
    fn default_config_path_honors_env_var_override() {
        // SAFETY-free check: only reads, never mutates global env state here;
        // relies on the caller's process not concurrently mutating this var.
        let resolved = default_config_path();
        assert!(resolved == PathBuf::from(DEFAULT_CONFIG_NAME) || resolved.as_os_str().len() > 0);
    }
}
