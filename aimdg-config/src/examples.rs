// aimdg-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical examples for gateway configuration. Outputs are deterministic
//! and kept in sync with `schema` and `docs`.

/// Returns a canonical example `aimdg.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"# Fast-path detector thresholds (spec.md §4.1).
tau_high = 0.95
tau_low = 0.70
theta_vector = 0.85
theta_vector_high = 0.95

# Vector index tuning (HNSW).
vector_index_m = 16
ef_construction = 200
ef_search = 100
embedding_dimension = 256

# Pipeline stage deadlines.
fast_path_deadline_ms = 10
deep_path_deadline_ms = 100
total_deadline_ms = 500

# Behavioral analysis and diversification.
caller_history_size = 64
mmr_lambda = 0.5

# Adaptive mitigation selection (UCB1).
mitigation_ucb_c = 1.4142135

# Episodic memory retention.
episode_hot_window_days = 7

# Concurrency and admission control.
worker_pool_size = 8
overload_high_water = 1024
"#,
    )
}

/// Returns a canonical example `policies.toml` document.
#[must_use]
pub fn policy_toml_example() -> String {
    String::from(
        r#"[[policy]]
name = "no_unredacted_pii_forwarded"
severity = "critical"

[policy.formula]
op = "implies"

[policy.formula.antecedent]
op = "atomic"
predicate = "pii_detected"

[policy.formula.consequent]
op = "atomic"
predicate = "pii_redacted"

[[policy]]
name = "threats_are_always_mitigated"
severity = "high"

[policy.formula]
op = "implies"

[policy.formula.antecedent]
op = "atomic"
predicate = "threat_detected"

[policy.formula.consequent]
op = "atomic"
predicate = "mitigation_applied"

[[policy]]
name = "decision_within_sla"
severity = "medium"

[policy.formula]
op = "always"

[policy.formula.formula]
op = "atomic"
predicate = "latency_within_sla"
"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_settings_toml;
    use crate::policy::parse_policy_toml;

    #[test]
    fn settings_example_parses_and_validates() {
        parse_settings_toml(&config_toml_example()).expect("example settings should parse and validate");
    }

    #[test]
    fn policy_example_compiles() {
        let policies = parse_policy_toml(&policy_toml_example()).expect("example policies should compile");
        assert_eq!(policies.len(), 3);
    }
}
