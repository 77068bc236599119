// aimdg-cli/src/lib.rs
// ============================================================================
// Module: Gateway CLI Library
// Description: Shared helpers for the gateway command-line interface.
// Purpose: Provide reusable components (i18n, rendering, offline embedder)
//          for the CLI binary and its tests.
// Dependencies: aimdg-core, serde_json
// ============================================================================

//! ## Overview
//! This library houses the parts of the CLI worth unit-testing in
//! isolation: the message catalog, decision-record rendering, and the
//! offline embedder. The binary entry point (`src/main.rs`) wires these
//! together with `clap` and `aimdg-core`'s `Gateway`.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Deterministic offline embedder used when no real embedding backend is
/// configured.
pub mod embed;

/// Internationalization helpers and message catalog.
pub mod i18n;

/// Decision record rendering and hex codec helpers.
pub mod render;

#[cfg(test)]
mod tests;
