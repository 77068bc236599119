#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// aimdg-cli/src/main.rs
// ============================================================================
// Module: Gateway CLI Entry Point
// Description: Command dispatcher for running requests through the gateway,
//              inspecting/validating configuration, and replaying decisions.
// Purpose: Provide a thin, synchronous CLI over `aimdg-core`/`aimdg-config`;
//          the gateway's pipeline and policy semantics live in those crates,
//          not here.
// Dependencies: clap, aimdg-core, aimdg-config, aimdg-store-sqlite, serde,
//               serde_json, thiserror.
// ============================================================================

//! ## Overview
//! The gateway CLI has three subcommands: `admit` runs a single JSON-encoded
//! request through a freshly constructed `Gateway` and prints the resulting
//! decision; `config` validates, documents, and generates examples of the
//! TOML configuration formats; `replay` decodes a previously emitted
//! canonical decision record and optionally verifies its proof token. All
//! user-facing strings are routed through the i18n catalog (`aimdg_cli::t!`)
//! to keep output centralized and ready for future localization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Read as _;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use aimdg_cli::embed::HashEmbedder;
use aimdg_cli::render;
use aimdg_cli::t;
use aimdg_config::config_docs_markdown;
use aimdg_config::config_schema;
use aimdg_config::config_toml_example;
use aimdg_config::default_config_path;
use aimdg_config::load_policy_file;
use aimdg_config::load_settings_file;
use aimdg_config::parse_cold_store_toml;
use aimdg_config::policy_schema;
use aimdg_config::policy_toml_example;
use aimdg_config::write_config_docs;
use aimdg_core::AdaptiveResponder;
use aimdg_core::Clock as _;
use aimdg_core::ColdEpisodeStore;
use aimdg_core::DecisionCodecError;
use aimdg_core::DecisionRecord;
use aimdg_core::EpisodicMemory;
use aimdg_core::Gateway;
use aimdg_core::MemoryParams;
use aimdg_core::NullColdStore;
use aimdg_core::NullTelemetrySink;
use aimdg_core::PatternId;
use aimdg_core::PatternKind;
use aimdg_core::PatternSource;
use aimdg_core::PatternStore;
use aimdg_core::PipelineDependencies;
use aimdg_core::Request;
use aimdg_core::ResponderParams;
use aimdg_core::Severity;
use aimdg_core::Settings;
use aimdg_core::Signature;
use aimdg_core::SigningKey;
use aimdg_core::SigningKeyRing;
use aimdg_core::SystemClock;
use aimdg_core::VectorIndexParams;
use aimdg_store_sqlite::SqliteColdStore;
use aimdg_store_sqlite::SqliteStoreConfig;
use aimdg_store_sqlite::SqliteStoreMode;
use aimdg_store_sqlite::SqliteSyncMode;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Error Idiom
// ============================================================================

/// A user-facing CLI failure: already-localized text ready for stderr.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable, already-localized error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a localized message.
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Builds a localized message describing a failed write to `stream`.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Prints `message` to stderr and returns a failing exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: CLI Surface
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser)]
#[command(name = "aimdg", version, about = "AI Manipulation Defense Gateway command-line interface")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs a single request through the gateway and prints the decision.
    Admit(AdmitArgs),
    /// Inspects, validates, or generates gateway configuration artifacts.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Decodes (and optionally verifies) a previously emitted decision record.
    Replay(ReplayArgs),
}

/// Output formats shared by `admit` and `replay`.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Short human-readable summary (default).
    Text,
    /// Pretty-printed JSON.
    Json,
    /// Single hex line of the canonical wire bytes.
    Hex,
}

/// Arguments for the `admit` subcommand.
#[derive(Args)]
struct AdmitArgs {
    /// Path to a JSON-encoded request, or "-" to read from stdin.
    #[arg(long, default_value = "-")]
    request: String,
    /// Path to an `aimdg.toml` settings file. Defaults to `AIMDG_CONFIG_PATH`
    /// or `aimdg.toml` in the current directory if present, else built-in
    /// defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Path to a JSON array of pattern seeds to load into the pattern store
    /// before admitting the request.
    #[arg(long)]
    patterns: Option<PathBuf>,
    /// Path to a policy TOML file compiled into the gateway's policy set.
    #[arg(long)]
    policies: Option<PathBuf>,
    /// Path to a `SQLite` cold episode store. Omit to run without a cold
    /// tier (aged-out episodes are simply dropped).
    #[arg(long)]
    cold_store: Option<PathBuf>,
    /// Hex-encoded signing key secret. Omit to use a built-in development
    /// key (unsuitable for a real deployment).
    #[arg(long)]
    signing_key_hex: Option<String>,
    /// Key id byte paired with `--signing-key-hex`.
    #[arg(long, default_value_t = 0)]
    signing_key_id: u8,
    /// Output rendering for the resulting decision.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Configuration-inspection subcommands.
#[derive(Subcommand)]
enum ConfigCommand {
    /// Validates a settings TOML file (or the resolved default path).
    Validate {
        /// Path to the settings file. Defaults to the resolved config path.
        path: Option<PathBuf>,
    },
    /// Prints the JSON schema for settings or policy files.
    Schema {
        /// Which schema to print.
        #[arg(value_enum)]
        target: SchemaTarget,
    },
    /// Prints an annotated example settings or policy TOML document.
    Example {
        /// Which example document to print.
        #[arg(value_enum)]
        target: SchemaTarget,
    },
    /// Writes (or prints) generated settings documentation.
    Docs {
        /// Destination path. Prints to stdout if omitted.
        output: Option<PathBuf>,
    },
}

/// Selects which configuration artifact a `config` subcommand acts on.
#[derive(Clone, Copy, ValueEnum)]
enum SchemaTarget {
    /// The gateway's `Settings` document.
    Settings,
    /// The policy file format.
    Policy,
}

/// Arguments for the `replay` subcommand.
#[derive(Args)]
struct ReplayArgs {
    /// Path to a hex-encoded canonical decision record, or "-" for stdin.
    #[arg(long, default_value = "-")]
    input: String,
    /// Output rendering for the decoded decision.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Hex-encoded signing key secret to verify the proof token against.
    #[arg(long)]
    verify_key_hex: Option<String>,
    /// Key id byte paired with `--verify-key-hex`.
    #[arg(long, default_value_t = 0)]
    verify_key_id: u8,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => emit_error(&err.message),
    }
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Admit(args) => run_admit(args),
        Commands::Config { command } => run_config(command),
        Commands::Replay(args) => run_replay(args),
    }
}

// ============================================================================
// SECTION: Shared I/O Helpers
// ============================================================================

/// Reads all of stdin into a string.
fn read_stdin_string() -> CliResult<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|err| CliError::new(format!("failed to read stdin: {err}")))?;
    Ok(buf)
}

/// Writes `message` to stdout, mapping I/O failures into a [`CliError`].
fn print_line(message: &str) -> CliResult<()> {
    write_stdout_line(message).map_err(|err| CliError::new(output_error("stdout", &err)))
}

// ============================================================================
// SECTION: `admit`
// ============================================================================

/// Executes the `admit` command: builds a gateway from the given
/// configuration and runs one request through it.
fn run_admit(args: AdmitArgs) -> CliResult<()> {
    let request = read_request(&args.request)?;
    let settings = resolve_settings(args.config.as_deref())?;

    let pattern_store = PatternStore::new(
        settings.embedding_dimension,
        VectorIndexParams {
            m: settings.vector_index_m,
            ef_construction: settings.ef_construction,
            ef_search: settings.ef_search,
        },
    );
    if let Some(path) = &args.patterns {
        seed_patterns(&pattern_store, path, settings.embedding_dimension)?;
    }

    let policies = match &args.policies {
        Some(path) => load_policy_file(path)
            .map_err(|err| CliError::new(t!("policies.load_failed", path = path.display(), error = err)))?,
        None => Vec::new(),
    };

    let cold: Box<dyn ColdEpisodeStore> = open_cold_store(args.cold_store.as_deref())?;
    let signing = resolve_signing_key_ring(args.signing_key_hex.as_deref(), args.signing_key_id)?;

    let deps = PipelineDependencies {
        pattern_store,
        embedder: Box::new(HashEmbedder::new(settings.embedding_dimension)),
        memory: EpisodicMemory::new(
            MemoryParams {
                hot_window_ns: settings.episode_hot_window_days.saturating_mul(24 * 3_600).saturating_mul(1_000_000_000),
                caller_history_size: settings.caller_history_size,
            },
            cold,
        ),
        responder: AdaptiveResponder::new(ResponderParams { ucb_c: settings.mitigation_ucb_c }),
        policies,
        signing,
        telemetry: Box::new(NullTelemetrySink),
        clock: Box::new(SystemClock::new()),
    };

    let gateway = Gateway::new(settings, deps).map_err(|err| CliError::new(format!("invalid settings: {err}")))?;
    let record = gateway.admit(request);
    render_decision(&record, args.format)
}

/// Reads and parses a JSON-encoded request from a file path or stdin (`-`).
fn read_request(source: &str) -> CliResult<Request> {
    let contents = if source == "-" {
        read_stdin_string()?
    } else {
        fs::read_to_string(source)
            .map_err(|err| CliError::new(t!("request.read_failed", path = source, error = err)))?
    };
    serde_json::from_str(&contents).map_err(|err| CliError::new(t!("request.parse_failed", path = source, error = err)))
}

/// Resolves the effective [`Settings`]: an explicit `--config` path, the
/// default config path if present, or built-in defaults.
fn resolve_settings(config: Option<&Path>) -> CliResult<Settings> {
    match config {
        Some(path) => {
            load_settings_file(path).map_err(|err| CliError::new(t!("config.load_failed", path = path.display(), error = err)))
        }
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                load_settings_file(&default_path)
                    .map_err(|err| CliError::new(t!("config.load_failed", path = default_path.display(), error = err)))
            } else {
                Ok(Settings::default())
            }
        }
    }
}

/// Opens a `SQLite` cold store at `path`, or a discarding [`NullColdStore`]
/// if no path was given.
fn open_cold_store(path: Option<&Path>) -> CliResult<Box<dyn ColdEpisodeStore>> {
    match path {
        Some(path) => {
            let config = SqliteStoreConfig {
                path: path.to_path_buf(),
                busy_timeout_ms: 5_000,
                journal_mode: SqliteStoreMode::default(),
                sync_mode: SqliteSyncMode::default(),
            };
            let store = SqliteColdStore::new(config)
                .map_err(|err| CliError::new(t!("coldstore.open_failed", path = path.display(), error = err)))?;
            Ok(Box::new(store))
        }
        None => Ok(Box::new(NullColdStore)),
    }
}

/// Resolves a [`SigningKeyRing`] from an explicit hex secret, or falls back
/// to the built-in development key with a stderr warning.
fn resolve_signing_key_ring(hex: Option<&str>, key_id: u8) -> CliResult<SigningKeyRing> {
    match hex {
        Some(hex) => {
            let secret =
                render::decode_hex(hex).map_err(|err| CliError::new(t!("signing.key.invalid_hex", error = err)))?;
            Ok(SigningKeyRing::new(SigningKey::new(key_id, secret)))
        }
        None => {
            write_stderr_line(&t!("signing.key.dev_default")).map_err(|err| CliError::new(output_error("stderr", &err)))?;
            Ok(SigningKeyRing::new(SigningKey::new(0, DEV_SIGNING_KEY.to_vec())))
        }
    }
}

/// Development-only default signing secret, used when no `--signing-key-hex`
/// is supplied. Never used for anything a verifier outside this process
/// needs to trust.
const DEV_SIGNING_KEY: &[u8] = b"aimdg-cli-development-signing-key";

// ============================================================================
// SECTION: Pattern Seeding
// ============================================================================

/// The on-disk shape of a single seeded pattern, reusing `aimdg-core`'s own
/// deserializable types so the seed file's `kind`/`severity`/`signature`
/// values match the wire vocabulary exactly.
#[derive(Deserialize)]
struct PatternSeed {
    /// Pattern category (injection, jailbreak, exfiltration, ...).
    kind: PatternKind,
    /// Baseline severity assigned to matches against this pattern.
    severity: Severity,
    /// The signature (literal, regex, or token-sequence) to match.
    signature: Signature,
    /// Explicit embedding vector, if precomputed.
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    /// Text to derive an embedding from when `embedding` is absent.
    #[serde(default)]
    embedding_text: Option<String>,
    /// Starting confidence weight for this pattern.
    confidence_baseline: f32,
    /// Provenance tag; defaults to [`PatternSource::Seeded`].
    #[serde(default = "default_pattern_source")]
    source: PatternSource,
}

/// Default provenance for patterns loaded via `--patterns`.
const fn default_pattern_source() -> PatternSource {
    PatternSource::Seeded
}

/// Extracts the literal text driving a signature, for embedding purposes.
fn signature_text(signature: &Signature) -> &str {
    match signature {
        Signature::LiteralSubstring { text } => text,
        Signature::CompiledRegex { pattern } => pattern,
        Signature::TokenSequence { anchor, .. } => anchor,
    }
}

/// Loads a JSON array of [`PatternSeed`] entries from `path` and inserts
/// each into `store`, deriving an embedding when one isn't supplied.
fn seed_patterns(store: &PatternStore, path: &Path, dimension: usize) -> CliResult<()> {
    let contents = fs::read_to_string(path)
        .map_err(|err| CliError::new(t!("patterns.read_failed", path = path.display(), error = err)))?;
    let seeds: Vec<PatternSeed> = serde_json::from_str(&contents)
        .map_err(|err| CliError::new(t!("patterns.parse_failed", path = path.display(), error = err)))?;
    let now = SystemClock::new().now();
    for (index, seed) in seeds.into_iter().enumerate() {
        let embedding = seed.embedding.clone().unwrap_or_else(|| {
            let text = seed.embedding_text.clone().unwrap_or_else(|| signature_text(&seed.signature).to_string());
            aimdg_cli::embed::hash_embed(&text, dimension)
        });
        let _id: PatternId = store
            .insert(seed.kind, seed.severity, seed.signature, embedding, seed.confidence_baseline, seed.source, now)
            .map_err(|err| CliError::new(t!("patterns.insert_failed", index = index, path = path.display(), error = err)))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: `config`
// ============================================================================

/// Dispatches a `config` subcommand.
fn run_config(command: ConfigCommand) -> CliResult<()> {
    match command {
        ConfigCommand::Validate { path } => run_config_validate(path),
        ConfigCommand::Schema { target } => run_config_schema(target),
        ConfigCommand::Example { target } => run_config_example(target),
        ConfigCommand::Docs { output } => run_config_docs(output),
    }
}

/// Validates a settings file (and its embedded cold-store table, if any).
fn run_config_validate(path: Option<PathBuf>) -> CliResult<()> {
    let path = path.unwrap_or_else(default_config_path);
    load_settings_file(&path).map_err(|err| CliError::new(t!("config.load_failed", path = path.display(), error = err)))?;
    let contents =
        fs::read_to_string(&path).map_err(|err| CliError::new(t!("config.load_failed", path = path.display(), error = err)))?;
    parse_cold_store_toml(&contents).map_err(|err| CliError::new(t!("config.load_failed", path = path.display(), error = err)))?;
    print_line(&t!("config.validate.ok", path = path.display()))
}

/// Prints the JSON schema for the requested configuration artifact.
fn run_config_schema(target: SchemaTarget) -> CliResult<()> {
    let schema = match target {
        SchemaTarget::Settings => config_schema(),
        SchemaTarget::Policy => policy_schema(),
    };
    let rendered = serde_json::to_string_pretty(&schema).map_err(|err| CliError::new(format!("failed to render schema: {err}")))?;
    print_line(&rendered)
}

/// Prints an annotated example document for the requested artifact.
fn run_config_example(target: SchemaTarget) -> CliResult<()> {
    let example = match target {
        SchemaTarget::Settings => config_toml_example(),
        SchemaTarget::Policy => policy_toml_example(),
    };
    print_line(&example)
}

/// Writes (or prints) generated settings documentation.
fn run_config_docs(output: Option<PathBuf>) -> CliResult<()> {
    match output {
        Some(path) => {
            write_config_docs(Some(&path)).map_err(|err| CliError::new(t!("config.docs.write_failed", error = err)))?;
            print_line(&t!("config.docs.write_ok", path = path.display()))
        }
        None => {
            let markdown = config_docs_markdown().map_err(|err| CliError::new(t!("config.docs.write_failed", error = err)))?;
            print_line(&markdown)
        }
    }
}

// ============================================================================
// SECTION: `replay`
// ============================================================================

/// Executes the `replay` command: decodes a canonical decision record and
/// optionally verifies its proof token.
fn run_replay(args: ReplayArgs) -> CliResult<()> {
    let hex = if args.input == "-" { read_stdin_string()? } else { fs::read_to_string(&args.input)
        .map_err(|err| CliError::new(t!("replay.read_failed", path = args.input, error = err)))? };
    let bytes = render::decode_hex(&hex).map_err(|err| CliError::new(t!("replay.decode_failed", error = err)))?;
    let record = decode_record(&bytes)?;

    if let Some(hex_key) = &args.verify_key_hex {
        verify_proof_token(&record, hex_key, args.verify_key_id)?;
    }

    render_decision(&record, args.format)
}

/// Decodes a [`DecisionRecord`] from its canonical wire bytes.
fn decode_record(bytes: &[u8]) -> CliResult<DecisionRecord> {
    DecisionRecord::from_canonical_bytes(bytes).map_err(|err: DecisionCodecError| CliError::new(t!("replay.decode_failed", error = err)))
}

/// Verifies `record`'s proof token against the given hex-encoded secret,
/// printing the outcome.
fn verify_proof_token(record: &DecisionRecord, hex_key: &str, key_id: u8) -> CliResult<()> {
    let secret = render::decode_hex(hex_key).map_err(|err| CliError::new(t!("signing.key.invalid_hex", error = err)))?;
    let ring = SigningKeyRing::new(SigningKey::new(key_id, secret));
    let message = record.signable_bytes();
    match ring.verify(&message, &record.proof_token) {
        Ok(()) => print_line(&t!("replay.verify.ok")),
        Err(_err) => print_line(&t!("replay.verify.failed")),
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders `record` in the requested format and prints it to stdout.
fn render_decision(record: &DecisionRecord, format: OutputFormat) -> CliResult<()> {
    let rendered = match format {
        OutputFormat::Text => render::render_text(record),
        OutputFormat::Json => render::render_json(record).map_err(|err| CliError::new(format!("failed to render json: {err}")))?,
        OutputFormat::Hex => render::render_hex(record),
    };
    print_line(&rendered)
}
