// crates/signed-relay-cli/src/main.rs
// ============================================================================
// Module: Signed Relay CLI Entry Point
// Description: Command dispatcher for relay host operations.
// Purpose: Manage destinations and keys, relay signed documents, and read the
//          verification ledger from a shell.
// Dependencies: base64, clap, signed-relay-broker, signed-relay-config,
//               signed-relay-core, signed-relay-store-sqlite, serde, thiserror.
// ============================================================================

//! ## Overview
//! The Signed Relay CLI maps one subcommand to each host operation exposed by
//! [`RelayBroker`]. Results are printed as canonical JSON on stdout; failures
//! go to stderr with a failure exit code.
//!
//! Security posture: file inputs are untrusted and read with hard size limits.
//! Private keys are never echoed back.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::ArgAction;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use signed_relay_broker::FileAuditSink;
use signed_relay_broker::HttpDispatcher;
use signed_relay_broker::NoopAuditSink;
use signed_relay_broker::RelayAuditSink;
use signed_relay_broker::RelayBroker;
use signed_relay_broker::StderrAuditSink;
use signed_relay_config::AuditConfig;
use signed_relay_config::AuditSinkType;
use signed_relay_config::CONFIG_ENV_VAR;
use signed_relay_config::DEFAULT_CONFIG_NAME;
use signed_relay_config::RelayConfig;
use signed_relay_config::StoreConfig;
use signed_relay_core::CallerRequest;
use signed_relay_core::ConfigStore;
use signed_relay_core::DestinationInput;
use signed_relay_core::InMemoryConfigStore;
use signed_relay_core::RelayError;
use signed_relay_store_sqlite::SqliteConfigStore;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a PEM input file (certificates, keys, CA bundles).
const MAX_PEM_FILE_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "signed-relay", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Path to the relay configuration file.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage relay destinations.
    Destination {
        /// Selected destination subcommand.
        #[command(subcommand)]
        command: DestinationCommand,
    },
    /// Manage signing keys and the client identity.
    Keys {
        /// Selected keys subcommand.
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Relay a signed document to a destination.
    Contact(ContactCommand),
    /// Send a minimal signed document and report reachability.
    Ping(PingCommand),
    /// Print the verification record stored for a nonce.
    Verify(VerifyCommand),
}

/// Destination subcommands.
#[derive(Subcommand, Debug)]
enum DestinationCommand {
    /// Create a destination or update the supplied fields of an existing one.
    Write(DestinationWriteCommand),
    /// Print a destination.
    Read(DestinationNameArg),
    /// Delete a destination.
    Delete(DestinationNameArg),
    /// List destination names.
    List,
}

/// Arguments naming a single destination.
#[derive(clap::Args, Debug)]
struct DestinationNameArg {
    /// Destination name.
    name: String,
}

/// Arguments for `destination write`.
#[derive(clap::Args, Debug)]
struct DestinationWriteCommand {
    /// Destination name.
    name: String,
    /// Absolute http(s) URL that receives the signed document.
    #[arg(long, value_name = "URL")]
    target_url: Option<String>,
    /// Caller parameter name to forward; repeat for each name.
    #[arg(long = "param", value_name = "NAME")]
    params: Vec<String>,
    /// Whether to include the caller's entity identifier.
    #[arg(long, value_name = "BOOL")]
    send_entity_id: Option<bool>,
    /// Dispatch timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,
    /// Whether to follow HTTP redirects.
    #[arg(long, value_name = "BOOL")]
    follow_redirects: Option<bool>,
    /// Metadata entry as `key=value`; repeat for each entry.
    #[arg(long = "metadata", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    metadata: Vec<(String, String)>,
    /// PEM bundle of CA certificates pinned for this destination.
    #[arg(long, value_name = "FILE")]
    target_ca: Option<PathBuf>,
}

/// Keys subcommands.
#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Install the signing certificate and private key.
    Install(KeyPairFiles),
    /// Print the signing certificate.
    Certificate,
    /// Install the mTLS client identity presented to destinations.
    ClientIdentity(KeyPairFiles),
    /// Remove the mTLS client identity.
    ClearClientIdentity,
}

/// Certificate and key file arguments.
#[derive(clap::Args, Debug)]
struct KeyPairFiles {
    /// PEM certificate file.
    #[arg(long, value_name = "FILE")]
    certificate: PathBuf,
    /// PEM private key file.
    #[arg(long, value_name = "FILE")]
    private_key: PathBuf,
}

/// Arguments for `contact`.
#[derive(clap::Args, Debug)]
struct ContactCommand {
    /// Destination name.
    name: String,
    /// Correlation identifier; generated when omitted.
    #[arg(long, value_name = "ID")]
    request_id: Option<String>,
    /// Caller entity identifier.
    #[arg(long, value_name = "ID")]
    entity_id: Option<String>,
    /// Caller parameter as `key=value`; repeat for each parameter.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    params: Vec<(String, String)>,
}

/// Arguments for `ping`.
#[derive(clap::Args, Debug)]
struct PingCommand {
    /// Destination name.
    name: String,
    /// Correlation identifier; generated when omitted.
    #[arg(long, value_name = "ID")]
    request_id: Option<String>,
}

/// Arguments for `verify`.
#[derive(clap::Args, Debug)]
struct VerifyCommand {
    /// Nonce printed by `contact` or observed by the destination.
    nonce: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing failures.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Display message.
    message: String,
}

impl CliError {
    /// Creates a new CLI error.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }

    /// Wraps a relay error with its stable kind label.
    fn relay(error: &RelayError) -> Self {
        Self::new(format!("{}: {error}", error.kind()))
    }
}

/// Result alias for CLI operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("signed-relay {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let config = load_config(cli.config.as_deref())?;
    let broker = build_broker(&config)?;

    let output = match command {
        Commands::Destination {
            command,
        } => command_destination(&broker, command)?,
        Commands::Keys {
            command,
        } => command_keys(&broker, command)?,
        Commands::Contact(command) => command_contact(&broker, command)?,
        Commands::Ping(command) => command_ping(&broker, command)?,
        Commands::Verify(command) => command_verify(&broker, &command)?,
    };
    write_json_value(&output)?;
    Ok(ExitCode::SUCCESS)
}

/// Prints CLI help to stdout.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Host Wiring
// ============================================================================

/// Loads configuration, falling back to defaults when nothing is configured.
///
/// An explicit `--config`, the environment override, or an existing default
/// file in the working directory is loaded strictly; otherwise defaults apply.
fn load_config(path: Option<&Path>) -> CliResult<RelayConfig> {
    if path.is_none()
        && std::env::var_os(CONFIG_ENV_VAR).is_none()
        && !Path::new(DEFAULT_CONFIG_NAME).exists()
    {
        return Ok(RelayConfig::default());
    }
    RelayConfig::load(path).map_err(|err| CliError::new(err.to_string()))
}

/// Builds the relay broker described by `config`.
fn build_broker(config: &RelayConfig) -> CliResult<RelayBroker> {
    let store = open_store(&config.store)?;
    let verify_store = match &config.verify_store {
        Some(verify_store) => open_store(verify_store)?,
        None => Arc::clone(&store),
    };
    let dispatcher = HttpDispatcher::new()
        .with_max_response_bytes(config.dispatch.max_response_bytes)
        .with_user_agent(config.dispatch.user_agent.clone());
    RelayBroker::builder()
        .store(store)
        .verify_store(verify_store)
        .dispatcher(Arc::new(dispatcher))
        .audit(open_audit_sink(&config.audit)?)
        .max_timeout_secs(config.dispatch.max_timeout_secs)
        .build()
        .map_err(|err| CliError::new(err.to_string()))
}

/// Opens the store described by a store section.
fn open_store(config: &StoreConfig) -> CliResult<Arc<dyn ConfigStore>> {
    match config.sqlite() {
        Some(sqlite) => {
            let store = SqliteConfigStore::new(&sqlite)
                .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryConfigStore::new())),
    }
}

/// Opens the configured audit sink.
fn open_audit_sink(config: &AuditConfig) -> CliResult<Arc<dyn RelayAuditSink>> {
    match config.sink {
        AuditSinkType::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkType::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkType::File => {
            let path = config.path.as_deref().ok_or_else(|| {
                CliError::new("audit.path is required for the file sink".to_string())
            })?;
            let sink = FileAuditSink::new(path).map_err(|err| {
                CliError::new(format!("failed to open audit log {}: {err}", path.display()))
            })?;
            Ok(Arc::new(sink))
        }
    }
}

// ============================================================================
// SECTION: Destination Commands
// ============================================================================

/// Executes a `destination` subcommand.
fn command_destination(broker: &RelayBroker, command: DestinationCommand) -> CliResult<Value> {
    match command {
        DestinationCommand::Write(command) => {
            let name = command.name.clone();
            let input = destination_input(command)?;
            let outcome =
                broker.write_destination(&name, input).map_err(|err| CliError::relay(&err))?;
            Ok(json!({ "name": name, "outcome": outcome }))
        }
        DestinationCommand::Read(DestinationNameArg {
            name,
        }) => {
            let destination =
                broker.read_destination(&name).map_err(|err| CliError::relay(&err))?;
            let mut value = to_json_value(&destination)?;
            if let Value::Object(map) = &mut value {
                map.insert("name".to_string(), Value::String(name));
                map.insert(
                    "timeout".to_string(),
                    Value::String(format_timeout(destination.timeout_secs)),
                );
            }
            Ok(value)
        }
        DestinationCommand::Delete(DestinationNameArg {
            name,
        }) => {
            broker.delete_destination(&name).map_err(|err| CliError::relay(&err))?;
            Ok(json!({ "name": name, "deleted": true }))
        }
        DestinationCommand::List => {
            let names = broker.list_destinations().map_err(|err| CliError::relay(&err))?;
            Ok(json!({ "destinations": names }))
        }
    }
}

/// Converts `destination write` arguments into a partial update.
///
/// Repeatable flags that were never passed leave the stored value untouched.
fn destination_input(command: DestinationWriteCommand) -> CliResult<DestinationInput> {
    let target_ca = match &command.target_ca {
        Some(path) => Some(read_pem_file(path)?),
        None => None,
    };
    Ok(DestinationInput {
        target_url: command.target_url,
        send_entity_id: command.send_entity_id,
        timeout_secs: command.timeout_secs,
        follow_redirects: command.follow_redirects,
        params: (!command.params.is_empty()).then_some(command.params),
        metadata: (!command.metadata.is_empty())
            .then(|| command.metadata.into_iter().collect::<BTreeMap<_, _>>()),
        target_ca,
    })
}

/// Renders a timeout in seconds as a human string such as `60s`.
fn format_timeout(timeout_secs: u64) -> String {
    format!("{timeout_secs}s")
}

// ============================================================================
// SECTION: Key Commands
// ============================================================================

/// Executes a `keys` subcommand.
fn command_keys(broker: &RelayBroker, command: KeysCommand) -> CliResult<Value> {
    match command {
        KeysCommand::Install(files) => {
            let certificate = read_pem_file(&files.certificate)?;
            let private_key = read_pem_file(&files.private_key)?;
            broker
                .install_signing_keys(&certificate, &private_key)
                .map_err(|err| CliError::relay(&err))?;
            Ok(json!({ "installed": "signing_keys" }))
        }
        KeysCommand::Certificate => {
            let certificate = broker.signing_certificate().map_err(|err| CliError::relay(&err))?;
            Ok(json!({ "certificate": certificate }))
        }
        KeysCommand::ClientIdentity(files) => {
            let certificate = read_pem_file(&files.certificate)?;
            let private_key = read_pem_file(&files.private_key)?;
            broker
                .install_client_identity(&certificate, &private_key)
                .map_err(|err| CliError::relay(&err))?;
            Ok(json!({ "installed": "client_identity" }))
        }
        KeysCommand::ClearClientIdentity => {
            broker.clear_client_identity().map_err(|err| CliError::relay(&err))?;
            Ok(json!({ "cleared": "client_identity" }))
        }
    }
}

// ============================================================================
// SECTION: Relay Commands
// ============================================================================

/// Executes `contact`.
fn command_contact(broker: &RelayBroker, command: ContactCommand) -> CliResult<Value> {
    let request = CallerRequest {
        request_id: command.request_id.unwrap_or_else(generated_request_id),
        entity_id: command.entity_id,
        params: command.params.into_iter().collect(),
    };
    let response = broker.contact(&command.name, &request).map_err(|err| CliError::relay(&err))?;
    let (body, body_encoding) = render_body(response.body);
    Ok(json!({
        "nonce": response.nonce.as_str(),
        "request_id": request.request_id,
        "status": response.status,
        "body": body,
        "body_encoding": body_encoding,
    }))
}

/// Renders a response body as text, falling back to base64 for non-UTF-8 bytes.
///
/// Returns the rendered body and its encoding label (`utf8` or `base64`).
fn render_body(body: Vec<u8>) -> (String, &'static str) {
    match String::from_utf8(body) {
        Ok(text) => (text, "utf8"),
        Err(err) => (BASE64.encode(err.as_bytes()), "base64"),
    }
}

/// Executes `ping`.
fn command_ping(broker: &RelayBroker, command: PingCommand) -> CliResult<Value> {
    let request_id = command.request_id.unwrap_or_else(generated_request_id);
    let report = broker.ping(&command.name, &request_id).map_err(|err| CliError::relay(&err))?;
    to_json_value(&report)
}

/// Executes `verify`.
fn command_verify(broker: &RelayBroker, command: &VerifyCommand) -> CliResult<Value> {
    let record =
        broker.fetch_verification(&command.nonce).map_err(|err| CliError::relay(&err))?;
    let Some(record) = record else {
        return Err(CliError::new(format!(
            "not_found: no verification record for nonce {}",
            command.nonce
        )));
    };
    let record = String::from_utf8(record).map_err(|_| {
        CliError::new("corrupt_record: verification record is not utf-8".to_string())
    })?;
    Ok(json!({ "nonce": command.nonce, "record": record }))
}

/// Generates a correlation identifier for commands run without one.
fn generated_request_id() -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_nanos());
    format!("cli-{nanos}")
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Parses a `key=value` argument.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected key=value, got {raw}"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err("key must be non-empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

/// Reads a PEM input file as UTF-8 text with a size limit.
fn read_pem_file(path: &Path) -> CliResult<String> {
    let bytes = read_bytes_with_limit(path, MAX_PEM_FILE_BYTES).map_err(|err| match err {
        ReadLimitError::Io(error) => {
            CliError::new(format!("failed to read {}: {error}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} exceeds size limit ({size} > {limit} bytes)",
            path.display()
        )),
    })?;
    String::from_utf8(bytes)
        .map_err(|_| CliError::new(format!("{} must be utf-8 PEM text", path.display())))
}

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Converts a serializable value into JSON.
fn to_json_value<T: Serialize>(value: &T) -> CliResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))
}

/// Writes a canonical JSON value to stdout.
fn write_json_value(value: &Value) -> CliResult<()> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
