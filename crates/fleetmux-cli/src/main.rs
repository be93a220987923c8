// fleetmux-cli/src/main.rs
// ============================================================================
// Module: Fleetmux CLI Entry Point
// Description: Command dispatcher for gateway and configuration workflows.
// Purpose: Provide a safe CLI for serving the gateway and inspecting setup.
// Dependencies: clap, fleetmux-backend, fleetmux-config, fleetmux-core,
//               fleetmux-gateway, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The Fleetmux CLI starts the HTTP gateway and offers offline utilities for
//! validating configuration and inspecting the command surface. Inputs are
//! untrusted and validated by the configuration layer before any listener is
//! bound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use fleetmux_backend::FsServerBackend;
use fleetmux_config::AuthMode;
use fleetmux_config::FleetmuxConfig;
use fleetmux_core::CallerId;
use fleetmux_core::CapabilityRegistry;
use fleetmux_core::ServerBackend;
use fleetmux_gateway::GatewayServer;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fleetmux", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Fleetmux HTTP gateway.
    Serve(ServeCommand),
    /// Load and validate a configuration file without serving.
    CheckConfig(CheckConfigCommand),
    /// Print the controller and instance command surface.
    Capabilities,
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to fleetmux.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Configuration for the `check-config` command.
#[derive(Args, Debug)]
struct CheckConfigCommand {
    /// Optional config file path (defaults to fleetmux.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("fleetmux {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::CheckConfig(command) => command_check_config(&command),
        Commands::Capabilities => command_capabilities(),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = FleetmuxConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load configuration: {err}")))?;
    warn_auth_posture(&config)?;
    let bind = config.server.bind.clone();
    let server = tokio::task::spawn_blocking(move || GatewayServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("gateway init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("gateway init failed: {err}")))?;
    write_stderr_line(&format!("fleetmux gateway listening on {bind}"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server
        .serve()
        .await
        .map_err(|err| CliError::new(format!("gateway failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Emits posture warnings for the selected auth mode.
fn warn_auth_posture(config: &FleetmuxConfig) -> CliResult<()> {
    if config.server.auth.mode == AuthMode::LocalOnly {
        write_stderr_line("warning: local-only auth; remote peers will be rejected")
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Check-Config Command
// ============================================================================

/// Executes the `check-config` command.
fn command_check_config(command: &CheckConfigCommand) -> CliResult<ExitCode> {
    let config = FleetmuxConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("configuration invalid: {err}")))?;
    let mode = match config.server.auth.mode {
        AuthMode::LocalOnly => "local_only",
        AuthMode::SessionToken => "session_token",
    };
    write_stdout_line(&format!(
        "configuration OK: bind {}, auth {}, fleet root {}",
        config.server.bind, mode, config.fleet.base_root
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Capabilities Command
// ============================================================================

/// Executes the `capabilities` command.
fn command_capabilities() -> CliResult<ExitCode> {
    // Capability descriptors are static; the backend root is never touched.
    let backend = FsServerBackend::new(CallerId::from("root"), Path::new("."));
    print_registry("controller", &CapabilityRegistry::build(backend.controller_capabilities()))?;
    print_registry("instance", &CapabilityRegistry::build(backend.instance_capabilities()))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints one capability registry to stdout.
fn print_registry(target: &str, registry: &CapabilityRegistry) -> CliResult<()> {
    write_stdout_line(&format!("{target} operations:"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    for name in registry.operation_names() {
        let mut line = format!("  {name}");
        if let Some(spec) = registry.operation(name) {
            for param in &spec.params {
                if param.required {
                    line.push_str(&format!(" <{}>", param.name));
                } else {
                    line.push_str(&format!(" [{}]", param.name));
                }
            }
        }
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    write_stdout_line(&format!("{target} attributes:"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    for name in registry.attribute_names() {
        let marker = if registry.is_writable(name) { "" } else { " (read-only)" };
        write_stdout_line(&format!("  {name}{marker}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Prints top-level help when no subcommand is supplied.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
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

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================
