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
// fabricgate-cli/src/main.rs
// ============================================================================
// Module: Fabricgate CLI Entry Point
// Description: Command dispatcher for the control plane's stdio serve loop
//              and operator commands.
// Purpose: Provide a single binary for running the process and inspecting
//          its on-disk state without a log aggregator.
// Dependencies: clap, fabricgate-cli, fabricgate-config, fabricgate-core, tokio.
// ============================================================================

//! ## Overview
//! `fabricgate serve` runs the stdio request loop; `token`, `tenant`,
//! `audit`, and `config` give an operator direct access to C2/C4/C7/C11
//! without going through a request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use fabricgate_cli::commands;
use fabricgate_cli::serve;
use fabricgate_config::AppConfig;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fabricgate", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the stdio request loop.
    Serve(ServeArgs),
    /// Capability-token operations.
    Token {
        /// Selected token subcommand.
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Tenant directory operations.
    Tenant {
        /// Selected tenant subcommand.
        #[command(subcommand)]
        command: TenantCommand,
    },
    /// Audit log operations.
    Audit {
        /// Selected audit subcommand.
        #[command(subcommand)]
        command: AuditCommand,
    },
    /// Configuration operations.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeArgs {
    /// Optional config file path (defaults to control-plane.toml or env
    /// override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Mint a capability token bypassing API-key exchange.
    Mint(TokenMintArgs),
    /// Verify a token and print its decoded contents.
    Inspect(TokenInspectArgs),
}

/// Arguments for `token mint`.
#[derive(Args, Debug)]
struct TokenMintArgs {
    /// Subject the token is minted for.
    #[arg(long)]
    user: String,
    /// Owning tenant.
    #[arg(long)]
    tenant: String,
    /// Token scope label (`user`, `tenant`, `admin`).
    #[arg(long, default_value = "user")]
    scope: String,
    /// Resource pattern to grant (repeatable); each is granted every action.
    #[arg(long = "capability", value_name = "RESOURCE")]
    capabilities: Vec<String>,
    /// Token lifetime, in seconds.
    #[arg(long, default_value_t = 3600)]
    ttl_seconds: i64,
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `token inspect`.
#[derive(Args, Debug)]
struct TokenInspectArgs {
    /// The token string to verify.
    token: String,
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Tenant subcommands.
#[derive(Subcommand, Debug)]
enum TenantCommand {
    /// Create a tenant's directory tree.
    Init(TenantInitArgs),
}

/// Arguments for `tenant init`.
#[derive(Args, Debug)]
struct TenantInitArgs {
    /// Tenant domain to initialize.
    tenant: String,
    /// Filesystem root every tenant is nested under.
    #[arg(long, value_name = "DIR", default_value = "./data")]
    data_root: PathBuf,
}

/// Audit subcommands.
#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Print a tenant's audit records to stdout.
    Tail(AuditTailArgs),
}

/// Arguments for `audit tail`.
#[derive(Args, Debug)]
struct AuditTailArgs {
    /// Tenant domain to read.
    tenant: String,
    /// Filesystem root every tenant is nested under.
    #[arg(long, value_name = "DIR", default_value = "./data")]
    data_root: PathBuf,
    /// Only print the most recent N records.
    #[arg(long)]
    limit: Option<usize>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file.
    Check(ConfigCheckArgs),
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckArgs {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
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
    match cli.command {
        Commands::Serve(args) => command_serve(args).await,
        Commands::Token { command } => command_token(command),
        Commands::Tenant { command } => command_tenant(command),
        Commands::Audit { command } => command_audit(command),
        Commands::Config { command } => command_config(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(args: ServeArgs) -> CliResult<ExitCode> {
    let config = AppConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let key_bytes = config
        .signing
        .resolve_key()
        .map_err(|err| CliError::new(format!("failed to resolve signing key: {err}")))?;
    let signing_key = fabricgate_core::core::token::SigningKey::new(key_bytes);

    serve::run(&config.server.data_root, &signing_key)
        .await
        .map_err(|err| CliError::new(format!("serve loop failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Token Commands
// ============================================================================

/// Dispatches token subcommands.
fn command_token(command: TokenCommand) -> CliResult<ExitCode> {
    match command {
        TokenCommand::Mint(args) => command_token_mint(&args),
        TokenCommand::Inspect(args) => command_token_inspect(&args),
    }
}

/// Executes `token mint`.
fn command_token_mint(args: &TokenMintArgs) -> CliResult<ExitCode> {
    let token = commands::token_mint(
        args.config.as_deref(),
        &args.user,
        &args.tenant,
        &args.scope,
        &args.capabilities,
        args.ttl_seconds,
    )
    .map_err(|err| CliError::new(err.to_string()))?;
    write_stdout_line(&token).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `token inspect`.
fn command_token_inspect(args: &TokenInspectArgs) -> CliResult<ExitCode> {
    let rendered = commands::token_inspect(args.config.as_deref(), &args.token)
        .map_err(|err| CliError::new(err.to_string()))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Tenant Commands
// ============================================================================

/// Dispatches tenant subcommands.
fn command_tenant(command: TenantCommand) -> CliResult<ExitCode> {
    match command {
        TenantCommand::Init(args) => {
            let message = commands::tenant_init(&args.data_root, &args.tenant)
                .map_err(|err| CliError::new(err.to_string()))?;
            write_stdout_line(&message).map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Audit Commands
// ============================================================================

/// Dispatches audit subcommands.
fn command_audit(command: AuditCommand) -> CliResult<ExitCode> {
    match command {
        AuditCommand::Tail(args) => {
            let rendered = commands::audit_tail(&args.data_root, &args.tenant, args.limit)
                .map_err(|err| CliError::new(err.to_string()))?;
            if !rendered.is_empty() {
                write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check(args) => match commands::config_check(args.config.as_deref()) {
            Ok(rendered) => {
                write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                write_stderr_line(&err.to_string())
                    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
                Ok(ExitCode::FAILURE)
            }
        },
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    use std::io::Write as _;
    writeln!(std::io::stdout(), "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    use std::io::Write as _;
    writeln!(std::io::stderr(), "{message}")
}

/// Formats an output error message naming which stream failed to write.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
