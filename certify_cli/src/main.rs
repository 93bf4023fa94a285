mod commands;
mod persistence;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use certify_core::{CertifyConfig, Session};

use crate::commands::{
    authority::{run_authority_command, AuthorityCommand},
    certificates::{run_certificates_command, CertificatesCommand},
    content::{run_content_command, ContentCommand},
    identity::{run_identity_command, run_register_command, IdentityCommand, RegisterCommand},
    request::{run_request_command, RequestCommand},
    sandbox::{run_sandbox_command, SandboxCommand},
    parse_address, GlobalOpts,
};
use crate::persistence::get_default_persistence_path;

#[derive(Parser)]
#[command(name = "certify_cli")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Account that signs writes (0x-prefixed address)
    #[arg(long, global = true)]
    account: Option<String>,

    /// Configuration file (defaults and CERTIFY__* environment still apply)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Sandbox state file
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Create, inspect or reset the local sandbox ledger
    Sandbox(SandboxCommand),

    /// Register the active account as a student or provider
    Register(RegisterCommand),

    /// Look up registered identities
    Identity(IdentityCommand),

    /// Submit, review and resolve certificate requests
    Request(RequestCommand),

    /// Provider authorization managed by the ledger owner
    Authority(AuthorityCommand),

    /// Minted certificates and student lookup
    Certificates(CertificatesCommand),

    /// Fetch from gateways or upload to the configured content store
    Content(ContentCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = certify_core::logging::init_tracing("warn") {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = CertifyConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let session = match cli.account.as_deref() {
        Some(raw) => Session::connected(parse_address(raw)?),
        None => Session::disconnected(),
    };
    let state_path = match cli.state {
        Some(path) => path,
        None => get_default_persistence_path()?,
    };

    let opts = GlobalOpts {
        session,
        json: cli.json,
        config,
        state_path,
    };

    match cli.command {
        CliCommand::Sandbox(command) => run_sandbox_command(command, &opts).await,
        CliCommand::Register(command) => run_register_command(command, &opts).await,
        CliCommand::Identity(command) => run_identity_command(command, &opts).await,
        CliCommand::Request(command) => run_request_command(command, &opts).await,
        CliCommand::Authority(command) => run_authority_command(command, &opts).await,
        CliCommand::Certificates(command) => run_certificates_command(command, &opts).await,
        CliCommand::Content(command) => run_content_command(command, &opts).await,
    }
}
