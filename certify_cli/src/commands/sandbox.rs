use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::{Cell, ContentArrangement, Table};
use serde::Serialize;

use crate::commands::{parse_address, print_json, GlobalOpts, Sandbox};
use crate::persistence::{PersistenceManager, SandboxState, SANDBOX_OWNER};

#[derive(Args)]
pub struct SandboxCommand {
    #[command(subcommand)]
    command: SandboxSubCommand,
}

#[derive(Subcommand)]
pub enum SandboxSubCommand {
    /// Deploy a fresh sandbox ledger
    Init(InitArgs),

    /// Summarize sandbox contents
    Show,

    /// Delete the sandbox state file
    Reset,
}

#[derive(Args)]
pub struct InitArgs {
    /// Owner of the credential ledger
    #[arg(long, default_value = SANDBOX_OWNER)]
    owner: String,

    /// Replace an existing sandbox
    #[arg(long)]
    force: bool,
}

#[derive(Serialize)]
struct SandboxSummary {
    state_file: String,
    identity_registry: String,
    credential_ledger: String,
    owner: String,
    users: usize,
    authorized_institutes: usize,
    requests_issued: u64,
    certificates_minted: u64,
    content_blobs: usize,
}

pub async fn run_sandbox_command(command: SandboxCommand, opts: &GlobalOpts) -> Result<()> {
    match command.command {
        SandboxSubCommand::Init(args) => init_sandbox(args, opts),
        SandboxSubCommand::Show => show_sandbox(opts),
        SandboxSubCommand::Reset => {
            PersistenceManager::new(opts.state_path.clone()).remove()?;
            println!("{} Removed {}", "✓".green(), opts.state_path.display());
            Ok(())
        }
    }
}

fn init_sandbox(args: InitArgs, opts: &GlobalOpts) -> Result<()> {
    let persistence = PersistenceManager::new(opts.state_path.clone());
    if persistence.exists() && !args.force {
        bail!(
            "A sandbox already exists at {} (use --force to replace it)",
            persistence.path().display()
        );
    }

    let owner = parse_address(&args.owner)?;
    let state = SandboxState::new(owner.clone());
    persistence.save(&state)?;

    println!("{} Sandbox ready at {}", "✓".green(), persistence.path().display());
    println!("  Identity registry: {}", state.ledger.identity_registry);
    println!("  Credential ledger: {}", state.ledger.credential_ledger);
    println!("  Owner:             {}", owner);
    Ok(())
}

fn show_sandbox(opts: &GlobalOpts) -> Result<()> {
    let sandbox = Sandbox::open(opts)?;
    let snapshot = sandbox.ledger.snapshot();

    let summary = SandboxSummary {
        state_file: opts.state_path.display().to_string(),
        identity_registry: snapshot.identity_registry.to_string(),
        credential_ledger: snapshot.credential_ledger.to_string(),
        owner: snapshot.owner.to_string(),
        users: snapshot.users.len(),
        authorized_institutes: snapshot.authorized.len(),
        requests_issued: snapshot.request_counter,
        certificates_minted: snapshot.token_counter,
        content_blobs: sandbox.store.len(),
    };

    if opts.json {
        return print_json(&summary);
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Field", "Value"]);
    for (field, value) in [
        ("State file", summary.state_file),
        ("Identity registry", summary.identity_registry),
        ("Credential ledger", summary.credential_ledger),
        ("Owner", summary.owner),
        ("Users", summary.users.to_string()),
        ("Authorized institutes", summary.authorized_institutes.to_string()),
        ("Requests issued", summary.requests_issued.to_string()),
        ("Certificates minted", summary.certificates_minted.to_string()),
        ("Content blobs", summary.content_blobs.to_string()),
    ] {
        table.add_row(vec![Cell::new(field), Cell::new(value)]);
    }
    println!("{table}");
    Ok(())
}
