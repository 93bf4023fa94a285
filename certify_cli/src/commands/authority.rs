use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use crate::commands::{parse_address, print_json, GlobalOpts, Sandbox};

#[derive(Args)]
pub struct AuthorityCommand {
    #[command(subcommand)]
    command: AuthoritySubCommand,
}

#[derive(Subcommand)]
pub enum AuthoritySubCommand {
    /// Registered providers grouped by authorization
    Providers,

    /// Authorize an institute to issue certificates (owner only)
    Authorize(InstituteArgs),

    /// Revoke an institute's authorization (owner only)
    Revoke(InstituteArgs),

    /// Check whether an institute is authorized
    Check(InstituteArgs),

    /// Show the credential ledger owner
    Owner,
}

#[derive(Args)]
pub struct InstituteArgs {
    institute: String,
}

pub async fn run_authority_command(command: AuthorityCommand, opts: &GlobalOpts) -> Result<()> {
    let sandbox = Sandbox::open(opts)?;
    let checker = sandbox.engine.authorization();

    match command.command {
        AuthoritySubCommand::Providers => {
            let classification = checker.classify_providers().await?;
            if opts.json {
                return print_json(&classification);
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Provider", "Status"]);
            for address in &classification.authorized {
                table.add_row(vec![Cell::new(address), Cell::new("authorized").fg(Color::Green)]);
            }
            for address in &classification.pending {
                table.add_row(vec![Cell::new(address), Cell::new("pending").fg(Color::Yellow)]);
            }
            for address in &classification.unresolved {
                table.add_row(vec![Cell::new(address), Cell::new("unresolved").fg(Color::Red)]);
            }
            println!("{table}");
        }
        AuthoritySubCommand::Authorize(args) => {
            set_authorization(&sandbox, opts, &args.institute, true).await?;
        }
        AuthoritySubCommand::Revoke(args) => {
            set_authorization(&sandbox, opts, &args.institute, false).await?;
        }
        AuthoritySubCommand::Check(args) => {
            let institute = parse_address(&args.institute)?;
            let authorized = checker.is_authorized(&institute).await?;
            if opts.json {
                return print_json(&serde_json::json!({ "institute": institute, "authorized": authorized }));
            }
            if authorized {
                println!("{} is {}", institute, "authorized".green());
            } else {
                println!("{} is {}", institute, "not authorized".yellow());
            }
        }
        AuthoritySubCommand::Owner => {
            let owner = sandbox.engine.ledger().owner().await?;
            if opts.json {
                return print_json(&serde_json::json!({ "owner": owner }));
            }
            println!("{}", owner);
        }
    }

    Ok(())
}

async fn set_authorization(sandbox: &Sandbox, opts: &GlobalOpts, raw: &str, authorized: bool) -> Result<()> {
    let institute = parse_address(raw)?;
    sandbox
        .engine
        .authorization()
        .set_authorization(&opts.session, &institute, authorized)
        .await
        .context("Authorization change rejected")?;
    sandbox.save()?;

    let verb = if authorized { "Authorized" } else { "Revoked" };
    println!("{} {} {}", "✓".green(), verb, institute);
    Ok(())
}
