use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tracing::debug;

use certify_core::ContentResolver;

use crate::commands::{print_json, GlobalOpts};

#[derive(Args)]
pub struct ContentCommand {
    #[command(subcommand)]
    command: ContentSubCommand,
}

#[derive(Subcommand)]
pub enum ContentSubCommand {
    /// Fetch a blob through the configured gateways
    Get(GetArgs),

    /// Upload a file to the configured content store
    Put(PutArgs),

    /// Report whether any configured gateway answers
    Probe,
}

#[derive(Args)]
pub struct GetArgs {
    /// Content identifier, ipfs:// URI or gateway URL
    reference: String,

    /// Write the blob here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
pub struct PutArgs {
    file: PathBuf,
}

pub async fn run_content_command(command: ContentCommand, opts: &GlobalOpts) -> Result<()> {
    let resolver = ContentResolver::from_config(&opts.config.content).context("Invalid content configuration")?;
    debug!("Using gateways {:?}", resolver.gateway_names());

    match command.command {
        ContentSubCommand::Get(args) => {
            let bytes = resolver.get(&args.reference).await?;
            match args.output {
                Some(path) => {
                    std::fs::write(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("{} Wrote {} bytes to {}", "✓".green(), bytes.len(), path.display());
                }
                None => println!("{}", String::from_utf8_lossy(&bytes)),
            }
        }
        ContentSubCommand::Put(args) => {
            let bytes = std::fs::read(&args.file).with_context(|| format!("Failed to read {}", args.file.display()))?;
            let cid = resolver.put(bytes).await?;
            if opts.json {
                return print_json(&serde_json::json!({ "cid": cid, "uri": cid.to_uri() }));
            }
            println!("{} {}", "✓".green(), cid.to_uri());
        }
        ContentSubCommand::Probe => {
            let available = resolver.is_available().await;
            if opts.json {
                return print_json(&serde_json::json!({ "gateways": resolver.gateway_names(), "available": available }));
            }
            for name in resolver.gateway_names() {
                println!("  {}", name);
            }
            if available {
                println!("{} At least one gateway is reachable", "✓".green());
            } else {
                println!("{} No gateway is reachable", "✗".red());
            }
        }
    }

    Ok(())
}
