use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use certify_core::{IdentityRecord, ProfileInput, ProfileMetadata, ProviderProfile, Role, StudentProfile};

use crate::commands::{print_json, GlobalOpts, Sandbox};

#[derive(Args)]
pub struct RegisterCommand {
    #[command(subcommand)]
    command: RegisterSubCommand,
}

#[derive(Subcommand)]
pub enum RegisterSubCommand {
    /// Register as a student
    Student(StudentArgs),

    /// Register as a credential provider
    Provider(ProviderArgs),
}

#[derive(Args)]
pub struct StudentArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,

    /// Institution-issued student identifier
    #[arg(long)]
    student_id: String,

    /// Additional profile fields as key=value
    #[arg(long = "extra", value_name = "KEY=VALUE")]
    extra: Vec<String>,
}

#[derive(Args)]
pub struct ProviderArgs {
    #[arg(long)]
    institution: String,

    #[arg(long)]
    accreditation: String,

    /// Accreditation document to upload
    #[arg(long)]
    document: PathBuf,
}

#[derive(Args)]
pub struct IdentityCommand {
    #[command(subcommand)]
    command: IdentitySubCommand,
}

#[derive(Subcommand)]
pub enum IdentitySubCommand {
    /// Show the registry record and profile of an address
    Show(ShowArgs),

    /// List registered users
    List(ListArgs),
}

#[derive(Args)]
pub struct ShowArgs {
    /// Address to show (defaults to --account)
    address: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only users with this role (student or provider)
    #[arg(long)]
    role: Option<Role>,
}

pub async fn run_register_command(command: RegisterCommand, opts: &GlobalOpts) -> Result<()> {
    let (role, profile) = match command.command {
        RegisterSubCommand::Student(args) => (
            Role::Student,
            ProfileInput::Student(StudentProfile {
                name: args.name,
                email: args.email,
                student_id: args.student_id,
                extra: parse_extra(&args.extra)?,
            }),
        ),
        RegisterSubCommand::Provider(args) => {
            let document = std::fs::read(&args.document)
                .with_context(|| format!("Failed to read {}", args.document.display()))?;
            (
                Role::Provider,
                ProfileInput::Provider(ProviderProfile {
                    institution_name: args.institution,
                    accreditation_number: args.accreditation,
                    document: Some(document),
                }),
            )
        }
    };

    let sandbox = Sandbox::open(opts)?;
    let record = sandbox
        .engine
        .registration()
        .register(&opts.session, role, profile)
        .await
        .context("Registration failed")?;
    sandbox.save()?;

    if opts.json {
        return print_json(&record);
    }
    println!(
        "{} Registered {} as {} (metadata {})",
        "✓".green(),
        record.address,
        record.role,
        record.metadata_pointer
    );
    Ok(())
}

pub async fn run_identity_command(command: IdentityCommand, opts: &GlobalOpts) -> Result<()> {
    let sandbox = Sandbox::open(opts)?;

    match command.command {
        IdentitySubCommand::Show(args) => {
            let address = opts.address_or_account(args.address.as_deref())?;
            let record = sandbox.engine.ledger().read_identity(&address).await?;
            let profile = sandbox.engine.registration().profile_of(&address).await?;

            if opts.json {
                return print_json(&serde_json::json!({ "identity": record, "profile": profile }));
            }
            print_identity(&record, profile.as_ref());
            Ok(())
        }
        IdentitySubCommand::List(args) => {
            let records = match args.role {
                Some(role) => sandbox.engine.directory().users_by_role(role).await?,
                None => {
                    let mut records = sandbox.engine.directory().users_by_role(Role::Student).await?;
                    records.extend(sandbox.engine.directory().users_by_role(Role::Provider).await?);
                    records
                }
            };

            if opts.json {
                return print_json(&records);
            }
            if records.is_empty() {
                println!("No registered users");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Address", "Role", "Metadata"]);
            for record in records {
                let color = if record.role == Role::Provider { Color::Cyan } else { Color::Reset };
                table.add_row(vec![
                    Cell::new(record.address.as_str()),
                    Cell::new(record.role).fg(color),
                    Cell::new(record.metadata_pointer),
                ]);
            }
            println!("{table}");
            Ok(())
        }
    }
}

fn print_identity(record: &IdentityRecord, profile: Option<&ProfileMetadata>) {
    println!("{}", record.address.as_str().bold());
    println!("  Role:     {}", record.role);
    println!("  Metadata: {}", record.metadata_pointer);

    match profile {
        Some(ProfileMetadata::Student(student)) => {
            println!("  Name:       {}", student.name);
            println!("  Email:      {}", student.email);
            println!("  Student ID: {}", student.student_id);
            for (key, value) in &student.extra {
                println!("  {}: {}", key, value);
            }
        }
        Some(ProfileMetadata::Provider(provider)) => {
            println!("  Institution:   {}", provider.institution_name);
            println!("  Accreditation: {}", provider.accreditation_number);
            println!("  Document:      {}", provider.document_pointer);
        }
        None => println!("  {}", "Profile unavailable from every gateway".yellow()),
    }
}

fn parse_extra(pairs: &[String]) -> Result<BTreeMap<String, serde_json::Value>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{}'", pair))?;
            // Values that parse as JSON keep their type, anything else is a string
            let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}
