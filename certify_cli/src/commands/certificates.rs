use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use certify_core::{Certificate, CertificateView, Role, TokenId};

use crate::commands::{print_json, short_address, GlobalOpts, Sandbox};

#[derive(Args)]
pub struct CertificatesCommand {
    #[command(subcommand)]
    command: CertificatesSubCommand,
}

#[derive(Subcommand)]
pub enum CertificatesSubCommand {
    /// Certificates minted to a student
    Owned(OwnedArgs),

    /// Check a certificate against its issuer's current standing
    Verify(VerifyArgs),

    /// Find a student by institution-issued student id
    FindStudent(FindStudentArgs),
}

#[derive(Args)]
pub struct OwnedArgs {
    /// Student address (defaults to --account)
    address: Option<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    token_id: TokenId,
}

#[derive(Args)]
pub struct FindStudentArgs {
    student_id: String,
}

pub async fn run_certificates_command(command: CertificatesCommand, opts: &GlobalOpts) -> Result<()> {
    let sandbox = Sandbox::open(opts)?;
    let directory = sandbox.engine.directory();

    match command.command {
        CertificatesSubCommand::Owned(args) => {
            let owner = opts.address_or_account(args.address.as_deref())?;
            let views = directory.certificates_owned_by(&owner).await?;
            if opts.json {
                return print_json(&views);
            }
            if views.is_empty() {
                println!("{} holds no certificates", owner);
            } else {
                print_certificates(&views);
            }
        }
        CertificatesSubCommand::Verify(args) => {
            let verification = directory.verify_certificate(args.token_id).await?;
            if opts.json {
                return print_json(&verification);
            }

            print_certificates(std::slice::from_ref(&verification.view));
            let role = verification
                .issuer_role
                .map_or_else(|| "unknown".to_string(), |role| role.to_string());
            let authorized = verification
                .issuer_authorized
                .map_or_else(|| "unknown".to_string(), |flag| flag.to_string());
            println!("Issuer role: {}  authorized: {}", role, authorized);

            if verification.is_trusted() {
                println!("{} Issued by an authorized provider", "✓".green());
            } else if verification.issuer_role != Some(Role::Provider) {
                println!("{} Issuer is not a registered provider", "✗".red());
            } else {
                println!("{} Issuer is no longer authorized", "!".yellow());
            }
        }
        CertificatesSubCommand::FindStudent(args) => {
            let found = directory.find_student_by_external_id(&args.student_id).await?;
            if opts.json {
                return print_json(&found);
            }
            println!("{} {}", found.metadata.student_id.bold(), found.address);
            println!("  Name:  {}", found.metadata.name);
            println!("  Email: {}", found.metadata.email);
        }
    }

    Ok(())
}

fn issue_date(certificate: &Certificate) -> String {
    certificate
        .issued_at()
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| certificate.issue_date.to_string())
}

fn print_certificates(views: &[CertificateView]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Token", "Name", "Type", "Institute", "Issued", "Issuer", "Metadata"]);

    for view in views {
        let certificate = &view.certificate;
        let metadata = if view.metadata.is_some() {
            Cell::new("loaded").fg(Color::Green)
        } else {
            Cell::new("unavailable").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(certificate.id),
            Cell::new(&certificate.name),
            Cell::new(&certificate.certificate_type),
            Cell::new(&certificate.institute),
            Cell::new(issue_date(certificate)),
            Cell::new(short_address(&certificate.issuer)),
            metadata,
        ]);
    }
    println!("{table}");
}
