use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use certify_core::{CertificateRequest, RequestId, RequestStatus};

use crate::commands::{parse_address, print_json, short_address, GlobalOpts, Sandbox};

#[derive(Args)]
pub struct RequestCommand {
    #[command(subcommand)]
    command: RequestSubCommand,
}

#[derive(Subcommand)]
pub enum RequestSubCommand {
    /// Ask an institute to issue a certificate
    Submit(SubmitArgs),

    /// Show one request
    Show(IdArgs),

    /// Lifecycle status of a request
    Status(IdArgs),

    /// Pending requests addressed to an institute
    Pending(AddressArgs),

    /// Requests submitted by a student
    Mine(AddressArgs),

    /// Approve a pending request and mint the certificate
    Approve(ApproveArgs),

    /// Cancel a pending request
    Cancel(IdArgs),
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Institute that should issue the certificate
    institute: String,

    /// Certificate name
    name: String,

    /// Message to the institute
    #[arg(short, long, default_value = "")]
    message: String,
}

#[derive(Args)]
pub struct IdArgs {
    id: RequestId,
}

#[derive(Args)]
pub struct AddressArgs {
    /// Address to query (defaults to --account)
    address: Option<String>,
}

#[derive(Args)]
pub struct ApproveArgs {
    id: RequestId,

    /// Certificate type, e.g. Diploma
    #[arg(long = "type")]
    certificate_type: String,

    /// Token URI of the certificate metadata
    #[arg(long)]
    token_uri: String,

    /// Institution name recorded on the certificate
    #[arg(long)]
    institution: String,
}

pub async fn run_request_command(command: RequestCommand, opts: &GlobalOpts) -> Result<()> {
    let sandbox = Sandbox::open(opts)?;
    let issuance = sandbox.engine.issuance();

    match command.command {
        RequestSubCommand::Submit(args) => {
            let institute = parse_address(&args.institute)?;
            let id = issuance
                .request_issuance(&opts.session, &institute, &args.name, &args.message)
                .await
                .context("Request failed")?;
            sandbox.save()?;

            if opts.json {
                return print_json(&serde_json::json!({ "request_id": id }));
            }
            println!("{} Submitted request #{} to {}", "✓".green(), id, institute);
        }
        RequestSubCommand::Show(args) => {
            let request = sandbox.engine.ledger().read_certificate_request(args.id).await?;
            if opts.json {
                return print_json(&request);
            }
            print_requests(&[request]);
        }
        RequestSubCommand::Status(args) => {
            let status = issuance.request_status(args.id).await?;
            if opts.json {
                return print_json(&serde_json::json!({ "request_id": args.id, "status": status }));
            }
            let label = match status {
                RequestStatus::Pending => status.to_string().yellow(),
                RequestStatus::Approved => status.to_string().green(),
                RequestStatus::Cancelled => status.to_string().red(),
            };
            println!("Request #{}: {}", args.id, label);
        }
        RequestSubCommand::Pending(args) => {
            let institute = opts.address_or_account(args.address.as_deref())?;
            let requests = issuance.list_pending_for_institute(&institute).await?;
            if opts.json {
                return print_json(&requests);
            }
            if requests.is_empty() {
                println!("No pending requests for {}", institute);
            } else {
                print_requests(&requests);
            }
        }
        RequestSubCommand::Mine(args) => {
            let student = opts.address_or_account(args.address.as_deref())?;
            let requests = issuance.requests_submitted_by(&student).await?;
            if opts.json {
                return print_json(&requests);
            }
            if requests.is_empty() {
                println!("No requests submitted by {}", student);
            } else {
                print_requests(&requests);
            }
        }
        RequestSubCommand::Approve(args) => {
            let outcome = issuance
                .approve(
                    &opts.session,
                    args.id,
                    &args.certificate_type,
                    &args.token_uri,
                    &args.institution,
                )
                .await
                .context("Approval failed")?;
            sandbox.save()?;

            if opts.json {
                return print_json(&outcome);
            }
            match outcome.token_id {
                Some(token) => println!("{} Approved request #{}, minted token #{}", "✓".green(), outcome.request_id, token),
                None => println!("{} Approved request #{}", "✓".green(), outcome.request_id),
            }
        }
        RequestSubCommand::Cancel(args) => {
            issuance
                .cancel(&opts.session, args.id)
                .await
                .context("Cancellation failed")?;
            sandbox.save()?;
            println!("{} Cancelled request #{}", "✓".green(), args.id);
        }
    }

    Ok(())
}

fn print_requests(requests: &[CertificateRequest]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Name", "Student", "Institute", "Message", "State"]);

    for request in requests {
        let state = if request.approved {
            Cell::new("approved").fg(Color::Green)
        } else {
            Cell::new("pending").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(request.id),
            Cell::new(&request.name),
            Cell::new(short_address(&request.student)),
            Cell::new(short_address(&request.institute)),
            Cell::new(&request.message),
            state,
        ]);
    }
    println!("{table}");
}
