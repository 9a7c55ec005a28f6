mod config;

use std::fs::File;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use regforms::{FormDefinition, FormShell, FormValidator, Submission, SubmitOutcome, TracingNotifier};
use std::sync::Arc;

use config::*;

#[derive(Debug, Parser)]
#[clap(author, version)]
struct Arguments {
    #[clap(short = 'f', long = "filename")]
    config: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the available forms.
    Forms,
    /// Validate a submission file and print its errors.
    Validate { form: String, input: String },
    /// Validate and submit a submission file. Ctrl-C cancels a pending submission.
    Submit { form: String, input: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args: Arguments = Arguments::parse();
    let config = match &args.config {
        Some(path) => match Configuration::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(?err, "couldn't read config file");
                return ExitCode::FAILURE;
            }
        },
        None => Configuration::default(),
    };

    match run(&config, args.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!(?err, "finished unsuccessfully");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Configuration, command: Commands) -> Result<bool> {
    let registry = config.registry()?;

    match command {
        Commands::Forms => {
            for form in registry.forms() {
                print_form(form);
            }
            Ok(true)
        }
        Commands::Validate { form, input } => {
            let form = registry.get(&form)?;
            let submission = read_submission(&input)?;

            let errors = FormValidator::new(form).validate(&submission);
            println!("{}", serde_json::to_string_pretty(&errors.flatten(&form.key_style))?);
            Ok(errors.is_empty())
        }
        Commands::Submit { form, input } => {
            let form = registry.get(&form)?.clone();
            let submission = read_submission(&input)?;
            let service = config.submission_service()?;

            let mut shell = FormShell::with_submission(form, submission)
                .with_notifier(Arc::new(TracingNotifier));
            let cancel = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::warn!(?err, "couldn't listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            };

            match shell.submit_until(service.as_ref(), cancel).await {
                SubmitOutcome::Accepted(ack) => {
                    println!("{}", serde_json::to_string_pretty(&ack)?);
                    Ok(true)
                }
                SubmitOutcome::Invalid(errors) => {
                    let flat = errors.flatten(&shell.form().key_style);
                    println!("{}", serde_json::to_string_pretty(&flat)?);
                    Ok(false)
                }
                SubmitOutcome::Failed(err) => {
                    eprintln!("{}", err);
                    Ok(false)
                }
                SubmitOutcome::Cancelled => {
                    eprintln!("submission cancelled");
                    Ok(false)
                }
            }
        }
    }
}

fn read_submission(path: &str) -> Result<Submission> {
    let file = File::open(path)?;
    Ok(serde_yaml::from_reader(file)?)
}

fn print_form(form: &FormDefinition) {
    println!("{} ({})", form.id, form.title);
    for field in &form.fields {
        println!("  {}", field.name);
    }
    if let Some(attachment) = &form.attachment {
        println!("  {} [file]", attachment.field);
    }
    if let Some(members) = &form.members {
        println!("  members: {}..={}", members.min, members.max);
    }
    if !form.perks.is_empty() {
        let perks: Vec<_> = form.perks.iter().map(|p| p.to_string()).collect();
        println!("  perks: {} (at most {} each)", perks.join(", "), form.slot_cap);
    }
}
