mod app;
mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medanchor_core::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{identity_generator, App};
use crate::commands::{
    anchor::{run_anchor_record, run_book_appointment, AnchorRecordArgs, BookAppointmentArgs},
    identity::{run_identity_command, IdentityCommand},
    onboard::{run_onboard, OnboardArgs},
    registry::{run_did, run_register, DidArgs, RegisterArgs},
};

#[derive(Parser, Debug)]
#[command(name = "medanchor")]
#[command(author, version, about = "Patient DID provisioning and on-chain anchoring", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); MEDANCHOR__* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run against an in-process simulated registry instead of the configured endpoint
    #[arg(long, global = true)]
    simulate: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Generate or recover mnemonic-backed identities (offline)
    Identity(IdentityCommand),

    /// Show the DID registered for an account
    Did(DidArgs),

    /// Make sure an account has an on-chain DID
    Register(RegisterArgs),

    /// Anchor a medical record reference against the account's DID
    AnchorRecord(AnchorRecordArgs),

    /// Anchor an appointment against the account's DID
    BookAppointment(BookAppointmentArgs),

    /// First-time onboarding of a patient or dependent
    Onboard(OnboardArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("medanchor_core=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Identity commands never touch the ledger
    let command = match cli.command {
        CliCommand::Identity(command) => {
            return run_identity_command(command, &identity_generator(&config)?);
        }
        other => other,
    };

    let app = App::build(config, cli.simulate)?;
    if app.is_simulated() {
        eprintln!("Running against a simulated registry; nothing is written to a real ledger");
    }

    match command {
        CliCommand::Did(args) => run_did(&app, args, cli.json).await,
        CliCommand::Register(args) => run_register(&app, args, cli.json).await,
        CliCommand::AnchorRecord(args) => run_anchor_record(&app, args, cli.json).await,
        CliCommand::BookAppointment(args) => run_book_appointment(&app, args, cli.json).await,
        CliCommand::Onboard(args) => run_onboard(&app, args, cli.json).await,
        CliCommand::Identity(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_book_appointment() {
        let cli = Cli::try_parse_from([
            "medanchor",
            "--simulate",
            "book-appointment",
            "0x0000000000000000000000000000000000000aaa",
            "--hospital",
            "1",
            "--doctor",
            "2",
            "--date",
            "2025-12-05",
            "--time",
            "14:30",
        ])
        .unwrap();

        assert!(cli.simulate);
        assert!(matches!(cli.command, CliCommand::BookAppointment(_)));
    }

    #[test]
    fn test_rejects_malformed_account() {
        assert!(Cli::try_parse_from(["medanchor", "did", "not-an-address"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["medanchor", "identity", "generate", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, CliCommand::Identity(_)));
    }
}
