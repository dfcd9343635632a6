use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use medanchor_core::IdentityGenerator;

use super::print_identity;

#[derive(Args, Debug)]
pub struct IdentityCommand {
    #[command(subcommand)]
    command: IdentitySubCommand,
}

#[derive(Subcommand, Debug)]
pub enum IdentitySubCommand {
    /// Generate a new 24-word identity
    Generate,

    /// Re-derive the DID of an existing recovery phrase
    Recover(RecoverArgs),
}

#[derive(Args, Debug)]
pub struct RecoverArgs {
    /// Recovery phrase, quoted as a single argument
    phrase: String,
}

pub fn run_identity_command(command: IdentityCommand, generator: &IdentityGenerator) -> Result<()> {
    match command.command {
        IdentitySubCommand::Generate => {
            let identity = generator.generate().context("Failed to generate identity")?;
            println!("{} ({})", "Generated new identity".green().bold(), generator.path());
            print_identity(&identity);
        }
        IdentitySubCommand::Recover(args) => {
            let identity = generator.recover(&args.phrase).context("Failed to recover identity")?;
            println!("{} ({})", "Recovered identity".green().bold(), generator.path());
            println!("{} {}", "DID:".bold(), identity.did_uri());
            println!("{} {}", "Address:".bold(), identity.address);
        }
    }
    Ok(())
}
