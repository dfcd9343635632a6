use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use medanchor_core::{Address, Identity, RegistrationOutcome};
use serde_json::{json, Value};

use super::{identity_json, print_identity, print_receipt};
use crate::app::App;

#[derive(Args, Debug)]
pub struct DidArgs {
    /// Account to look up
    account: Address,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Signing account to register
    account: Address,

    /// DID to register; a new identity is generated when omitted
    #[arg(long)]
    did: Option<Address>,

    /// Register through the dependent entry point
    #[arg(long)]
    dependent: bool,
}

pub async fn run_did(app: &App, args: DidArgs, as_json: bool) -> Result<()> {
    let did = app
        .gateway
        .read_did(args.account)
        .await
        .with_context(|| format!("Failed to read DID of {}", args.account))?;

    if as_json {
        println!(
            "{}",
            json!({ "account": args.account, "did": did, "registered": !did.is_zero() })
        );
    } else if did.is_zero() {
        println!("{} has no registered DID", args.account);
    } else {
        println!("{} {}", "DID:".bold(), did);
    }
    Ok(())
}

fn outcome_json(outcome: &RegistrationOutcome, identity: Option<&Identity>) -> Value {
    json!({
        "outcome": outcome,
        "identity": identity.map(identity_json),
    })
}

pub async fn run_register(app: &App, args: RegisterArgs, as_json: bool) -> Result<()> {
    let (candidate, identity) = match args.did {
        Some(did) => (did, None),
        None => {
            let identity = app.generator.generate().context("Failed to generate identity")?;
            (identity.address, Some(identity))
        }
    };

    let mut ctx = app.context(args.account);
    let outcome = app
        .registration
        .ensure_registered_reconciled(&mut ctx, candidate, args.dependent)
        .await
        .with_context(|| format!("Registration of {} failed (request {})", args.account, ctx.request_id))?;

    // Only an identity that actually became the DID is worth handing out
    let identity = identity.filter(|identity| identity.address == outcome.did);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome, identity.as_ref()))?);
        return Ok(());
    }

    if outcome.was_already_registered {
        println!("{} already registered with DID {}", args.account, outcome.did);
        if outcome.has_candidate_mismatch() {
            println!("{}", "The requested DID was not written; the existing one is kept.".yellow());
        }
        return Ok(());
    }

    println!("{} {} -> {}", "Registered".green().bold(), args.account, outcome.did);
    if let Some(receipt) = &outcome.receipt {
        print_receipt("Transaction", receipt);
    }
    if let Some(identity) = identity {
        println!();
        print_identity(&identity);
    }
    Ok(())
}
