use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use medanchor_core::{Address, OnboardingOutcome, PatientProfile, ProfileWrite, RequestContext};
use serde_json::{json, Value};

use super::{identity_json, print_identity, print_receipt};
use crate::app::App;

#[derive(Args, Debug)]
pub struct OnboardArgs {
    /// Signing account of the patient (or of the dependent, with --guardian)
    account: Address,

    /// Display name stored in the profile
    #[arg(long)]
    name: String,

    /// Date of birth, YYYY-MM-DD
    #[arg(long)]
    date_of_birth: Option<NaiveDate>,

    /// Onboard as a dependent of this guardian account
    #[arg(long)]
    guardian: Option<Address>,
}

fn outcome_json(ctx: &RequestContext, outcome: &OnboardingOutcome) -> Value {
    json!({
        "request_id": ctx.request_id,
        "registration": outcome.registration,
        "identity": outcome.identity.as_ref().map(identity_json),
        "profile": outcome.profile,
        "profile_update": outcome.profile_update,
    })
}

pub async fn run_onboard(app: &App, args: OnboardArgs, as_json: bool) -> Result<()> {
    let profile = PatientProfile {
        display_name: args.name,
        date_of_birth: args.date_of_birth,
    };

    let mut ctx = app.context(args.account);
    let outcome = match args.guardian {
        Some(guardian) => app.onboarding.onboard_dependent(&mut ctx, guardian, &profile).await,
        None => app.onboarding.onboard_patient(&mut ctx, &profile).await,
    }
    .with_context(|| format!("Onboarding of {} failed (request {})", args.account, ctx.request_id))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&ctx, &outcome))?);
        return Ok(());
    }

    if outcome.registration.was_already_registered {
        println!("{} already registered with DID {}", args.account, outcome.registration.did);
    } else {
        println!("{} {} -> {}", "Registered".green().bold(), args.account, outcome.registration.did);
        if let Some(receipt) = &outcome.registration.receipt {
            print_receipt("Transaction", receipt);
        }
    }

    match &outcome.profile {
        ProfileWrite::Saved => println!("{}", "Profile saved".green()),
        ProfileWrite::Failed { reason } => {
            println!("{} {}", "Profile not saved; the DID registration stands:".yellow().bold(), reason);
        }
    }

    if let Some(identity) = &outcome.identity {
        println!();
        print_identity(identity);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medanchor_core::AppConfig;

    #[tokio::test]
    async fn test_json_outcome_carries_recovery_phrase() {
        let app = App::build(AppConfig::default(), true).unwrap();
        let mut ctx = app.context(Address::repeat_byte(0xaa));
        let outcome = app
            .onboarding
            .onboard_patient(&mut ctx, &PatientProfile::new("Ada"))
            .await
            .unwrap();

        let identity = outcome.identity.as_ref().unwrap();
        let value = outcome_json(&ctx, &outcome);
        assert_eq!(value["identity"]["recovery_phrase"], identity.mnemonic.expose());
        assert_eq!(value["identity"]["address"], json!(identity.address));
    }
}
