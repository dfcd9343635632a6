use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::Args;
use colored::Colorize;
use medanchor_core::{Address, AnchorReceipt};
use serde_json::{json, Value};

use super::{identity_json, print_identity, print_receipt};
use crate::app::App;

#[derive(Args, Debug)]
pub struct AnchorRecordArgs {
    /// Signing account the record belongs to
    account: Address,

    /// Content hash of the off-chain record (e.g. an IPFS CID)
    content_hash: String,

    /// Record metadata, usually a JSON document
    #[arg(long, default_value = "{}")]
    metadata: String,
}

#[derive(Args, Debug)]
pub struct BookAppointmentArgs {
    /// Signing account of the patient
    account: Address,

    #[arg(long)]
    hospital: u64,

    #[arg(long)]
    doctor: u64,

    /// Appointment date, YYYY-MM-DD
    #[arg(long)]
    date: NaiveDate,

    /// Appointment time, HH:MM
    #[arg(long, value_parser = parse_time)]
    time: NaiveTime,
}

fn parse_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M")
}

pub async fn run_anchor_record(app: &App, args: AnchorRecordArgs, as_json: bool) -> Result<()> {
    let mut ctx = app.context(args.account);
    let receipt = app
        .anchoring
        .anchor_record(&mut ctx, &args.content_hash, &args.metadata)
        .await
        .with_context(|| format!("Failed to anchor record for {} (request {})", args.account, ctx.request_id))?;

    report(&receipt, as_json)
}

pub async fn run_book_appointment(app: &App, args: BookAppointmentArgs, as_json: bool) -> Result<()> {
    let date = args.date.format("%Y-%m-%d").to_string();
    let time = args.time.format("%H:%M").to_string();

    let mut ctx = app.context(args.account);
    let receipt = app
        .anchoring
        .anchor_appointment(&mut ctx, args.hospital, args.doctor, &date, &time)
        .await
        .with_context(|| format!("Failed to book appointment for {} (request {})", args.account, ctx.request_id))?;

    report(&receipt, as_json)
}

fn receipt_json(receipt: &AnchorReceipt) -> Value {
    json!({
        "did": receipt.did,
        "artifact": receipt.artifact,
        "receipt": receipt.receipt,
        "registration": receipt.registration,
        "provisioned_identity": receipt.provisioned_identity.as_ref().map(identity_json),
    })
}

fn report(receipt: &AnchorReceipt, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&receipt_json(receipt))?);
        return Ok(());
    }

    if let Some(registration) = &receipt.registration {
        println!("{} {}", "Registered new DID".green().bold(), registration.did);
        if let Some(tx) = &registration.receipt {
            print_receipt("Registration", tx);
        }
    }

    println!("{} {} against {}", "Anchored".green().bold(), receipt.artifact, receipt.did);
    print_receipt("Transaction", &receipt.receipt);

    if let Some(identity) = &receipt.provisioned_identity {
        println!();
        print_identity(identity);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medanchor_core::AppConfig;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("14:30").unwrap(), NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert!(parse_time("2pm").is_err());
    }

    #[tokio::test]
    async fn test_json_report_carries_recovery_phrase() {
        let app = App::build(AppConfig::default(), true).unwrap();
        let account = Address::repeat_byte(0xaa);

        let mut ctx = app.context(account);
        let first = app.anchoring.anchor_record(&mut ctx, "bafy-record-1", "{}").await.unwrap();
        let identity = first.provisioned_identity.clone().unwrap();

        let value = receipt_json(&first);
        assert_eq!(
            value["provisioned_identity"]["recovery_phrase"],
            identity.mnemonic.expose()
        );
        assert_eq!(value["provisioned_identity"]["did"], identity.did_uri());

        // Nothing minted on the second write, so no phrase to report
        let mut ctx = app.context(account);
        let second = app.anchoring.anchor_record(&mut ctx, "bafy-record-2", "{}").await.unwrap();
        assert!(receipt_json(&second)["provisioned_identity"].is_null());
    }
}
