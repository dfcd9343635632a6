pub mod anchor;
pub mod identity;
pub mod onboard;
pub mod registry;

use colored::Colorize;
use medanchor_core::{Identity, TransactionReceipt};
use serde_json::{json, Value};

/// Print a freshly minted identity, recovery phrase included
pub(crate) fn print_identity(identity: &Identity) {
    println!("{} {}", "DID:".bold(), identity.did_uri());
    println!("{} {}", "Address:".bold(), identity.address);
    println!();
    println!("{}", "Recovery phrase (write it down, it is not stored anywhere):".yellow().bold());
    println!("  {}", identity.mnemonic.expose());
}

/// JSON form of an identity minted by this run. The phrase is included since
/// it exists nowhere else.
pub(crate) fn identity_json(identity: &Identity) -> Value {
    json!({
        "did": identity.did_uri(),
        "address": identity.address,
        "recovery_phrase": identity.mnemonic.expose(),
    })
}

pub(crate) fn print_receipt(label: &str, receipt: &TransactionReceipt) {
    println!(
        "{} {} in block {}",
        format!("{}:", label).bold(),
        receipt.tx_hash,
        receipt.block_number
    );
}
