// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, TxHash};

/// Errors raised by a signing/transport handle
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Provider error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A contract call or transaction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Account the call is made from (and signed by, for transactions)
    pub from: Option<Address>,
    /// Contract address
    pub to: Address,
    /// ABI-encoded calldata
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// Receipt of an included transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Hash of the transaction
    pub tx_hash: TxHash,
    /// Block the transaction was included in
    pub block_number: u64,
    /// Whether execution succeeded
    pub success: bool,
    /// Sender of the transaction
    pub from: Address,
    /// Decoded revert reason, if execution failed and the provider exposed one
    pub revert_reason: Option<String>,
}

/// Handle to an external embedded wallet or node: signs and submits
/// transactions, performs read calls and polls receipts.
#[async_trait]
pub trait SigningTransport: Send + Sync {
    /// Get the name of this transport
    fn name(&self) -> &str;

    /// Accounts the signing session controls
    async fn request_addresses(&self) -> Result<Vec<Address>, TransportError>;

    /// Chain the signing session is currently connected to
    async fn chain_id(&self) -> Result<u64, TransportError>;

    /// Ask the session to switch to `chain_id`
    async fn switch_chain(&self, chain_id: u64) -> Result<(), TransportError>;

    /// Execute a read-only call and return the raw return data
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, TransportError>;

    /// Sign and submit a transaction; returns as soon as it is accepted for inclusion
    async fn send_transaction(&self, request: &CallRequest) -> Result<TxHash, TransportError>;

    /// Receipt of a transaction, `None` while it is still pending
    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TransactionReceipt>, TransportError>;

    /// Latest block number
    async fn block_number(&self) -> Result<u64, TransportError>;
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
