// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::transport::TransportError;
use crate::types::{Address, TxHash};

/// A provider failure exactly as reported, before classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLedgerError {
    /// Provider error code (EIP-1193 / JSON-RPC), when one was given
    pub code: Option<i64>,
    /// Provider error message
    pub message: String,
}

impl RawLedgerError {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl fmt::Display for RawLedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors surfaced by the ledger gateway
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Ledger unreachable: {0}")]
    LedgerUnreachable(String),

    #[error("Wrong network: signing session is on chain {actual}, expected {expected}")]
    WrongNetwork { expected: u64, actual: u64 },

    #[error("No active signing session for account {0}")]
    NoSigningSession(Address),

    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(RawLedgerError),

    #[error("Transaction {tx_hash} reverted: {reason}")]
    TransactionReverted { tx_hash: TxHash, reason: String },

    #[error("Transaction {tx_hash} not confirmed within {waited:?}")]
    TransactionTimeout { tx_hash: TxHash, waited: Duration },

    #[error("Invalid ledger response: {0}")]
    InvalidResponse(String),
}

/// JSON-RPC code nodes return for a reverted `eth_call`
const EXECUTION_REVERTED: i64 = 3;

fn is_revert(code: i64, message: &str) -> bool {
    code == EXECUTION_REVERTED || message.to_lowercase().contains("revert")
}

impl LedgerError {
    /// Map a transport failure on a read or polling path. A reverted call
    /// reached the node, so it is reported as a bad response rather than as
    /// a connectivity failure.
    pub(crate) fn from_read(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(msg) => LedgerError::LedgerUnreachable(msg),
            TransportError::Rpc { code, message } if is_revert(code, &message) => {
                LedgerError::InvalidResponse(format!("call reverted ({}): {}", code, message))
            }
            TransportError::Rpc { code, message } => {
                LedgerError::LedgerUnreachable(format!("provider error {}: {}", code, message))
            }
            TransportError::InvalidResponse(msg) => LedgerError::InvalidResponse(msg),
        }
    }

    /// Map a transport failure while submitting a transaction
    pub(crate) fn from_submission(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(msg) => LedgerError::LedgerUnreachable(msg),
            TransportError::Rpc { code, message } => {
                LedgerError::SubmissionFailed(RawLedgerError::new(Some(code), message))
            }
            TransportError::InvalidResponse(msg) => LedgerError::InvalidResponse(msg),
        }
    }

    /// Raw provider failure carried by this error, if it is one callers should classify
    pub fn raw(&self) -> Option<RawLedgerError> {
        match self {
            LedgerError::SubmissionFailed(raw) => Some(raw.clone()),
            LedgerError::TransactionReverted { reason, .. } => Some(RawLedgerError::from_message(reason.clone())),
            _ => None,
        }
    }

    /// Hash of the transaction this error concerns, if any
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            LedgerError::TransactionReverted { tx_hash, .. }
            | LedgerError::TransactionTimeout { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}
