// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use std::fmt;

use thiserror::Error;

use crate::types::Address;

/// Errors that can occur while generating or recovering an identity
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Secure entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),
}

/// Mnemonic phrase backing an identity. It is the only recovery mechanism,
/// so it is never logged and its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryPhrase(String);

impl RecoveryPhrase {
    pub(crate) fn new(phrase: String) -> Self {
        Self(phrase)
    }

    /// Plain text of the phrase, for handing to the user
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

impl fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoveryPhrase([{} words redacted])", self.word_count())
    }
}

/// A mnemonic-backed identity; `address` is the DID registered on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Secret phrase the address was derived from
    pub mnemonic: RecoveryPhrase,
    /// Address derived from the mnemonic, used as the DID
    pub address: Address,
}

impl Identity {
    /// The identity as a `did:ethr` URI
    pub fn did_uri(&self) -> String {
        format!("did:ethr:{}", self.address)
    }
}
