// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::coordinator::classifier::{ErrorClassifier, ErrorKind};
use crate::coordinator::context::{FlowStage, RequestContext};
use crate::ledger::{LedgerError, LedgerGateway, TransactionReceipt};
use crate::types::{Address, TxHash};

/// Errors from ensuring an account has an on-chain DID
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Registration failed ({kind}): {reason}")]
    RegistrationFailed {
        kind: ErrorKind,
        reason: String,
        tx_hash: Option<TxHash>,
    },

    #[error("Candidate DID must not be the zero address")]
    InvalidCandidate,
}

impl RegistrationError {
    /// Classified kind, for failures that have one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            RegistrationError::RegistrationFailed { kind, .. } => Some(*kind),
            RegistrationError::Ledger(LedgerError::WrongNetwork { .. }) => Some(ErrorKind::NetworkMismatch),
            _ => None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind().map(|kind| kind.is_recoverable()).unwrap_or(false)
    }

    /// Whether re-reading the DID might show the registration landed anyway
    fn needs_reconciliation(&self) -> bool {
        self.is_recoverable() || matches!(self, RegistrationError::Ledger(LedgerError::TransactionTimeout { .. }))
    }
}

/// Result of ensuring an account is registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    /// DID on record for the account after the call
    pub did: Address,
    /// The account already had a DID; nothing was written
    pub was_already_registered: bool,
    /// Candidate that was not used because a different DID was already on record
    pub discarded_candidate: Option<Address>,
    /// Receipt of the registration transaction, when this call wrote one
    pub receipt: Option<TransactionReceipt>,
}

impl RegistrationOutcome {
    fn existing(did: Address, candidate: Address) -> Self {
        Self {
            did,
            was_already_registered: true,
            discarded_candidate: (did != candidate).then_some(candidate),
            receipt: None,
        }
    }

    pub fn has_candidate_mismatch(&self) -> bool {
        self.discarded_candidate.is_some()
    }
}

/// Idempotent "make sure this account has an on-chain DID"
pub struct RegistrationCoordinator {
    gateway: Arc<LedgerGateway>,
    classifier: Arc<ErrorClassifier>,
}

impl RegistrationCoordinator {
    pub fn new(gateway: Arc<LedgerGateway>, classifier: Arc<ErrorClassifier>) -> Self {
        Self { gateway, classifier }
    }

    pub fn gateway(&self) -> &Arc<LedgerGateway> {
        &self.gateway
    }

    /// Register `candidate` for the context's account unless a DID is already on record.
    ///
    /// An existing DID is never overwritten; if it differs from `candidate`
    /// the candidate is reported back in `discarded_candidate`.
    pub async fn ensure_registered(
        &self,
        ctx: &mut RequestContext,
        candidate: Address,
        is_dependent: bool,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        if candidate.is_zero() {
            return Err(RegistrationError::InvalidCandidate);
        }

        let account = ctx.account;
        let result = self.register(ctx, account, candidate, is_dependent).await;

        match &result {
            Ok(_) => ctx.advance(FlowStage::Registered),
            Err(e) => {
                warn!(request_id = %ctx.request_id, "Registration of {} failed: {}", account, e);
                ctx.advance(FlowStage::Failed);
            }
        }

        result
    }

    /// [`ensure_registered`](Self::ensure_registered), reconciling a lost race or
    /// a confirmation timeout by re-reading the DID before giving up
    pub async fn ensure_registered_reconciled(
        &self,
        ctx: &mut RequestContext,
        candidate: Address,
        is_dependent: bool,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let err = match self.ensure_registered(ctx, candidate, is_dependent).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.needs_reconciliation() => e,
            Err(e) => return Err(e),
        };

        let did = self.gateway.read_did(ctx.account).await?;
        if did.is_zero() {
            return Err(err);
        }

        info!(
            request_id = %ctx.request_id,
            "Registration for {} reconciled after '{}': DID {} is on record",
            ctx.account, err, did
        );
        ctx.advance(FlowStage::Registered);
        Ok(RegistrationOutcome::existing(did, candidate))
    }

    async fn register(
        &self,
        ctx: &mut RequestContext,
        account: Address,
        candidate: Address,
        is_dependent: bool,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let existing = self.gateway.read_did(account).await?;
        if !existing.is_zero() {
            if existing != candidate {
                warn!(
                    request_id = %ctx.request_id,
                    "Account {} already registered with DID {}; discarding candidate {}",
                    account, existing, candidate
                );
            } else {
                info!(request_id = %ctx.request_id, "Account {} already registered with DID {}", account, existing);
            }
            return Ok(RegistrationOutcome::existing(existing, candidate));
        }

        self.gateway.ensure_network().await?;

        ctx.advance(FlowStage::AwaitingRegistration);
        let submitted = if is_dependent {
            self.gateway.write_register_dependent(account, candidate).await
        } else {
            self.gateway.write_register_patient(account, candidate).await
        };
        let pending = submitted.map_err(|e| self.classify(e))?;
        ctx.record_submission(&pending);

        let receipt = self
            .gateway
            .await_confirmation(&pending)
            .await
            .map_err(|e| self.classify(e))?;

        info!(
            request_id = %ctx.request_id,
            tx_hash = %receipt.tx_hash,
            "Registered DID {} for {} in block {}",
            candidate, account, receipt.block_number
        );

        Ok(RegistrationOutcome {
            did: candidate,
            was_already_registered: false,
            discarded_candidate: None,
            receipt: Some(receipt),
        })
    }

    fn classify(&self, err: LedgerError) -> RegistrationError {
        match err {
            LedgerError::SubmissionFailed(_) | LedgerError::TransactionReverted { .. } => {
                match self.classifier.classify_ledger_error(&err) {
                    Some((kind, reason)) => RegistrationError::RegistrationFailed {
                        kind,
                        reason,
                        tx_hash: err.tx_hash(),
                    },
                    None => RegistrationError::Ledger(err),
                }
            }
            other => RegistrationError::Ledger(other),
        }
    }
}
