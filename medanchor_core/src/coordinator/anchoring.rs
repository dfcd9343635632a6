// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::coordinator::classifier::{ErrorClassifier, ErrorKind};
use crate::coordinator::context::{FlowStage, RequestContext};
use crate::coordinator::registration::{RegistrationCoordinator, RegistrationError, RegistrationOutcome};
use crate::identity::{Identity, IdentityError, IdentityGenerator};
use crate::ledger::{LedgerError, LedgerGateway, PendingTransaction, TransactionReceipt};
use crate::types::{Address, TxHash};

/// Errors from anchoring an artifact
#[derive(Debug, Error)]
pub enum AnchoringError {
    #[error("Identity provisioning failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("Implicit registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Anchoring failed ({kind}): {reason}")]
    AnchoringFailed {
        kind: ErrorKind,
        reason: String,
        tx_hash: Option<TxHash>,
    },

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),
}

impl AnchoringError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AnchoringError::AnchoringFailed { kind, .. } => Some(*kind),
            AnchoringError::Registration(e) => e.kind(),
            AnchoringError::Ledger(LedgerError::WrongNetwork { .. }) => Some(ErrorKind::NetworkMismatch),
            _ => None,
        }
    }
}

/// Off-chain artifact referenced from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Record {
        content_hash: String,
        metadata: String,
    },
    Appointment {
        hospital_id: u64,
        doctor_id: u64,
        date: String,
        time: String,
    },
}

impl Artifact {
    fn validate(&self) -> Result<(), AnchoringError> {
        match self {
            Artifact::Record { content_hash, .. } if content_hash.trim().is_empty() => {
                Err(AnchoringError::InvalidArtifact("content hash is empty".to_string()))
            }
            Artifact::Appointment { date, time, .. } if date.trim().is_empty() || time.trim().is_empty() => {
                Err(AnchoringError::InvalidArtifact("appointment date and time are required".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Record { content_hash, .. } => write!(f, "record {}", content_hash),
            Artifact::Appointment {
                hospital_id,
                doctor_id,
                date,
                time,
            } => write!(
                f,
                "appointment at hospital {} with doctor {} on {} {}",
                hospital_id, doctor_id, date, time
            ),
        }
    }
}

/// Proof that an artifact was anchored
#[derive(Debug, Clone)]
pub struct AnchorReceipt {
    /// DID the artifact is anchored against
    pub did: Address,
    pub artifact: Artifact,
    /// Receipt of the artifact transaction
    pub receipt: TransactionReceipt,
    /// Registration performed on demand before the artifact write, if any
    pub registration: Option<RegistrationOutcome>,
    /// Identity minted for the on-demand registration; its recovery phrase
    /// must be shown to the user since it exists nowhere else
    pub provisioned_identity: Option<Identity>,
}

/// Attaches artifacts to the caller's DID, registering one first if needed
pub struct AnchoringCoordinator {
    registration: Arc<RegistrationCoordinator>,
    generator: Arc<IdentityGenerator>,
    classifier: Arc<ErrorClassifier>,
}

impl AnchoringCoordinator {
    pub fn new(
        registration: Arc<RegistrationCoordinator>,
        generator: Arc<IdentityGenerator>,
        classifier: Arc<ErrorClassifier>,
    ) -> Self {
        Self {
            registration,
            generator,
            classifier,
        }
    }

    fn gateway(&self) -> &LedgerGateway {
        self.registration.gateway()
    }

    pub async fn anchor_record(
        &self,
        ctx: &mut RequestContext,
        content_hash: &str,
        metadata: &str,
    ) -> Result<AnchorReceipt, AnchoringError> {
        let artifact = Artifact::Record {
            content_hash: content_hash.to_string(),
            metadata: metadata.to_string(),
        };
        self.anchor(ctx, artifact).await
    }

    pub async fn anchor_appointment(
        &self,
        ctx: &mut RequestContext,
        hospital_id: u64,
        doctor_id: u64,
        date: &str,
        time: &str,
    ) -> Result<AnchorReceipt, AnchoringError> {
        let artifact = Artifact::Appointment {
            hospital_id,
            doctor_id,
            date: date.to_string(),
            time: time.to_string(),
        };
        self.anchor(ctx, artifact).await
    }

    async fn anchor(&self, ctx: &mut RequestContext, artifact: Artifact) -> Result<AnchorReceipt, AnchoringError> {
        artifact.validate()?;

        let result = self.anchor_inner(ctx, artifact).await;
        if let Err(e) = &result {
            warn!(request_id = %ctx.request_id, "Anchoring for {} failed: {}", ctx.account, e);
            ctx.advance(FlowStage::Failed);
        }
        result
    }

    async fn anchor_inner(&self, ctx: &mut RequestContext, artifact: Artifact) -> Result<AnchorReceipt, AnchoringError> {
        let account = ctx.account;
        let mut did = self.gateway().read_did(account).await?;
        let mut registration = None;
        let mut provisioned_identity = None;

        if did.is_zero() {
            info!(request_id = %ctx.request_id, "Account {} has no DID; registering before anchoring", account);

            let identity = self.generator.generate()?;
            ctx.advance(FlowStage::IdentityGenerated);

            let outcome = self
                .registration
                .ensure_registered_reconciled(ctx, identity.address, false)
                .await?;

            did = outcome.did;
            if outcome.did == identity.address {
                provisioned_identity = Some(identity);
            }
            registration = Some(outcome);
        }

        self.gateway().ensure_network().await?;

        ctx.advance(FlowStage::AwaitingArtifact);
        let pending = self.submit(account, &artifact).await.map_err(|e| self.classify(e))?;
        ctx.record_submission(&pending);

        let receipt = self
            .gateway()
            .await_confirmation(&pending)
            .await
            .map_err(|e| self.classify(e))?;

        info!(
            request_id = %ctx.request_id,
            tx_hash = %receipt.tx_hash,
            "Anchored {} against DID {} in block {}",
            artifact, did, receipt.block_number
        );
        ctx.advance(FlowStage::Anchored);

        Ok(AnchorReceipt {
            did,
            artifact,
            receipt,
            registration,
            provisioned_identity,
        })
    }

    async fn submit(&self, account: Address, artifact: &Artifact) -> Result<PendingTransaction, LedgerError> {
        match artifact {
            Artifact::Record { content_hash, metadata } => {
                self.gateway().write_add_record(account, content_hash, metadata).await
            }
            Artifact::Appointment {
                hospital_id,
                doctor_id,
                date,
                time,
            } => {
                self.gateway()
                    .write_book_appointment(account, *hospital_id, *doctor_id, date, time)
                    .await
            }
        }
    }

    fn classify(&self, err: LedgerError) -> AnchoringError {
        match err {
            LedgerError::SubmissionFailed(_) | LedgerError::TransactionReverted { .. } => {
                match self.classifier.classify_ledger_error(&err) {
                    Some((kind, reason)) => AnchoringError::AnchoringFailed {
                        kind,
                        reason,
                        tx_hash: err.tx_hash(),
                    },
                    None => AnchoringError::Ledger(err),
                }
            }
            other => AnchoringError::Ledger(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::ledger::SimulatedLedger;

    const CHAIN_ID: u64 = 31337;

    fn coordinator_for(ledger: &SimulatedLedger) -> AnchoringCoordinator {
        let config = LedgerConfig {
            contract_address: ledger.contract_address(),
            chain_id: CHAIN_ID,
            poll_interval_ms: 5,
            confirmation_timeout_ms: 500,
            ..Default::default()
        };
        let gateway = Arc::new(LedgerGateway::new(Arc::new(ledger.clone()), config));
        let classifier = Arc::new(ErrorClassifier::default());
        let registration = Arc::new(RegistrationCoordinator::new(gateway, classifier.clone()));
        AnchoringCoordinator::new(registration, Arc::new(IdentityGenerator::new()), classifier)
    }

    #[tokio::test]
    async fn test_registered_account_anchors_directly() {
        let account = Address::repeat_byte(0xaa);
        let did = Address::repeat_byte(0xd1);
        let ledger = SimulatedLedger::new(CHAIN_ID)
            .with_account(account)
            .with_registration(account, did);
        let coordinator = coordinator_for(&ledger);
        let mut ctx = RequestContext::new(account);

        let receipt = coordinator.anchor_record(&mut ctx, "QmRecord", "{\"type\":\"lab\"}").await.unwrap();
        assert_eq!(receipt.did, did);
        assert!(receipt.registration.is_none());
        assert!(receipt.provisioned_identity.is_none());
        assert_eq!(ctx.stage(), FlowStage::Anchored);

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content_hash, "QmRecord");
        assert_eq!(records[0].did, did);
    }

    #[tokio::test]
    async fn test_provisions_identity_for_unregistered_account() {
        let account = Address::repeat_byte(0xaa);
        let ledger = SimulatedLedger::new(CHAIN_ID).with_account(account);
        let coordinator = coordinator_for(&ledger);
        let mut ctx = RequestContext::new(account);

        let receipt = coordinator.anchor_record(&mut ctx, "QmRecord", "{}").await.unwrap();
        let identity = receipt.provisioned_identity.expect("identity provisioned");
        assert_eq!(identity.mnemonic.word_count(), 24);
        assert_eq!(receipt.did, identity.address);
        assert_eq!(ledger.registered_did(&account), Some(identity.address));
        assert_eq!(ctx.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_content_hash_rejected_before_ledger() {
        let account = Address::repeat_byte(0xaa);
        let ledger = SimulatedLedger::new(CHAIN_ID).with_account(account);
        let coordinator = coordinator_for(&ledger);
        let mut ctx = RequestContext::new(account);

        assert!(matches!(
            coordinator.anchor_record(&mut ctx, "  ", "{}").await,
            Err(AnchoringError::InvalidArtifact(_))
        ));
        assert!(matches!(
            coordinator.anchor_appointment(&mut ctx, 1, 2, "", "14:30").await,
            Err(AnchoringError::InvalidArtifact(_))
        ));
        assert!(ledger.events().is_empty());
    }

    #[tokio::test]
    async fn test_artifact_rejection_is_classified() {
        let account = Address::repeat_byte(0xaa);
        let ledger = SimulatedLedger::new(CHAIN_ID)
            .with_account(account)
            .with_registration(account, Address::repeat_byte(0xd1))
            .failing_submissions(-32000, "insufficient funds for gas * price + value");
        let coordinator = coordinator_for(&ledger);
        let mut ctx = RequestContext::new(account);

        let err = coordinator.anchor_record(&mut ctx, "QmRecord", "{}").await.unwrap_err();
        assert!(matches!(
            err,
            AnchoringError::AnchoringFailed {
                kind: ErrorKind::InsufficientFunds,
                ..
            }
        ));
        assert_eq!(ctx.stage(), FlowStage::Failed);
    }

    #[tokio::test]
    async fn test_implicit_registration_failure_is_wrapped() {
        let account = Address::repeat_byte(0xaa);
        let ledger = SimulatedLedger::new(CHAIN_ID)
            .with_account(account)
            .failing_submissions(4001, "User rejected the request.");
        let coordinator = coordinator_for(&ledger);
        let mut ctx = RequestContext::new(account);

        let err = coordinator.anchor_appointment(&mut ctx, 1, 2, "2025-12-05", "14:30").await.unwrap_err();
        assert!(matches!(err, AnchoringError::Registration(_)));
        assert_eq!(err.kind(), Some(ErrorKind::UserRejected));
        assert!(ledger.appointments().is_empty());
    }
}
