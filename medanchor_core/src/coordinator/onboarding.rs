// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::coordinator::context::{FlowStage, RequestContext};
use crate::coordinator::registration::{RegistrationCoordinator, RegistrationError, RegistrationOutcome};
use crate::identity::{Identity, IdentityError, IdentityGenerator};
use crate::profile::{PatientProfile, ProfileStore, ProfileUpdate};
use crate::types::Address;

/// Errors that stop onboarding before anything is persisted off-chain
#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("Identity generation failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("Registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Invalid guardian {0}")]
    InvalidGuardian(Address),
}

/// Outcome of the off-chain profile write, reported apart from the on-chain result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProfileWrite {
    Saved,
    Failed { reason: String },
}

impl ProfileWrite {
    pub fn is_saved(&self) -> bool {
        matches!(self, ProfileWrite::Saved)
    }
}

/// Result of onboarding a patient or dependent
#[derive(Debug, Clone)]
pub struct OnboardingOutcome {
    pub registration: RegistrationOutcome,
    /// Identity generated by this flow; `None` when the account already had
    /// a different DID and the generated one was discarded
    pub identity: Option<Identity>,
    /// Profile as written (or attempted); pass to `retry_profile` after a failure
    pub profile_update: ProfileUpdate,
    pub profile: ProfileWrite,
}

/// First-time onboarding: mint an identity, register it, record the profile off-chain
pub struct OnboardingCoordinator {
    generator: Arc<IdentityGenerator>,
    registration: Arc<RegistrationCoordinator>,
    profiles: Arc<dyn ProfileStore>,
}

impl OnboardingCoordinator {
    pub fn new(
        generator: Arc<IdentityGenerator>,
        registration: Arc<RegistrationCoordinator>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            generator,
            registration,
            profiles,
        }
    }

    pub async fn onboard_patient(
        &self,
        ctx: &mut RequestContext,
        profile: &PatientProfile,
    ) -> Result<OnboardingOutcome, OnboardingError> {
        self.onboard(ctx, profile, None).await
    }

    /// Onboard a dependent whose own signing account is `ctx.account`; the
    /// guardian link is kept only in the off-chain profile
    pub async fn onboard_dependent(
        &self,
        ctx: &mut RequestContext,
        guardian: Address,
        profile: &PatientProfile,
    ) -> Result<OnboardingOutcome, OnboardingError> {
        if guardian.is_zero() || guardian == ctx.account {
            return Err(OnboardingError::InvalidGuardian(guardian));
        }
        self.onboard(ctx, profile, Some(guardian)).await
    }

    /// Re-run only the off-chain profile write
    pub async fn retry_profile(&self, ctx: &mut RequestContext, update: &ProfileUpdate) -> ProfileWrite {
        let mut update = update.clone();
        update.updated_at = Utc::now();
        self.write_profile(ctx, &update).await
    }

    async fn onboard(
        &self,
        ctx: &mut RequestContext,
        profile: &PatientProfile,
        guardian: Option<Address>,
    ) -> Result<OnboardingOutcome, OnboardingError> {
        let is_dependent = guardian.is_some();

        let identity = match self.generator.generate() {
            Ok(identity) => identity,
            Err(e) => {
                ctx.advance(FlowStage::Failed);
                return Err(e.into());
            }
        };
        ctx.advance(FlowStage::IdentityGenerated);

        let registration = self
            .registration
            .ensure_registered_reconciled(ctx, identity.address, is_dependent)
            .await?;

        let identity = (registration.did == identity.address).then_some(identity);

        let profile_update = ProfileUpdate {
            account: ctx.account,
            did: registration.did,
            display_name: profile.display_name.clone(),
            date_of_birth: profile.date_of_birth,
            guardian,
            is_dependent,
            updated_at: Utc::now(),
        };
        let profile = self.write_profile(ctx, &profile_update).await;

        Ok(OnboardingOutcome {
            registration,
            identity,
            profile_update,
            profile,
        })
    }

    async fn write_profile(&self, ctx: &mut RequestContext, update: &ProfileUpdate) -> ProfileWrite {
        match self.profiles.save_profile(update).await {
            Ok(()) => {
                info!(
                    request_id = %ctx.request_id,
                    "Saved profile for {} (DID {}) to {} store",
                    update.account, update.did, self.profiles.name()
                );
                ctx.advance(FlowStage::ProfilePersisted);
                ProfileWrite::Saved
            }
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    "Profile write for {} failed; on-chain registration of {} stands: {}",
                    update.account, update.did, e
                );
                ctx.advance(FlowStage::ProfileFailed);
                ProfileWrite::Failed { reason: e.to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::coordinator::classifier::ErrorClassifier;
    use crate::ledger::{LedgerGateway, SimulatedLedger, TransactionKind};
    use crate::profile::InMemoryProfileStore;

    const CHAIN_ID: u64 = 31337;

    fn coordinator_for(ledger: &SimulatedLedger, store: &InMemoryProfileStore) -> OnboardingCoordinator {
        let config = LedgerConfig {
            contract_address: ledger.contract_address(),
            chain_id: CHAIN_ID,
            poll_interval_ms: 5,
            confirmation_timeout_ms: 500,
            ..Default::default()
        };
        let gateway = Arc::new(LedgerGateway::new(Arc::new(ledger.clone()), config));
        let registration = Arc::new(RegistrationCoordinator::new(gateway, Arc::new(ErrorClassifier::default())));
        OnboardingCoordinator::new(Arc::new(IdentityGenerator::new()), registration, Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_onboard_patient() {
        let account = Address::repeat_byte(0xaa);
        let ledger = SimulatedLedger::new(CHAIN_ID).with_account(account);
        let store = InMemoryProfileStore::new();
        let coordinator = coordinator_for(&ledger, &store);
        let mut ctx = RequestContext::new(account);

        let outcome = coordinator
            .onboard_patient(&mut ctx, &PatientProfile::new("Ada"))
            .await
            .unwrap();

        let identity = outcome.identity.expect("fresh identity");
        assert_eq!(outcome.registration.did, identity.address);
        assert!(outcome.profile.is_saved());
        assert_eq!(ctx.stage(), FlowStage::ProfilePersisted);

        let saved = store.load_profile(&account).await.unwrap().unwrap();
        assert_eq!(saved.did, identity.address);
        assert!(!saved.is_dependent);
    }

    #[tokio::test]
    async fn test_onboard_dependent_links_guardian_off_chain() {
        let guardian = Address::repeat_byte(0x61);
        let dependent = Address::repeat_byte(0xde);
        let ledger = SimulatedLedger::new(CHAIN_ID).with_account(dependent);
        let store = InMemoryProfileStore::new();
        let coordinator = coordinator_for(&ledger, &store);
        let mut ctx = RequestContext::new(dependent);

        let outcome = coordinator
            .onboard_dependent(&mut ctx, guardian, &PatientProfile::new("Little Ada"))
            .await
            .unwrap();

        assert_eq!(ledger.submitted_kinds(), vec![TransactionKind::RegisterDependent]);
        assert_eq!(outcome.profile_update.guardian, Some(guardian));
        assert!(outcome.profile_update.is_dependent);
    }

    #[tokio::test]
    async fn test_invalid_guardian() {
        let account = Address::repeat_byte(0xaa);
        let ledger = SimulatedLedger::new(CHAIN_ID).with_account(account);
        let store = InMemoryProfileStore::new();
        let coordinator = coordinator_for(&ledger, &store);
        let mut ctx = RequestContext::new(account);

        assert!(matches!(
            coordinator.onboard_dependent(&mut ctx, account, &PatientProfile::new("x")).await,
            Err(OnboardingError::InvalidGuardian(_))
        ));
        assert!(matches!(
            coordinator.onboard_dependent(&mut ctx, Address::ZERO, &PatientProfile::new("x")).await,
            Err(OnboardingError::InvalidGuardian(_))
        ));
        assert!(ledger.events().is_empty());
    }

    #[tokio::test]
    async fn test_already_registered_discards_identity() {
        let account = Address::repeat_byte(0xaa);
        let existing = Address::repeat_byte(0xd1);
        let ledger = SimulatedLedger::new(CHAIN_ID)
            .with_account(account)
            .with_registration(account, existing);
        let store = InMemoryProfileStore::new();
        let coordinator = coordinator_for(&ledger, &store);
        let mut ctx = RequestContext::new(account);

        let outcome = coordinator
            .onboard_patient(&mut ctx, &PatientProfile::new("Ada"))
            .await
            .unwrap();

        assert!(outcome.identity.is_none());
        assert!(outcome.registration.was_already_registered);
        assert!(outcome.registration.has_candidate_mismatch());
        assert_eq!(outcome.profile_update.did, existing);
        assert!(ledger.submitted_kinds().is_empty());
    }
}
