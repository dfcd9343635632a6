// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! End-to-end flows against the simulated ledger

mod anchoring_flow_tests;
mod onboarding_flow_tests;

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::coordinator::{AnchoringCoordinator, ErrorClassifier, OnboardingCoordinator, RegistrationCoordinator};
use crate::identity::IdentityGenerator;
use crate::ledger::{LedgerGateway, SimulatedLedger};
use crate::profile::InMemoryProfileStore;

pub(crate) const CHAIN_ID: u64 = 31337;

/// Every coordinator wired to one simulated ledger and an in-memory profile store
pub(crate) struct Harness {
    pub ledger: SimulatedLedger,
    pub gateway: Arc<LedgerGateway>,
    pub registration: Arc<RegistrationCoordinator>,
    pub anchoring: AnchoringCoordinator,
    pub onboarding: OnboardingCoordinator,
    pub profiles: InMemoryProfileStore,
}

impl Harness {
    pub fn new(ledger: SimulatedLedger) -> Self {
        let config = LedgerConfig {
            contract_address: ledger.contract_address(),
            chain_id: CHAIN_ID,
            poll_interval_ms: 5,
            confirmation_timeout_ms: 500,
            ..Default::default()
        };

        let gateway = Arc::new(LedgerGateway::new(Arc::new(ledger.clone()), config));
        let classifier = Arc::new(ErrorClassifier::default());
        let generator = Arc::new(IdentityGenerator::new());
        let registration = Arc::new(RegistrationCoordinator::new(gateway.clone(), classifier.clone()));
        let anchoring = AnchoringCoordinator::new(registration.clone(), generator.clone(), classifier);
        let profiles = InMemoryProfileStore::new();
        let onboarding = OnboardingCoordinator::new(generator, registration.clone(), Arc::new(profiles.clone()));

        Self {
            ledger,
            gateway,
            registration,
            anchoring,
            onboarding,
            profiles,
        }
    }
}
