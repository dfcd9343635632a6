// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use chrono::NaiveDate;

use super::{Harness, CHAIN_ID};
use crate::coordinator::{FlowStage, ProfileWrite, RequestContext};
use crate::ledger::{SimulatedLedger, TransactionKind};
use crate::profile::{PatientProfile, ProfileStore};
use crate::types::Address;

#[tokio::test]
async fn test_profile_failure_does_not_fail_onboarding() {
    let account = Address::repeat_byte(0xaa);
    let h = Harness::new(SimulatedLedger::new(CHAIN_ID).with_account(account));
    h.profiles.set_unavailable(true).await;
    let mut ctx = RequestContext::new(account);

    let profile = PatientProfile {
        display_name: "Ada Lovelace".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1815, 12, 10),
    };
    let outcome = h.onboarding.onboard_patient(&mut ctx, &profile).await.unwrap();

    assert!(matches!(outcome.profile, ProfileWrite::Failed { .. }));
    assert_eq!(ctx.stage(), FlowStage::ProfileFailed);
    assert!(outcome.identity.is_some());
    assert_eq!(h.ledger.registered_did(&account), Some(outcome.registration.did));

    // Only the off-chain write is repeated
    h.profiles.set_unavailable(false).await;
    let retried = h.onboarding.retry_profile(&mut ctx, &outcome.profile_update).await;
    assert_eq!(retried, ProfileWrite::Saved);
    assert_eq!(ctx.stage(), FlowStage::ProfilePersisted);
    assert_eq!(h.ledger.submitted_kinds(), vec![TransactionKind::RegisterPatient]);

    let saved = h.profiles.load_profile(&account).await.unwrap().unwrap();
    assert_eq!(saved.display_name, "Ada Lovelace");
    assert_eq!(saved.did, outcome.registration.did);
}

#[tokio::test]
async fn test_onboarding_then_anchoring_reuses_did() {
    let account = Address::repeat_byte(0xaa);
    let h = Harness::new(SimulatedLedger::new(CHAIN_ID).with_account(account));

    let mut ctx = RequestContext::new(account);
    let onboarded = h
        .onboarding
        .onboard_patient(&mut ctx, &PatientProfile::new("Ada"))
        .await
        .unwrap();

    let mut ctx = RequestContext::new(account);
    let anchored = h.anchoring.anchor_record(&mut ctx, "QmA", "{}").await.unwrap();

    assert_eq!(anchored.did, onboarded.registration.did);
    assert_eq!(
        h.ledger.submitted_kinds(),
        vec![TransactionKind::RegisterPatient, TransactionKind::AddRecord]
    );
}

#[tokio::test]
async fn test_guardian_onboards_dependent() {
    let guardian = Address::repeat_byte(0x61);
    let dependent = Address::repeat_byte(0xde);
    let h = Harness::new(
        SimulatedLedger::new(CHAIN_ID)
            .with_account(guardian)
            .with_account(dependent),
    );

    let mut guardian_ctx = RequestContext::new(guardian);
    let guardian_outcome = h
        .onboarding
        .onboard_patient(&mut guardian_ctx, &PatientProfile::new("Parent"))
        .await
        .unwrap();

    let mut dependent_ctx = RequestContext::new(dependent);
    let dependent_outcome = h
        .onboarding
        .onboard_dependent(&mut dependent_ctx, guardian, &PatientProfile::new("Child"))
        .await
        .unwrap();

    assert_ne!(guardian_outcome.registration.did, dependent_outcome.registration.did);
    assert_eq!(
        h.ledger.submitted_kinds(),
        vec![TransactionKind::RegisterPatient, TransactionKind::RegisterDependent]
    );

    let saved = h.profiles.load_profile(&dependent).await.unwrap().unwrap();
    assert_eq!(saved.guardian, Some(guardian));
    assert!(saved.is_dependent);
}
