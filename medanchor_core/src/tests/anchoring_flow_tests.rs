// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use super::{Harness, CHAIN_ID};
use crate::coordinator::{AnchoringError, Artifact, ErrorKind, FlowStage, RequestContext};
use crate::identity::IdentityGenerator;
use crate::ledger::{LedgerEvent, SimulatedLedger, TransactionKind};
use crate::types::Address;

fn position(events: &[LedgerEvent], pred: impl Fn(&LedgerEvent) -> bool) -> usize {
    events.iter().position(pred).expect("event present")
}

#[tokio::test]
async fn test_record_on_unregistered_account_registers_first() {
    let account = Address::repeat_byte(0xaa);
    let h = Harness::new(SimulatedLedger::new(CHAIN_ID).with_account(account));
    let mut ctx = RequestContext::new(account);

    let receipt = h
        .anchoring
        .anchor_record(&mut ctx, "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG", "{\"kind\":\"lab\"}")
        .await
        .unwrap();

    assert_eq!(
        h.ledger.submitted_kinds(),
        vec![TransactionKind::RegisterPatient, TransactionKind::AddRecord]
    );

    // The registration receipt is observed before the record is submitted
    let events = h.ledger.events();
    let registration_seen = position(&events, |e| {
        matches!(e, LedgerEvent::ReceiptObserved { kind: TransactionKind::RegisterPatient, .. })
    });
    let record_submitted = position(&events, |e| {
        matches!(e, LedgerEvent::Submitted { kind: TransactionKind::AddRecord, .. })
    });
    assert!(registration_seen < record_submitted);

    let registration = receipt.registration.expect("registered on demand");
    assert!(!registration.was_already_registered);
    assert_eq!(receipt.did, registration.did);
    assert!(receipt.receipt.success);
    assert_eq!(ctx.stage(), FlowStage::Anchored);
    assert_eq!(ctx.submitted().len(), 2);

    let records = h.ledger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].did, receipt.did);
}

#[tokio::test]
async fn test_appointment_on_unregistered_account() {
    let account: Address = "0x0000000000000000000000000000000000000aaa".parse().unwrap();
    let h = Harness::new(SimulatedLedger::new(CHAIN_ID).with_account(account));
    let mut ctx = RequestContext::new(account);

    let receipt = h
        .anchoring
        .anchor_appointment(&mut ctx, 1, 2, "2025-12-05", "14:30")
        .await
        .unwrap();

    assert_eq!(
        h.ledger.submitted_kinds(),
        vec![TransactionKind::RegisterPatient, TransactionKind::BookAppointment]
    );
    let confirmed = h
        .ledger
        .events()
        .iter()
        .filter(|e| matches!(e, LedgerEvent::Mined { success: true, .. }))
        .count();
    assert_eq!(confirmed, 2);

    assert_eq!(
        receipt.artifact,
        Artifact::Appointment {
            hospital_id: 1,
            doctor_id: 2,
            date: "2025-12-05".to_string(),
            time: "14:30".to_string(),
        }
    );

    let appointments = h.ledger.appointments();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].hospital_id, 1);
    assert_eq!(appointments[0].doctor_id, 2);
    assert_eq!(appointments[0].did, receipt.did);

    // The provisioned identity is the only way back to this DID
    let identity = receipt.provisioned_identity.expect("identity provisioned");
    let recovered = IdentityGenerator::new().recover(identity.mnemonic.expose()).unwrap();
    assert_eq!(recovered.address, receipt.did);
}

#[tokio::test]
async fn test_registered_account_skips_registration() {
    let account = Address::repeat_byte(0xaa);
    let did = Address::repeat_byte(0xd1);
    let h = Harness::new(
        SimulatedLedger::new(CHAIN_ID)
            .with_account(account)
            .with_registration(account, did),
    );
    let mut ctx = RequestContext::new(account);

    h.anchoring.anchor_record(&mut ctx, "QmA", "{}").await.unwrap();
    h.anchoring
        .anchor_appointment(&mut ctx, 3, 4, "2026-01-10", "09:00")
        .await
        .unwrap();

    assert_eq!(
        h.ledger.submitted_kinds(),
        vec![TransactionKind::AddRecord, TransactionKind::BookAppointment]
    );
}

#[tokio::test]
async fn test_second_anchor_reuses_provisioned_did() {
    let account = Address::repeat_byte(0xaa);
    let h = Harness::new(SimulatedLedger::new(CHAIN_ID).with_account(account));

    let mut first_ctx = RequestContext::new(account);
    let first = h.anchoring.anchor_record(&mut first_ctx, "QmA", "{}").await.unwrap();

    let mut second_ctx = RequestContext::new(account);
    let second = h.anchoring.anchor_record(&mut second_ctx, "QmB", "{}").await.unwrap();

    assert_eq!(first.did, second.did);
    assert!(second.registration.is_none());
    assert!(second.provisioned_identity.is_none());
    assert_eq!(
        h.ledger
            .submitted_kinds()
            .iter()
            .filter(|k| **k == TransactionKind::RegisterPatient)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_unreachable_ledger_surfaces_immediately() {
    let account = Address::repeat_byte(0xaa);
    let h = Harness::new(SimulatedLedger::new(CHAIN_ID).with_account(account));
    h.ledger.set_online(false);
    let mut ctx = RequestContext::new(account);

    let err = h.anchoring.anchor_record(&mut ctx, "QmA", "{}").await.unwrap_err();
    assert!(matches!(err, AnchoringError::Ledger(_)));
    assert_eq!(err.kind(), None);
    assert_eq!(ctx.stage(), FlowStage::Failed);
}

#[tokio::test]
async fn test_rejected_artifact_signature_is_classified() {
    let account = Address::repeat_byte(0xaa);
    let h = Harness::new(
        SimulatedLedger::new(CHAIN_ID)
            .with_account(account)
            .with_registration(account, Address::repeat_byte(0xd1)),
    );
    h.ledger
        .set_submission_failure(Some((4001, "MetaMask Tx Signature: User denied transaction signature.".to_string())));
    let mut ctx = RequestContext::new(account);

    let err = h
        .anchoring
        .anchor_appointment(&mut ctx, 1, 2, "2025-12-05", "14:30")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::UserRejected));
    assert!(h.ledger.appointments().is_empty());
}

#[tokio::test]
async fn test_artifact_reverted_after_mining_is_classified() {
    let account = Address::repeat_byte(0xaa);
    let h = Harness::new(
        SimulatedLedger::new(CHAIN_ID)
            .with_account(account)
            .with_registration(account, Address::repeat_byte(0xd1))
            .revoking_did_before(TransactionKind::AddRecord),
    );
    let mut ctx = RequestContext::new(account);

    let err = h.anchoring.anchor_record(&mut ctx, "QmRevoked", "{}").await.unwrap_err();
    match &err {
        AnchoringError::AnchoringFailed { kind, tx_hash, .. } => {
            assert_eq!(*kind, ErrorKind::NotRegistered);
            assert_eq!(*tx_hash, Some(ctx.submitted()[0].hash));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(ctx.stage(), FlowStage::Failed);
    assert_eq!(h.ledger.submitted_kinds(), vec![TransactionKind::AddRecord]);
    assert!(h.ledger.records().is_empty());
}
