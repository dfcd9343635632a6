// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! In-process identity registry, used by tests and the CLI's simulate mode

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ledger::abi::{self, ParamType, Token};
use crate::ledger::gateway::TransactionKind;
use crate::ledger::transport::{CallRequest, SigningTransport, TransactionReceipt, TransportError};
use crate::types::{keccak256, Address, TxHash};

/// Address the simulated registry is "deployed" at
pub const SIMULATED_CONTRACT: Address = Address::new([
    0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f, 0x64, 0x2f, 0x64, 0x18,
    0x0a, 0xa3,
]);

/// Observable ledger activity, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A transaction was accepted into the mempool
    Submitted { hash: TxHash, kind: TransactionKind, from: Address },
    /// A transaction was executed in a block
    Mined { hash: TxHash, kind: TransactionKind, success: bool },
    /// A receipt was handed to a client for the first time
    ReceiptObserved { hash: TxHash, kind: TransactionKind },
}

/// A record reference anchored on the simulated ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchoredRecord {
    pub owner: Address,
    pub did: Address,
    pub content_hash: String,
    pub metadata: String,
}

/// An appointment anchored on the simulated ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchoredAppointment {
    pub owner: Address,
    pub did: Address,
    pub hospital_id: u64,
    pub doctor_id: u64,
    pub date: String,
    pub time: String,
}

struct PendingTx {
    hash: TxHash,
    kind: TransactionKind,
    request: CallRequest,
}

struct SimState {
    chain_id: u64,
    accounts: Vec<Address>,
    allow_chain_switch: bool,
    online: bool,
    auto_mine: bool,
    withhold_receipts: bool,
    signing_failure: Option<(i64, String)>,
    revoke_before: Option<TransactionKind>,
    block_number: u64,
    nonce: u64,
    dids: HashMap<Address, Address>,
    records: Vec<AnchoredRecord>,
    appointments: Vec<AnchoredAppointment>,
    pending: Vec<PendingTx>,
    kinds: HashMap<TxHash, TransactionKind>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    observed: Vec<TxHash>,
    events: Vec<LedgerEvent>,
}

impl SimState {
    fn execute(&mut self, tx: &PendingTx) -> Result<(), String> {
        let from = tx.request.from.ok_or_else(|| "missing sender".to_string())?;
        let (_, args) = abi::split_selector(&tx.request.data).map_err(|e| e.to_string())?;
        let registered = self.dids.get(&from).copied().filter(|did| !did.is_zero());

        match tx.kind {
            TransactionKind::RegisterPatient | TransactionKind::RegisterDependent => {
                let did = match abi::decode(args, &[ParamType::Address]).map_err(|e| e.to_string())?.pop() {
                    Some(Token::Address(did)) => did,
                    _ => return Err("malformed calldata".to_string()),
                };
                if registered.is_some() {
                    return Err(if tx.kind == TransactionKind::RegisterPatient {
                        "Patient already registered".to_string()
                    } else {
                        "Dependent already registered".to_string()
                    });
                }
                if did.is_zero() {
                    return Err("Invalid DID".to_string());
                }
                self.dids.insert(from, did);
            }
            TransactionKind::AddRecord => {
                let did = registered.ok_or_else(|| "Patient not registered".to_string())?;
                let mut tokens = abi::decode(args, &[ParamType::String, ParamType::String])
                    .map_err(|e| e.to_string())?
                    .into_iter();
                match (tokens.next(), tokens.next()) {
                    (Some(Token::String(content_hash)), Some(Token::String(metadata))) => {
                        self.records.push(AnchoredRecord {
                            owner: from,
                            did,
                            content_hash,
                            metadata,
                        });
                    }
                    _ => return Err("malformed calldata".to_string()),
                }
            }
            TransactionKind::BookAppointment => {
                let did = registered.ok_or_else(|| "Patient not registered".to_string())?;
                let tokens = abi::decode(
                    args,
                    &[ParamType::Uint, ParamType::Uint, ParamType::String, ParamType::String],
                )
                .map_err(|e| e.to_string())?;
                match tokens.as_slice() {
                    [Token::Uint(hospital_id), Token::Uint(doctor_id), Token::String(date), Token::String(time)] => {
                        self.appointments.push(AnchoredAppointment {
                            owner: from,
                            did,
                            hospital_id: *hospital_id,
                            doctor_id: *doctor_id,
                            date: date.clone(),
                            time: time.clone(),
                        });
                    }
                    _ => return Err("malformed calldata".to_string()),
                }
            }
        }

        Ok(())
    }

    /// Include every pending transaction in a new block
    fn mine(&mut self) {
        self.block_number += 1;
        let block_number = self.block_number;

        for tx in std::mem::take(&mut self.pending) {
            if self.revoke_before == Some(tx.kind) {
                if let Some(from) = tx.request.from {
                    self.dids.remove(&from);
                }
            }
            let outcome = self.execute(&tx);
            let success = outcome.is_ok();
            let from = tx.request.from.unwrap_or(Address::ZERO);

            debug!("Simulated block {}: {} {} success={}", block_number, tx.kind, tx.hash, success);

            self.receipts.insert(
                tx.hash,
                TransactionReceipt {
                    tx_hash: tx.hash,
                    block_number,
                    success,
                    from,
                    revert_reason: outcome.err(),
                },
            );
            self.events.push(LedgerEvent::Mined {
                hash: tx.hash,
                kind: tx.kind,
                success,
            });
        }
    }
}

/// Simulated signing session plus identity registry contract.
///
/// Transactions are executed when mined: immediately on submission by
/// default, or only on [`SimulatedLedger::mine`] with manual mining, which
/// lets tests interleave concurrent submissions before either is executed.
#[derive(Clone)]
pub struct SimulatedLedger {
    state: Arc<Mutex<SimState>>,
    contract: Address,
}

impl SimulatedLedger {
    /// Ledger whose signing session is connected to `chain_id`
    pub fn new(chain_id: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                chain_id,
                accounts: Vec::new(),
                allow_chain_switch: true,
                online: true,
                auto_mine: true,
                withhold_receipts: false,
                signing_failure: None,
                revoke_before: None,
                block_number: 0,
                nonce: 0,
                dids: HashMap::new(),
                records: Vec::new(),
                appointments: Vec::new(),
                pending: Vec::new(),
                kinds: HashMap::new(),
                receipts: HashMap::new(),
                observed: Vec::new(),
                events: Vec::new(),
            })),
            contract: SIMULATED_CONTRACT,
        }
    }

    /// Let the signing session sign for `account`
    pub fn with_account(self, account: Address) -> Self {
        self.authorize(account);
        self
    }

    pub fn authorize(&self, account: Address) {
        let mut state = self.state.lock();
        if !state.accounts.contains(&account) {
            state.accounts.push(account);
        }
    }

    /// Pre-existing registration, as if made in an earlier session
    pub fn with_registration(self, account: Address, did: Address) -> Self {
        self.state.lock().dids.insert(account, did);
        self
    }

    /// Only execute transactions on explicit [`SimulatedLedger::mine`] calls
    pub fn manual_mining(self) -> Self {
        self.state.lock().auto_mine = false;
        self
    }

    /// Never hand out receipts, as if transactions were stuck in the mempool
    pub fn withholding_receipts(self) -> Self {
        self.state.lock().withhold_receipts = true;
        self
    }

    /// Refuse every network switch request
    pub fn rejecting_chain_switch(self) -> Self {
        self.state.lock().allow_chain_switch = false;
        self
    }

    /// Fail every transaction submission with the given provider error
    pub fn failing_submissions(self, code: i64, message: &str) -> Self {
        self.set_submission_failure(Some((code, message.to_string())));
        self
    }

    /// Drop the sender's DID right before a `kind` transaction executes, as if
    /// the registration was revoked between submission and mining
    pub fn revoking_did_before(self, kind: TransactionKind) -> Self {
        self.state.lock().revoke_before = Some(kind);
        self
    }

    pub fn set_submission_failure(&self, failure: Option<(i64, String)>) {
        self.state.lock().signing_failure = failure;
    }

    /// Take the endpoint offline or bring it back
    pub fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    pub fn current_chain_id(&self) -> u64 {
        self.state.lock().chain_id
    }

    pub fn block_height(&self) -> u64 {
        self.state.lock().block_number
    }

    /// Mine a block containing every pending transaction
    pub fn mine(&self) {
        self.state.lock().mine();
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Wait until at least `count` transactions are pending
    pub async fn wait_for_pending(&self, count: usize) {
        while self.pending_count() < count {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    pub fn registered_did(&self, account: &Address) -> Option<Address> {
        self.state.lock().dids.get(account).copied()
    }

    pub fn records(&self) -> Vec<AnchoredRecord> {
        self.state.lock().records.clone()
    }

    pub fn appointments(&self) -> Vec<AnchoredAppointment> {
        self.state.lock().appointments.clone()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.lock().events.clone()
    }

    /// Kinds of every submitted transaction, in submission order
    pub fn submitted_kinds(&self) -> Vec<TransactionKind> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                LedgerEvent::Submitted { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    fn check_online(state: &SimState) -> Result<(), TransportError> {
        if state.online {
            Ok(())
        } else {
            Err(TransportError::Unreachable("simulated endpoint offline".to_string()))
        }
    }
}

#[async_trait]
impl SigningTransport for SimulatedLedger {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn request_addresses(&self) -> Result<Vec<Address>, TransportError> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        Ok(state.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, TransportError> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        Ok(state.chain_id)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        if !state.allow_chain_switch {
            return Err(TransportError::Rpc {
                code: 4001,
                message: "User rejected the request.".to_string(),
            });
        }
        state.chain_id = chain_id;
        Ok(())
    }

    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, TransportError> {
        let state = self.state.lock();
        Self::check_online(&state)?;

        if request.to != self.contract {
            // No code at the address
            return Ok(Vec::new());
        }

        let (selector, _) = abi::split_selector(&request.data)
            .map_err(|e| TransportError::Rpc { code: -32602, message: e.to_string() })?;
        if selector != abi::selector(abi::GET_MY_DID) {
            return Err(TransportError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
            });
        }

        let caller = request.from.unwrap_or(Address::ZERO);
        let did = state.dids.get(&caller).copied().unwrap_or(Address::ZERO);
        Ok(abi::encode(&[Token::Address(did)]))
    }

    async fn send_transaction(&self, request: &CallRequest) -> Result<TxHash, TransportError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;

        if let Some((code, message)) = state.signing_failure.clone() {
            return Err(TransportError::Rpc { code, message });
        }

        let from = request.from.ok_or_else(|| TransportError::Rpc {
            code: -32602,
            message: "missing from address".to_string(),
        })?;
        if !state.accounts.contains(&from) {
            return Err(TransportError::Rpc {
                code: 4100,
                message: "The requested account has not been authorized by the user.".to_string(),
            });
        }

        let (selector, _) = abi::split_selector(&request.data)
            .map_err(|e| TransportError::Rpc { code: -32602, message: e.to_string() })?;
        let kind = TransactionKind::from_selector(selector).ok_or_else(|| TransportError::Rpc {
            code: -32602,
            message: format!("unknown function selector 0x{}", hex::encode(selector)),
        })?;

        state.nonce += 1;
        let mut preimage = from.as_bytes().to_vec();
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        let hash = TxHash::new(keccak256(&preimage));

        state.pending.push(PendingTx {
            hash,
            kind,
            request: request.clone(),
        });
        state.kinds.insert(hash, kind);
        state.events.push(LedgerEvent::Submitted { hash, kind, from });

        if state.auto_mine {
            state.mine();
        }

        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TransactionReceipt>, TransportError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;

        if state.withhold_receipts {
            return Ok(None);
        }

        let receipt = match state.receipts.get(hash) {
            Some(receipt) => receipt.clone(),
            None => return Ok(None),
        };

        if !state.observed.contains(hash) {
            state.observed.push(*hash);
            if let Some(kind) = state.kinds.get(hash).copied() {
                state.events.push(LedgerEvent::ReceiptObserved { hash: *hash, kind });
            }
        }

        Ok(Some(receipt))
    }

    async fn block_number(&self) -> Result<u64, TransportError> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        Ok(state.block_number)
    }
}
