// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::ledger::abi::{self, Token};
use crate::ledger::error::LedgerError;
use crate::ledger::transport::{CallRequest, SigningTransport, TransactionReceipt, TransportError};
use crate::types::{Address, TxHash};

/// State-changing registry entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    RegisterPatient,
    RegisterDependent,
    AddRecord,
    BookAppointment,
}

impl TransactionKind {
    /// Solidity signature of the entry point
    pub fn signature(&self) -> &'static str {
        match self {
            TransactionKind::RegisterPatient => abi::REGISTER_PATIENT,
            TransactionKind::RegisterDependent => abi::REGISTER_DEPENDENT,
            TransactionKind::AddRecord => abi::ADD_RECORD,
            TransactionKind::BookAppointment => abi::BOOK_APPOINTMENT,
        }
    }

    /// Kind whose entry point has the given selector
    pub fn from_selector(selector: [u8; 4]) -> Option<Self> {
        [
            TransactionKind::RegisterPatient,
            TransactionKind::RegisterDependent,
            TransactionKind::AddRecord,
            TransactionKind::BookAppointment,
        ]
        .into_iter()
        .find(|kind| abi::selector(kind.signature()) == selector)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::RegisterPatient => write!(f, "registerPatient"),
            TransactionKind::RegisterDependent => write!(f, "registerDependent"),
            TransactionKind::AddRecord => write!(f, "addRecord"),
            TransactionKind::BookAppointment => write!(f, "bookAppointment"),
        }
    }
}

/// A submitted, not yet confirmed, transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub kind: TransactionKind,
    pub from: Address,
    pub submitted_at: DateTime<Utc>,
}

/// Typed access to the identity registry contract through a signing transport
pub struct LedgerGateway {
    transport: Arc<dyn SigningTransport>,
    config: LedgerConfig,
}

impl LedgerGateway {
    pub fn new(transport: Arc<dyn SigningTransport>, config: LedgerConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn SigningTransport> {
        &self.transport
    }

    /// DID registered for `account`, or the zero address if unregistered
    pub async fn read_did(&self, account: Address) -> Result<Address, LedgerError> {
        let request = CallRequest {
            from: Some(account),
            to: self.config.contract_address,
            data: abi::encode_call(abi::GET_MY_DID, &[]),
        };

        let data = self.transport.call(&request).await.map_err(LedgerError::from_read)?;
        let did = abi::decode_address(&data)
            .map_err(|e| LedgerError::InvalidResponse(format!("getMyDID: {}", e)))?;

        debug!("Read DID for {}: {}", account, did);
        Ok(did)
    }

    /// Make sure the signing session is on the configured chain, requesting a switch if not
    pub async fn ensure_network(&self) -> Result<(), LedgerError> {
        let expected = self.config.chain_id;
        let actual = self.transport.chain_id().await.map_err(LedgerError::from_read)?;
        if actual == expected {
            return Ok(());
        }

        info!("Requesting network switch from chain {} to {} via {}", actual, expected, self.transport.name());

        match self.transport.switch_chain(expected).await {
            Ok(()) => {}
            Err(TransportError::Rpc { code, message }) => {
                warn!("Network switch to {} rejected ({}): {}", expected, code, message);
                return Err(LedgerError::WrongNetwork { expected, actual });
            }
            Err(e) => return Err(LedgerError::from_read(e)),
        }

        let now = self.transport.chain_id().await.map_err(LedgerError::from_read)?;
        if now != expected {
            return Err(LedgerError::WrongNetwork { expected, actual: now });
        }
        Ok(())
    }

    pub async fn write_register_patient(&self, account: Address, did: Address) -> Result<PendingTransaction, LedgerError> {
        self.submit(account, TransactionKind::RegisterPatient, &[Token::Address(did)]).await
    }

    pub async fn write_register_dependent(&self, account: Address, did: Address) -> Result<PendingTransaction, LedgerError> {
        self.submit(account, TransactionKind::RegisterDependent, &[Token::Address(did)]).await
    }

    pub async fn write_add_record(
        &self,
        account: Address,
        content_hash: &str,
        metadata: &str,
    ) -> Result<PendingTransaction, LedgerError> {
        self.submit(
            account,
            TransactionKind::AddRecord,
            &[Token::String(content_hash.to_string()), Token::String(metadata.to_string())],
        )
        .await
    }

    pub async fn write_book_appointment(
        &self,
        account: Address,
        hospital_id: u64,
        doctor_id: u64,
        date: &str,
        time: &str,
    ) -> Result<PendingTransaction, LedgerError> {
        self.submit(
            account,
            TransactionKind::BookAppointment,
            &[
                Token::Uint(hospital_id),
                Token::Uint(doctor_id),
                Token::String(date.to_string()),
                Token::String(time.to_string()),
            ],
        )
        .await
    }

    /// Wait until the transaction is included and buried under the configured
    /// number of confirmations, bounded by the confirmation timeout.
    pub async fn await_confirmation(&self, pending: &PendingTransaction) -> Result<TransactionReceipt, LedgerError> {
        let waited = self.config.confirmation_timeout();

        match time::timeout(waited, self.poll_until_final(pending)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} transaction {} not confirmed after {:?}", pending.kind, pending.hash, waited);
                Err(LedgerError::TransactionTimeout {
                    tx_hash: pending.hash,
                    waited,
                })
            }
        }
    }

    async fn poll_until_final(&self, pending: &PendingTransaction) -> Result<TransactionReceipt, LedgerError> {
        let required = self.config.confirmations.max(1);
        let mut interval = time::interval(self.config.poll_interval());

        loop {
            interval.tick().await;

            let receipt = match self
                .transport
                .transaction_receipt(&pending.hash)
                .await
                .map_err(LedgerError::from_read)?
            {
                Some(receipt) => receipt,
                None => continue,
            };

            if !receipt.success {
                let reason = receipt
                    .revert_reason
                    .clone()
                    .unwrap_or_else(|| "execution reverted".to_string());
                warn!("{} transaction {} reverted: {}", pending.kind, pending.hash, reason);
                return Err(LedgerError::TransactionReverted {
                    tx_hash: pending.hash,
                    reason,
                });
            }

            let head = self.transport.block_number().await.map_err(LedgerError::from_read)?;
            let depth = head.saturating_sub(receipt.block_number) + 1;
            if depth >= required {
                info!(
                    "{} transaction {} confirmed in block {} ({} confirmations)",
                    pending.kind, pending.hash, receipt.block_number, depth
                );
                return Ok(receipt);
            }

            debug!("{} at depth {}/{}", pending.hash, depth, required);
        }
    }

    /// Writes require a session on the right chain that controls `account`
    async fn check_session(&self, account: Address) -> Result<(), LedgerError> {
        let actual = self.transport.chain_id().await.map_err(LedgerError::from_read)?;
        if actual != self.config.chain_id {
            return Err(LedgerError::WrongNetwork {
                expected: self.config.chain_id,
                actual,
            });
        }

        let accounts = self
            .transport
            .request_addresses()
            .await
            .map_err(LedgerError::from_read)?;
        if !accounts.contains(&account) {
            return Err(LedgerError::NoSigningSession(account));
        }

        Ok(())
    }

    async fn submit(&self, account: Address, kind: TransactionKind, args: &[Token]) -> Result<PendingTransaction, LedgerError> {
        self.check_session(account).await?;

        let request = CallRequest {
            from: Some(account),
            to: self.config.contract_address,
            data: abi::encode_call(kind.signature(), args),
        };

        let hash = self
            .transport
            .send_transaction(&request)
            .await
            .map_err(LedgerError::from_submission)?;

        info!("Submitted {} transaction {} from {}", kind, hash, account);

        Ok(PendingTransaction {
            hash,
            kind,
            from: account,
            submitted_at: Utc::now(),
        })
    }
}
