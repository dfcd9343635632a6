// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::ledger::PendingTransaction;
use crate::types::{Address, TxHash};

/// Where a flow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStage {
    Started,
    IdentityGenerated,
    AwaitingRegistration,
    Registered,
    AwaitingArtifact,
    Anchored,
    ProfilePersisted,
    ProfileFailed,
    Failed,
}

/// State of a single user action, threaded through every coordinator call.
///
/// `submitted` lists every transaction the flow put on the ledger, so a flow
/// abandoned mid-way can be reconciled later by re-reading ledger state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: Uuid,
    /// Signing account the flow acts for
    pub account: Address,
    pub started_at: DateTime<Utc>,
    stage: FlowStage,
    submitted: Vec<PendingTransaction>,
}

impl RequestContext {
    pub fn new(account: Address) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            account,
            started_at: Utc::now(),
            stage: FlowStage::Started,
            submitted: Vec::new(),
        }
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    pub fn submitted(&self) -> &[PendingTransaction] {
        &self.submitted
    }

    pub fn submitted_hashes(&self) -> Vec<TxHash> {
        self.submitted.iter().map(|tx| tx.hash).collect()
    }

    pub(crate) fn advance(&mut self, stage: FlowStage) {
        debug!("Request {} stage {:?} -> {:?}", self.request_id, self.stage, stage);
        self.stage = stage;
    }

    pub(crate) fn record_submission(&mut self, pending: &PendingTransaction) {
        self.submitted.push(pending.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context() {
        let a = RequestContext::new(Address::repeat_byte(1));
        let b = RequestContext::new(Address::repeat_byte(1));
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.stage(), FlowStage::Started);
        assert!(a.submitted().is_empty());
    }
}
