// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

pub mod config;
pub mod coordinator;
pub mod identity;
pub mod ledger;
pub mod profile;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export common types
pub use config::{AppConfig, ConfigError, LedgerConfig, ProfileStoreConfig};
pub use coordinator::{
    AnchorReceipt, AnchoringCoordinator, AnchoringError, Artifact,
    ErrorClassifier, ErrorKind, FlowStage, Matcher,
    OnboardingCoordinator, OnboardingError, OnboardingOutcome, ProfileWrite,
    RegistrationCoordinator, RegistrationError, RegistrationOutcome, RequestContext
};
pub use identity::{DerivationPath, Identity, IdentityError, IdentityGenerator, RecoveryPhrase};
pub use ledger::{
    JsonRpcTransport, LedgerError, LedgerGateway, PendingTransaction, RawLedgerError,
    SigningTransport, SimulatedLedger, TransactionKind, TransactionReceipt, TransportError
};
pub use profile::{
    HttpProfileStore, InMemoryProfileStore, PatientProfile, ProfileStore,
    ProfileStoreError, ProfileUpdate
};
pub use types::{Address, TxHash};
