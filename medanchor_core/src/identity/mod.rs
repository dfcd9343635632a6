// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! Mnemonic-backed identity generation

pub mod types;
pub mod derivation;
pub mod generator;

pub use types::{
    Identity,
    IdentityError,
    RecoveryPhrase,
};

pub use derivation::{
    DerivationPath,
    DEFAULT_DERIVATION_PATH,
};

pub use generator::{
    EntropySource,
    IdentityGenerator,
    OsEntropy,
};
