// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

use std::sync::Arc;

use bip39::Mnemonic;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::identity::derivation::{address_of, derive_secret_key, DerivationPath};
use crate::identity::types::{Identity, IdentityError, RecoveryPhrase};

/// Bytes of entropy behind a 24-word mnemonic
pub const ENTROPY_BYTES: usize = 32;

/// Source of cryptographically secure random bytes
pub trait EntropySource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<(), IdentityError>;
}

/// Operating-system RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), IdentityError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| IdentityError::EntropyUnavailable(e.to_string()))
    }
}

/// Derives fresh mnemonic-backed identities
#[derive(Clone)]
pub struct IdentityGenerator {
    entropy: Arc<dyn EntropySource>,
    path: DerivationPath,
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityGenerator {
    /// Generator backed by the OS RNG and the standard Ethereum account path
    pub fn new() -> Self {
        Self {
            entropy: Arc::new(OsEntropy),
            path: DerivationPath::default(),
        }
    }

    pub fn with_entropy_source(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn with_path(mut self, path: DerivationPath) -> Self {
        self.path = path;
        self
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Generate a new identity from fresh entropy
    pub fn generate(&self) -> Result<Identity, IdentityError> {
        let mut entropy = [0u8; ENTROPY_BYTES];
        self.entropy.fill(&mut entropy)?;
        let identity = self.generate_from_entropy(&entropy);
        entropy.fill(0);
        identity
    }

    /// Deterministically derive the identity for the given mnemonic entropy
    pub fn generate_from_entropy(&self, entropy: &[u8]) -> Result<Identity, IdentityError> {
        let mnemonic = Mnemonic::from_entropy(entropy)
            .map_err(|e| IdentityError::InvalidMnemonic(e.to_string()))?;
        self.derive(mnemonic)
    }

    /// Re-derive an identity from its recovery phrase
    pub fn recover(&self, phrase: &str) -> Result<Identity, IdentityError> {
        let normalized = phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        let mnemonic = Mnemonic::parse_normalized(&normalized)
            .map_err(|e| IdentityError::InvalidMnemonic(e.to_string()))?;
        self.derive(mnemonic)
    }

    fn derive(&self, mnemonic: Mnemonic) -> Result<Identity, IdentityError> {
        let seed = mnemonic.to_seed_normalized("");
        let secret = derive_secret_key(&seed, &self.path)?;
        let address = address_of(&secret);

        debug!("Derived identity {} at {}", address, self.path);

        Ok(Identity {
            mnemonic: RecoveryPhrase::new(mnemonic.to_string()),
            address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct BrokenEntropy;

    impl EntropySource for BrokenEntropy {
        fn fill(&self, _buf: &mut [u8]) -> Result<(), IdentityError> {
            Err(IdentityError::EntropyUnavailable("device not readable".to_string()))
        }
    }

    #[test]
    fn test_known_mnemonic_vectors() {
        let generator = IdentityGenerator::new();

        let hardhat = generator
            .recover("test test test test test test test test test test test junk")
            .unwrap();
        assert_eq!(hardhat.address.to_checksum(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

        let abandon = generator
            .recover("abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about")
            .unwrap();
        assert_eq!(abandon.address.to_checksum(), "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    }

    #[test]
    fn test_generate_yields_24_words_and_recoverable_address() {
        let generator = IdentityGenerator::new();
        let identity = generator.generate().unwrap();

        assert_eq!(identity.mnemonic.word_count(), 24);
        let recovered = generator.recover(identity.mnemonic.expose()).unwrap();
        assert_eq!(recovered.address, identity.address);
    }

    #[test]
    fn test_recover_normalizes_case_and_whitespace() {
        let generator = IdentityGenerator::new();
        let recovered = generator
            .recover("  TEST test test test test test\ttest test test test test JUNK ")
            .unwrap();
        assert_eq!(recovered.address.to_checksum(), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    }

    #[test]
    fn test_recover_rejects_invalid_phrase() {
        let generator = IdentityGenerator::new();
        let result = generator.recover("test test test test test test test test test test test notaword");
        assert!(matches!(result, Err(IdentityError::InvalidMnemonic(_))));

        let result = generator.recover("test test test");
        assert!(matches!(result, Err(IdentityError::InvalidMnemonic(_))));
    }

    #[test]
    fn test_entropy_failure_surfaces() {
        let generator = IdentityGenerator::new().with_entropy_source(Arc::new(BrokenEntropy));
        assert!(matches!(generator.generate(), Err(IdentityError::EntropyUnavailable(_))));
    }

    #[test]
    fn test_generate_from_entropy_is_deterministic() {
        let generator = IdentityGenerator::new();
        let a = generator.generate_from_entropy(&[7u8; ENTROPY_BYTES]).unwrap();
        let b = generator.generate_from_entropy(&[7u8; ENTROPY_BYTES]).unwrap();
        assert_eq!(a, b);

        let other_path = generator.clone().with_path("m/44'/60'/0'/0/1".parse().unwrap());
        let c = other_path.generate_from_entropy(&[7u8; ENTROPY_BYTES]).unwrap();
        assert_ne!(a.address, c.address);
    }

    #[test]
    fn test_no_collisions_across_many_generations() {
        let generator = IdentityGenerator::new();
        let mut seen = HashSet::new();

        for _ in 0..10_000 {
            let identity = generator.generate().unwrap();
            assert!(seen.insert(identity.address), "address collision");
        }

        // Spot-check that addresses stay re-derivable from their own phrase
        for _ in 0..20 {
            let identity = generator.generate().unwrap();
            let recovered = generator.recover(identity.mnemonic.expose()).unwrap();
            assert_eq!(recovered.address, identity.address);
        }
    }
}
