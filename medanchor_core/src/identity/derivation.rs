// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! BIP-32 derivation of secp256k1 keys from a BIP-39 seed

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar, SecretKey};
use sha2::Sha512;

use crate::identity::types::IdentityError;
use crate::types::Address;

type HmacSha512 = Hmac<Sha512>;

const HARDENED: u32 = 0x8000_0000;
const MASTER_KEY: &[u8] = b"Bitcoin seed";

/// Standard Ethereum account path
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// A BIP-32 derivation path such as `m/44'/60'/0'/0/0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn indices(&self) -> &[u32] {
        &self.0
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        Self(vec![44 | HARDENED, 60 | HARDENED, HARDENED, 0, 0])
    }
}

impl FromStr for DerivationPath {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(IdentityError::InvalidDerivationPath(s.to_string()));
        }

        let mut indices = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h')) {
                Some(digits) => (digits, true),
                None => (part, false),
            };

            let index: u32 = digits
                .parse()
                .map_err(|_| IdentityError::InvalidDerivationPath(s.to_string()))?;
            if index >= HARDENED {
                return Err(IdentityError::InvalidDerivationPath(s.to_string()));
            }

            indices.push(if hardened { index | HARDENED } else { index });
        }

        Ok(Self(indices))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for index in &self.0 {
            if index & HARDENED != 0 {
                write!(f, "/{}'", index & !HARDENED)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 64], IdentityError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| IdentityError::Derivation(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }

    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// Parse 32 bytes as a scalar; `None` if the value is not below the curve order
fn parse_scalar(bytes: &[u8]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
}

fn to_secret_key(scalar: &Scalar) -> Result<SecretKey, IdentityError> {
    SecretKey::from_bytes(&scalar.to_repr()).map_err(|e| IdentityError::Derivation(e.to_string()))
}

/// Derive the secret key at `path` from a 64-byte BIP-39 seed
pub fn derive_secret_key(seed: &[u8], path: &DerivationPath) -> Result<SecretKey, IdentityError> {
    let master = hmac_sha512(MASTER_KEY, &[seed])?;
    let mut key = parse_scalar(&master[..32])
        .filter(|k| !bool::from(k.is_zero()))
        .ok_or_else(|| IdentityError::Derivation("invalid master key".to_string()))?;
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&master[32..]);

    for &index in path.indices() {
        let index_bytes = index.to_be_bytes();
        let digest = if index & HARDENED != 0 {
            let key_bytes = key.to_repr();
            hmac_sha512(&chain_code, &[&[0u8], key_bytes.as_slice(), &index_bytes])?
        } else {
            let public = to_secret_key(&key)?.public_key().to_encoded_point(true);
            hmac_sha512(&chain_code, &[public.as_bytes(), &index_bytes])?
        };

        let tweak = parse_scalar(&digest[..32])
            .ok_or_else(|| IdentityError::Derivation(format!("invalid child key at index {}", index)))?;
        let child = tweak + key;
        if bool::from(child.is_zero()) {
            return Err(IdentityError::Derivation(format!("zero child key at index {}", index)));
        }

        key = child;
        chain_code.copy_from_slice(&digest[32..]);
    }

    to_secret_key(&key)
}

/// Ledger address controlled by `secret`
pub fn address_of(secret: &SecretKey) -> Address {
    let point = secret.public_key().to_encoded_point(false);
    let mut uncompressed = [0u8; 64];
    uncompressed.copy_from_slice(&point.as_bytes()[1..]);
    Address::from_public_key(&uncompressed)
}
