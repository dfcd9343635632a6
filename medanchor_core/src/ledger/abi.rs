// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! Minimal contract ABI codec for the identity registry surface

use thiserror::Error;

use crate::types::{keccak256, Address};

/// Selector of the standard `Error(string)` revert payload
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

pub const REGISTER_PATIENT: &str = "registerPatient(address)";
pub const REGISTER_DEPENDENT: &str = "registerDependent(address)";
pub const GET_MY_DID: &str = "getMyDID()";
pub const ADD_RECORD: &str = "addRecord(string,string)";
pub const BOOK_APPOINTMENT: &str = "bookAppointment(uint256,uint256,string,string)";

/// ABI decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("Payload too short: need {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("Invalid offset: {0}")]
    InvalidOffset(usize),

    #[error("Value does not fit: {0}")]
    Overflow(String),

    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    #[error("Unknown selector: 0x{0}")]
    UnknownSelector(String),
}

/// A single ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u64),
    String(String),
}

/// Static type of a parameter, used when decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint,
    String,
}

/// First four bytes of the Keccak-256 hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn word_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn padded_len(len: usize) -> usize {
    (len + 31) / 32 * 32
}

/// Encode tokens with head/tail layout
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * 32;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Address(address) => {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(address.as_bytes());
                head.extend_from_slice(&word);
            }
            Token::Uint(value) => head.extend_from_slice(&word_from_u64(*value)),
            Token::String(value) => {
                head.extend_from_slice(&word_from_u64((head_len + tail.len()) as u64));
                let bytes = value.as_bytes();
                tail.extend_from_slice(&word_from_u64(bytes.len() as u64));
                tail.extend_from_slice(bytes);
                tail.resize(tail.len() + padded_len(bytes.len()) - bytes.len(), 0);
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Encode a function call: selector followed by the encoded arguments
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode(tokens));
    data
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    offset
        .checked_add(32)
        .and_then(|end| data.get(offset..end))
        .ok_or(AbiError::Truncated { offset, needed: 32 })
}

fn u64_from_word(word: &[u8]) -> Result<u64, AbiError> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow(hex::encode(word)));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(bytes))
}

fn usize_from_word(word: &[u8]) -> Result<usize, AbiError> {
    let value = u64_from_word(word)?;
    usize::try_from(value).map_err(|_| AbiError::Overflow(value.to_string()))
}

/// Decode `data` (without selector) against the given parameter types
pub fn decode(data: &[u8], params: &[ParamType]) -> Result<Vec<Token>, AbiError> {
    let mut tokens = Vec::with_capacity(params.len());

    for (i, param) in params.iter().enumerate() {
        let word = word_at(data, i * 32)?;
        let token = match param {
            ParamType::Address => {
                let mut bytes = [0u8; 20];
                bytes.copy_from_slice(&word[12..]);
                Token::Address(Address::new(bytes))
            }
            ParamType::Uint => Token::Uint(u64_from_word(word)?),
            ParamType::String => {
                let offset = usize_from_word(word)?;
                if offset % 32 != 0 {
                    return Err(AbiError::InvalidOffset(offset));
                }
                let len = usize_from_word(word_at(data, offset)?)?;
                let start = offset + 32;
                let bytes = start
                    .checked_add(len)
                    .and_then(|end| data.get(start..end))
                    .ok_or(AbiError::Truncated { offset: start, needed: len })?;
                Token::String(String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)?)
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/// Decode a single returned address, as from `getMyDID()`
pub fn decode_address(data: &[u8]) -> Result<Address, AbiError> {
    match decode(data, &[ParamType::Address])?.pop() {
        Some(Token::Address(address)) => Ok(address),
        _ => Err(AbiError::Truncated { offset: 0, needed: 32 }),
    }
}

/// Build an `Error(string)` revert payload
pub fn encode_revert(reason: &str) -> Vec<u8> {
    let mut data = ERROR_STRING_SELECTOR.to_vec();
    data.extend_from_slice(&encode(&[Token::String(reason.to_string())]));
    data
}

/// Extract the reason string from an `Error(string)` revert payload
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    match decode(&data[4..], &[ParamType::String]).ok()?.pop()? {
        Token::String(reason) => Some(reason),
        _ => None,
    }
}

/// Split calldata into its selector and argument payload
pub fn split_selector(data: &[u8]) -> Result<([u8; 4], &[u8]), AbiError> {
    if data.len() < 4 {
        return Err(AbiError::Truncated { offset: 0, needed: 4 });
    }
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&data[..4]);
    Ok((sel, &data[4..]))
}
