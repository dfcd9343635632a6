// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! Maps raw provider failures onto a small taxonomy the coordinators act on

use std::borrow::Cow;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::ledger::{LedgerError, RawLedgerError};

/// Classified ledger failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The user declined to sign
    UserRejected,
    /// The signing account cannot pay for gas
    InsufficientFunds,
    /// Another flow registered the same account first
    AlreadyRegisteredRace,
    /// The session is on a different chain than the registry
    NetworkMismatch,
    /// Artifact write from an account without a DID
    NotRegistered,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Whether re-reading ledger state can resolve the failure
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::AlreadyRegisteredRace)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UserRejected => write!(f, "UserRejected"),
            ErrorKind::InsufficientFunds => write!(f, "InsufficientFunds"),
            ErrorKind::AlreadyRegisteredRace => write!(f, "AlreadyRegisteredRace"),
            ErrorKind::NetworkMismatch => write!(f, "NetworkMismatch"),
            ErrorKind::NotRegistered => write!(f, "NotRegistered"),
            ErrorKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// What a rule looks for in a raw failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Exact provider error code
    Code(i64),
    /// Case-insensitive substring of the message; stored lowercase
    Contains(Cow<'static, str>),
}

impl Matcher {
    pub fn contains(needle: impl Into<Cow<'static, str>>) -> Self {
        let needle: Cow<'static, str> = needle.into();
        let lower = needle.to_lowercase();
        if lower == needle {
            Matcher::Contains(needle)
        } else {
            Matcher::Contains(Cow::Owned(lower))
        }
    }

    fn matches(&self, code: Option<i64>, message_lower: &str) -> bool {
        match self {
            Matcher::Code(expected) => code == Some(*expected),
            Matcher::Contains(needle) => message_lower.contains(needle.as_ref()),
        }
    }
}

/// A single row of the mapping table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub matcher: Matcher,
    pub kind: ErrorKind,
}

impl ClassificationRule {
    pub fn new(matcher: Matcher, kind: ErrorKind) -> Self {
        Self { matcher, kind }
    }
}

const fn code(code: i64, kind: ErrorKind) -> ClassificationRule {
    ClassificationRule {
        matcher: Matcher::Code(code),
        kind,
    }
}

const fn text(needle: &'static str, kind: ErrorKind) -> ClassificationRule {
    ClassificationRule {
        matcher: Matcher::Contains(Cow::Borrowed(needle)),
        kind,
    }
}

/// Built-in table, first match wins. Codes come first since messages vary by wallet.
static DEFAULT_RULES: Lazy<Vec<ClassificationRule>> = Lazy::new(|| {
    vec![
        code(4001, ErrorKind::UserRejected),
        code(4902, ErrorKind::NetworkMismatch),
        text("user rejected", ErrorKind::UserRejected),
        text("user denied", ErrorKind::UserRejected),
        text("rejected by user", ErrorKind::UserRejected),
        text("insufficient funds", ErrorKind::InsufficientFunds),
        text("already registered", ErrorKind::AlreadyRegisteredRace),
        text("chain mismatch", ErrorKind::NetworkMismatch),
        text("wrong network", ErrorKind::NetworkMismatch),
        text("unrecognized chain", ErrorKind::NetworkMismatch),
        text("not registered", ErrorKind::NotRegistered),
    ]
});

/// Table-driven classifier for raw ledger failures
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl ErrorClassifier {
    /// Classifier with no rules; everything is `Unknown`
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule that takes precedence over every existing one
    pub fn with_rule(mut self, matcher: Matcher, kind: ErrorKind) -> Self {
        self.rules.insert(0, ClassificationRule::new(matcher, kind));
        self
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn classify(&self, raw: &RawLedgerError) -> ErrorKind {
        let message = raw.message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(raw.code, &message))
            .map(|rule| rule.kind)
            .unwrap_or(ErrorKind::Unknown)
    }

    pub fn classify_message(&self, message: &str) -> ErrorKind {
        self.classify(&RawLedgerError::from_message(message))
    }

    /// Kind and reason for errors that carry a provider failure; `None` for
    /// errors that are surfaced as-is (unreachable endpoint, timeout, ...)
    pub fn classify_ledger_error(&self, err: &LedgerError) -> Option<(ErrorKind, String)> {
        match err {
            LedgerError::WrongNetwork { .. } => Some((ErrorKind::NetworkMismatch, err.to_string())),
            _ => err.raw().map(|raw| (self.classify(&raw), raw.message)),
        }
    }
}
