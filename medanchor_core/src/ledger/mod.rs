// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! Access to the on-chain identity registry

pub mod abi;
mod error;
mod gateway;
mod json_rpc;
pub mod simulated;
mod transport;

pub use error::{LedgerError, RawLedgerError};
pub use gateway::{
    LedgerGateway,
    PendingTransaction,
    TransactionKind,
};
pub use json_rpc::JsonRpcTransport;
pub use simulated::{
    AnchoredAppointment,
    AnchoredRecord,
    LedgerEvent,
    SimulatedLedger,
};
pub use transport::{
    CallRequest,
    SigningTransport,
    TransactionReceipt,
    TransportError,
};
