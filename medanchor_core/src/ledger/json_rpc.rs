// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! EIP-1193 style wallet provider reached over HTTP JSON-RPC

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::ledger::abi;
use crate::ledger::transport::{CallRequest, SigningTransport, TransactionReceipt, TransportError};
use crate::types::{Address, TxHash};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorBody {
    /// Revert reason carried in `data`, either as a bare hex string or nested
    /// under `data.data` as some nodes do
    fn revert_reason(&self) -> Option<String> {
        let payload = match &self.data {
            Some(Value::String(hex)) => hex.clone(),
            Some(Value::Object(map)) => map.get("data")?.as_str()?.to_string(),
            _ => return None,
        };
        let bytes = hex::decode(payload.trim_start_matches("0x")).ok()?;
        abi::decode_revert(&bytes)
    }

    fn into_transport_error(self) -> TransportError {
        let message = match self.revert_reason() {
            Some(reason) => format!("execution reverted: {}", reason),
            None => self.message,
        };
        TransportError::Rpc {
            code: self.code,
            message,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    block_number: Option<String>,
    status: Option<String>,
    from: Address,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    from: Address,
    to: Option<Address>,
    input: String,
}

fn parse_quantity(value: &str) -> Result<u64, TransportError> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| TransportError::InvalidResponse(format!("bad quantity {:?}: {}", value, e)))
}

fn quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

fn call_object(request: &CallRequest) -> Value {
    let mut object = json!({
        "to": request.to,
        "data": format!("0x{}", hex::encode(&request.data)),
    });
    if let Some(from) = request.from {
        object["from"] = json!(from);
    }
    object
}

/// Wallet provider behind an HTTP JSON-RPC endpoint
pub struct JsonRpcTransport {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        }
    }

    /// Transport for the configured endpoint, with the configured request timeout
    pub fn from_config(config: &LedgerConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Unreachable(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::new(config.rpc_url.clone(), client))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_raw(&self, method: &str, params: Value) -> Result<Result<Value, RpcErrorBody>, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!("JSON-RPC {} #{} -> {}", method, id, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(format!("{}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(TransportError::Unreachable(format!(
                "JSON-RPC endpoint returned status: {}",
                response.status()
            )));
        }

        let response = response
            .json::<RpcResponse>()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("{}: {}", method, e)))?;

        match (response.error, response.result) {
            (Some(error), _) => Ok(Err(error)),
            (None, result) => Ok(Ok(result.unwrap_or(Value::Null))),
        }
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, TransportError> {
        let value = self.send_raw(method, params).await?.map_err(RpcErrorBody::into_transport_error)?;
        serde_json::from_value(value).map_err(|e| TransportError::InvalidResponse(format!("{}: {}", method, e)))
    }

    /// Re-run a failed transaction as a call against its parent block to recover the revert reason
    async fn replay_revert_reason(&self, hash: &TxHash, block_number: u64) -> Option<String> {
        let tx: Option<RpcTransaction> = self
            .request("eth_getTransactionByHash", json!([hash]))
            .await
            .ok()?;
        let tx = tx?;
        let call = json!({
            "from": tx.from,
            "to": tx.to?,
            "data": tx.input,
        });
        let block = quantity(block_number.saturating_sub(1));

        match self.send_raw("eth_call", json!([call, block])).await {
            Ok(Err(error)) => Some(error.revert_reason().unwrap_or(error.message)),
            Ok(Ok(Value::String(data))) => {
                let bytes = hex::decode(data.trim_start_matches("0x")).ok()?;
                abi::decode_revert(&bytes)
            }
            Ok(Ok(_)) => None,
            Err(e) => {
                warn!("Failed to replay reverted transaction {}: {}", hash, e);
                None
            }
        }
    }
}

#[async_trait]
impl SigningTransport for JsonRpcTransport {
    fn name(&self) -> &str {
        "json-rpc"
    }

    async fn request_addresses(&self) -> Result<Vec<Address>, TransportError> {
        self.request("eth_requestAccounts", json!([])).await
    }

    async fn chain_id(&self) -> Result<u64, TransportError> {
        let id: String = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&id)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), TransportError> {
        let _: Value = self
            .request("wallet_switchEthereumChain", json!([{ "chainId": quantity(chain_id) }]))
            .await?;
        Ok(())
    }

    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, TransportError> {
        let data: String = self.request("eth_call", json!([call_object(request), "latest"])).await?;
        hex::decode(data.trim_start_matches("0x"))
            .map_err(|e| TransportError::InvalidResponse(format!("eth_call: {}", e)))
    }

    async fn send_transaction(&self, request: &CallRequest) -> Result<TxHash, TransportError> {
        self.request("eth_sendTransaction", json!([call_object(request)])).await
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TransactionReceipt>, TransportError> {
        let receipt: Option<RpcReceipt> = self.request("eth_getTransactionReceipt", json!([hash])).await?;
        let receipt = match receipt {
            Some(receipt) => receipt,
            None => return Ok(None),
        };

        // Some providers return a receipt shell before inclusion
        let block_number = match receipt.block_number.as_deref() {
            Some(block) => parse_quantity(block)?,
            None => return Ok(None),
        };

        let success = match receipt.status.as_deref() {
            Some(status) => parse_quantity(status)? == 1,
            None => true,
        };

        let revert_reason = if success {
            None
        } else {
            self.replay_revert_reason(hash, block_number).await
        };

        Ok(Some(TransactionReceipt {
            tx_hash: receipt.transaction_hash,
            block_number,
            success,
            from: receipt.from,
            revert_reason,
        }))
    }

    async fn block_number(&self) -> Result<u64, TransportError> {
        let block: String = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&block)
    }
}
