/// RPC Client Module
///
/// This module handles all interactions with the Ethereum blockchain via
/// JSON-RPC. It wraps a plain HTTP client and provides convenient methods
/// for fetching block and transaction data from node providers such as
/// Infura.
pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::rpc::types::{RawBlock, RawTransaction};

/// Errors from the chain-access layer.
///
/// "Not found" is not an error: the reader methods return `Ok(None)` for
/// absent blocks and transactions so callers can treat it as a skip.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Read-only view of the chain consumed by the pipeline.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Number of the most recently mined block.
    async fn latest_block_number(&self) -> Result<u64, RpcError>;

    /// Fetch a block by number, with full transaction objects when
    /// `include_transactions` is set. `Ok(None)` means the block does not
    /// exist (yet).
    async fn get_block(
        &self,
        number: u64,
        include_transactions: bool,
    ) -> Result<Option<RawBlock>, RpcError>;

    /// Fetch a single transaction by hash.
    async fn get_transaction(&self, hash: &str) -> Result<Option<RawTransaction>, RpcError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

pub struct EthRpcClient {
    http: reqwest::Client,
    endpoint: String,
    request_id: AtomicU64,
}

impl EthRpcClient {
    /// Create a new client for the given JSON-RPC endpoint.
    pub fn new(endpoint: String) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self { http, endpoint, request_id: AtomicU64::new(1) })
    }

    /// The endpoint URL this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Verify the endpoint answers, returning the current chain height.
    pub async fn test_connection(&self) -> Result<u64, RpcError> {
        self.latest_block_number().await
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<R>, RpcError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::debug!("rpc call {} (id {})", method, id);

        let response: RpcResponse<R> =
            self.http.post(&self.endpoint).json(&body).send().await?.json().await?;

        if let Some(err) = response.error {
            return Err(RpcError::Rpc { code: err.code, message: err.message });
        }

        Ok(response.result)
    }
}

#[async_trait]
impl ChainReader for EthRpcClient {
    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        let raw: String = self
            .call("eth_blockNumber", json!([]))
            .await?
            .ok_or_else(|| RpcError::InvalidResponse("eth_blockNumber returned null".into()))?;

        parse_quantity(&raw)
    }

    async fn get_block(
        &self,
        number: u64,
        include_transactions: bool,
    ) -> Result<Option<RawBlock>, RpcError> {
        let params = json!([format!("0x{number:x}"), include_transactions]);
        let block = self.call("eth_getBlockByNumber", params).await?;

        if block.is_none() {
            tracing::warn!("block {} not found", number);
        }

        Ok(block)
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<RawTransaction>, RpcError> {
        let tx = self.call("eth_getTransactionByHash", json!([hash])).await?;

        if tx.is_none() {
            tracing::warn!("transaction {} not found", hash);
        }

        Ok(tx)
    }
}

/// Parse a 0x-prefixed hex quantity into a u64.
fn parse_quantity(raw: &str) -> Result<u64, RpcError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|_| RpcError::InvalidResponse(format!("bad quantity: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x10d4f").unwrap(), 68943);
        assert_eq!(parse_quantity("0xde0b6b3").unwrap(), 232783539);
    }

    #[test]
    fn rejects_garbage_quantities() {
        assert!(parse_quantity("0xzz").is_err());
        assert!(parse_quantity("").is_err());
    }

    #[test]
    fn decodes_error_envelope() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#;
        let response: RpcResponse<String> = serde_json::from_str(raw).unwrap();
        assert!(response.result.is_none());
        let err = response.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "method not found");
    }

    #[test]
    fn decodes_null_result_as_none() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let response: RpcResponse<RawBlock> = serde_json::from_str(raw).unwrap();
        assert!(response.result.is_none());
        assert!(response.error.is_none());
    }
}
