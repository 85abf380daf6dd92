//! HTTP JSON-RPC implementation of [`NetworkConnection`]

use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::rpc_errors::{RpcError, RpcResult};
use super::NetworkConnection;
use crate::config::RpcConfig;
use crate::metrics::metrics;
use crate::types::TxReceipt;

/// ERC-20 `balanceOf(address)` selector
const BALANCE_OF_SELECTOR: &str = "70a08231";

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// Rate-limited JSON-RPC connection to one endpoint
pub struct JsonRpcConnection {
    url: String,
    http: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
    receipt_poll_interval: Duration,
    next_id: AtomicU64,
}

impl std::fmt::Debug for JsonRpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcConnection")
            .field("url", &self.url)
            .field("receipt_poll_interval", &self.receipt_poll_interval)
            .finish()
    }
}

impl JsonRpcConnection {
    pub fn new(url: &str, config: &RpcConfig) -> RpcResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RpcError::Transport {
                endpoint: url.to_string(),
                message: e.to_string(),
            })?;

        let rps = NonZeroU32::new(config.rate_limit_rps).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            url: url.to_string(),
            http,
            limiter: RateLimiter::direct(Quota::per_second(rps)),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> RpcResult<Value> {
        self.limiter.until_ready().await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        trace!(method, id, endpoint = %self.url, "JSON-RPC request");
        let started = Instant::now();

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport {
                endpoint: self.url.clone(),
                message: e.to_string(),
            })?;

        metrics()
            .rpc_latency
            .observe(started.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::HttpStatus {
                endpoint: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let payload: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::decode(method, e.to_string()))?;

        if let Some(err) = payload.error {
            debug!(method, code = err.code, message = %err.message, "JSON-RPC error");
            return Err(RpcError::RpcResponse {
                endpoint: self.url.clone(),
                code: err.code,
                message: err.message,
            });
        }

        Ok(payload.result.unwrap_or(Value::Null))
    }

    async fn transaction_receipt(&self, hash: TxHash) -> RpcResult<Option<TxReceipt>> {
        let value = self
            .call("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        parse_receipt(&value).map(Some)
    }
}

#[async_trait]
impl NetworkConnection for JsonRpcConnection {
    async fn pending_transaction_count(&self, address: Address) -> RpcResult<u64> {
        let method = "eth_getTransactionCount";
        let value = self
            .call(method, json!([address.to_string(), "pending"]))
            .await?;
        parse_u64(method, &value)
    }

    async fn balance(&self, address: Address) -> RpcResult<U256> {
        let method = "eth_getBalance";
        let value = self
            .call(method, json!([address.to_string(), "latest"]))
            .await?;
        parse_u256(method, &value)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> RpcResult<U256> {
        let method = "eth_call";
        let data = balance_of_calldata(owner);
        let value = self
            .call(
                method,
                json!([{ "to": token.to_string(), "data": data }, "latest"]),
            )
            .await?;
        parse_u256(method, &value)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> RpcResult<TxHash> {
        let method = "eth_sendRawTransaction";
        let value = self
            .call(method, json!([format!("0x{}", hex::encode(raw))]))
            .await?;
        let text = value
            .as_str()
            .ok_or_else(|| RpcError::decode(method, "expected transaction hash string"))?;
        text.parse::<TxHash>()
            .map_err(|e| RpcError::decode(method, e.to_string()))
    }

    /// Poll until mined. Transient failures keep polling; the caller bounds
    /// the wait with its confirmation timeout.
    async fn wait_for_receipt(&self, hash: TxHash) -> RpcResult<TxReceipt> {
        loop {
            match self.transaction_receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    warn!(%hash, "Receipt poll failed, retrying: {}", e);
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }
}

fn balance_of_calldata(owner: Address) -> String {
    format!("0x{}{:0>64}", BALANCE_OF_SELECTOR, hex::encode(owner.as_slice()))
}

fn hex_digits<'a>(method: &str, value: &'a Value) -> RpcResult<&'a str> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcError::decode(method, format!("expected hex string, got {}", value)))?;
    Ok(text.strip_prefix("0x").unwrap_or(text))
}

fn parse_u64(method: &str, value: &Value) -> RpcResult<u64> {
    let digits = hex_digits(method, value)?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| RpcError::decode(method, e.to_string()))
}

fn parse_u256(method: &str, value: &Value) -> RpcResult<U256> {
    let digits = hex_digits(method, value)?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|e| RpcError::decode(method, e.to_string()))
}

fn receipt_field<'a>(method: &str, value: &'a Value, name: &str) -> RpcResult<&'a Value> {
    value
        .get(name)
        .ok_or_else(|| RpcError::decode(method, format!("missing field {}", name)))
}

fn parse_receipt(value: &Value) -> RpcResult<TxReceipt> {
    let method = "eth_getTransactionReceipt";
    let field = |name: &str| receipt_field(method, value, name);

    let transaction_hash = field("transactionHash")?
        .as_str()
        .ok_or_else(|| RpcError::decode(method, "transactionHash is not a string"))?
        .parse::<TxHash>()
        .map_err(|e| RpcError::decode(method, e.to_string()))?;

    Ok(TxReceipt {
        transaction_hash,
        status: parse_u64(method, field("status")?)? == 1,
        block_number: parse_u64(method, field("blockNumber")?)?,
        gas_used: parse_u64(method, field("gasUsed")?)?,
    })
}
