//! Blockchain proxy client
//!
//! The proxy is a plain request/response service: nonce lookup, network
//! parameters, broadcast and status queries. It never retries; resend and
//! nonce recovery belong to the [`crate::NonceTransactionHandler`].

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use oracle_core::{ExecutionError, ExecutionResult};

use crate::builder::Transaction;

/// Network parameters applied to every transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: String,
    pub min_gas_price: u64,
    #[serde(default)]
    pub min_gas_limit: u64,
}

/// Processing status of a broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Fail,
    Invalid,
}

impl TxStatus {
    /// Included in a block, so its nonce is consumed whatever the outcome
    pub fn is_executed(&self) -> bool {
        matches!(self, TxStatus::Success | TxStatus::Fail)
    }
}

#[async_trait]
pub trait BlockchainProxy: Send + Sync {
    async fn network_config(&self) -> ExecutionResult<NetworkConfig>;

    /// Next nonce the network expects from `address`
    async fn account_nonce(&self, address: Address) -> ExecutionResult<u64>;

    async fn send_transaction(&self, tx: &Transaction) -> ExecutionResult<B256>;

    async fn transaction_status(&self, hash: B256) -> ExecutionResult<TxStatus>;
}

/// Gateway response envelope
#[derive(Debug, Deserialize)]
struct GatewayResponse<T> {
    data: Option<T>,
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: String,
}

#[derive(Deserialize)]
struct ConfigData {
    config: NetworkConfig,
}

#[derive(Deserialize)]
struct NonceData {
    nonce: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendData {
    tx_hash: B256,
}

#[derive(Deserialize)]
struct StatusData {
    status: TxStatus,
}

/// Map a gateway error message to a typed error
pub fn classify_gateway_error(message: &str) -> ExecutionError {
    let lower = message.to_lowercase();
    if lower.contains("lowernonceintx") || lower.contains("nonce too low") {
        ExecutionError::NonceTooLow
    } else if lower.contains("highernonceintx") || lower.contains("nonce too high") {
        ExecutionError::NonceTooHigh
    } else {
        ExecutionError::Rejected(message.to_string())
    }
}

fn decode<T: DeserializeOwned>(success: bool, body: &str) -> ExecutionResult<T> {
    let envelope: GatewayResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if success => {
            return Err(ExecutionError::Proxy(format!("invalid gateway response: {}", e)))
        }
        Err(_) => return Err(ExecutionError::Proxy(format!("gateway error: {}", body.trim()))),
    };

    if !envelope.error.is_empty() {
        return Err(classify_gateway_error(&envelope.error));
    }
    if !success {
        return Err(ExecutionError::Proxy(format!("gateway returned code '{}'", envelope.code)));
    }
    envelope
        .data
        .ok_or_else(|| ExecutionError::Proxy("gateway response without data".into()))
}

/// REST gateway implementation of [`BlockchainProxy`]
#[derive(Debug, Clone)]
pub struct GatewayProxy {
    base_url: String,
    client: reqwest::Client,
}

impl GatewayProxy {
    pub fn new(base_url: &str, timeout: Duration) -> ExecutionResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ExecutionError::InvalidArgument("empty network address".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::Proxy(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> ExecutionResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ExecutionError::Proxy(e.to_string()))?;
        let success = response.status().is_success();
        let body = response
            .text()
            .await
            .map_err(|e| ExecutionError::Proxy(e.to_string()))?;
        decode(success, &body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ExecutionResult<T> {
        let url = format!("{}{}", self.base_url, path);
        trace!(url = %url, "gateway GET");
        self.read(self.client.get(&url)).await
    }
}

#[async_trait]
impl BlockchainProxy for GatewayProxy {
    async fn network_config(&self) -> ExecutionResult<NetworkConfig> {
        let data: ConfigData = self.get("/network/config").await?;
        Ok(data.config)
    }

    async fn account_nonce(&self, address: Address) -> ExecutionResult<u64> {
        let data: NonceData = self.get(&format!("/address/{}/nonce", address)).await?;
        Ok(data.nonce)
    }

    async fn send_transaction(&self, tx: &Transaction) -> ExecutionResult<B256> {
        let url = format!("{}/transaction/send", self.base_url);
        debug!(nonce = tx.nonce, gas_limit = tx.gas_limit, "broadcasting transaction");
        let data: SendData = self.read(self.client.post(&url).json(tx)).await?;
        Ok(data.tx_hash)
    }

    async fn transaction_status(&self, hash: B256) -> ExecutionResult<TxStatus> {
        let data: StatusData = self.get(&format!("/transaction/{}/status", hash)).await?;
        Ok(data.status)
    }
}
