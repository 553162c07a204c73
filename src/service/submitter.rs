//! Transaction submitter
//!
//! Sends governance transactions through the wallet relayer's JSON-RPC
//! endpoint and follows them until they land.
//!
//! # Features
//! - One method per governance action (vote, execute, create proposal, deposit)
//! - Automatic status polling with exponential backoff
//! - A transaction still unconfirmed after the retry budget is reported as
//!   `Pending` rather than failed

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{ProposalAction, ProposalMetadata, TokenAmount, TokenInfo, VoteChoice};

/// Transaction result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

/// Result of a submitted transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxResult {
    pub hash: String,
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a proposal-creation transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalSubmission {
    pub proposal_id: String,
    pub tx: TxResult,
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("RPC request failed: {0}")]
    RpcError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Retry limit exceeded")]
    RetryLimitExceeded,
}

/// Write side of the governance SDK
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Cast `choice` on behalf of `voter`; the relayer signs as that account
    async fn submit_vote(
        &self,
        dao_address: &str,
        proposal_id: &str,
        voter: &str,
        choice: VoteChoice,
    ) -> Result<TxResult, SubmitError>;

    async fn submit_execution(
        &self,
        dao_address: &str,
        proposal_id: &str,
    ) -> Result<TxResult, SubmitError>;

    async fn submit_proposal(
        &self,
        dao_address: &str,
        metadata: &ProposalMetadata,
        actions: &[ProposalAction],
    ) -> Result<ProposalSubmission, SubmitError>;

    async fn submit_deposit(
        &self,
        dao_address: &str,
        token: &TokenInfo,
        amount: TokenAmount,
    ) -> Result<TxResult, SubmitError>;
}

/// RPC request/response types
#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: String,
    method: String,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(flatten)]
    result: RpcResult,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcResult {
    Success { result: serde_json::Value },
    Error { error: RpcError },
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    hash: String,
    #[serde(default)]
    proposal_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionStatusResponse {
    status: String,
}

/// Submitter backed by a JSON-RPC relayer
#[derive(Clone)]
pub struct JsonRpcSubmitter {
    rpc_url: String,
    client: reqwest::Client,
    retry_config: RetryConfig,
}

impl JsonRpcSubmitter {
    pub fn new(rpc_url: &str) -> Self {
        Self::with_retry_config(rpc_url, RetryConfig::default())
    }

    pub fn with_retry_config(rpc_url: &str, retry_config: RetryConfig) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            client: reqwest::Client::new(),
            retry_config,
        }
    }

    /// Send a transaction and wait for its outcome
    async fn invoke(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<(TxResult, Option<String>), SubmitError> {
        info!(method = method, "Submitting governance transaction");

        let sent: SendResponse = self.rpc_call(method, params).await?;
        info!(tx_hash = %sent.hash, "Transaction submitted");

        let result = self
            .monitor_transaction(&sent.hash)
            .await
            .unwrap_or_else(|e| {
                warn!(tx_hash = %sent.hash, error = %e, "Failed to monitor transaction");
                TxResult {
                    hash: sent.hash.clone(),
                    status: TxStatus::Pending,
                    error: Some(format!("Monitoring failed: {}", e)),
                }
            });

        Ok((result, sent.proposal_id))
    }

    /// Poll a transaction until it completes or fails
    async fn monitor_transaction(&self, tx_hash: &str) -> Result<TxResult, SubmitError> {
        let mut attempt = 0;
        let mut delay = self.retry_config.initial_delay_ms;

        loop {
            match self.get_transaction_status(tx_hash).await {
                Ok(status) => match status.as_str() {
                    "SUCCESS" => {
                        info!(tx_hash = tx_hash, "Transaction succeeded");
                        return Ok(TxResult {
                            hash: tx_hash.to_string(),
                            status: TxStatus::Success,
                            error: None,
                        });
                    }
                    "FAILED" | "REVERTED" => {
                        error!(tx_hash = tx_hash, "Transaction failed");
                        return Ok(TxResult {
                            hash: tx_hash.to_string(),
                            status: TxStatus::Failed,
                            error: Some("Transaction failed on network".to_string()),
                        });
                    }
                    "NOT_FOUND" => {
                        if attempt >= self.retry_config.max_retries {
                            return Err(SubmitError::RetryLimitExceeded);
                        }
                    }
                    _ => {
                        if attempt >= self.retry_config.max_retries {
                            return Ok(TxResult {
                                hash: tx_hash.to_string(),
                                status: TxStatus::Pending,
                                error: Some(format!(
                                    "Transaction still pending after {} attempts",
                                    self.retry_config.max_retries
                                )),
                            });
                        }
                    }
                },
                Err(e) => {
                    warn!(
                        tx_hash = tx_hash,
                        attempt = attempt,
                        error = %e,
                        "Error checking transaction status"
                    );
                    if attempt >= self.retry_config.max_retries {
                        return Err(e);
                    }
                }
            }

            attempt += 1;
            debug!(
                tx_hash = tx_hash,
                attempt = attempt,
                delay_ms = delay,
                "Waiting before retry"
            );

            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay = next_delay(delay, &self.retry_config);
        }
    }

    async fn get_transaction_status(&self, tx_hash: &str) -> Result<String, SubmitError> {
        let response: TransactionStatusResponse = self
            .rpc_call("getTransaction", serde_json::json!({ "hash": tx_hash }))
            .await?;
        Ok(response.status.to_ascii_uppercase())
    }

    async fn rpc_call<T>(&self, method: &str, params: serde_json::Value) -> Result<T, SubmitError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: uuid::Uuid::new_v4().to_string(),
            method: method.to_string(),
            params,
        };

        let response = self.client.post(&self.rpc_url).json(&request).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(SubmitError::RpcError(format!("HTTP {}: {}", status, text)));
        }

        let rpc_response: RpcResponse = serde_json::from_str(&text)?;

        match rpc_response.result {
            RpcResult::Success { result } => {
                serde_json::from_value(result).map_err(SubmitError::SerializationError)
            }
            RpcResult::Error { error } => Err(SubmitError::RpcError(format!(
                "RPC error {}: {}",
                error.code, error.message
            ))),
        }
    }
}

/// Exponential backoff step, capped at `max_delay_ms`
fn next_delay(delay: u64, config: &RetryConfig) -> u64 {
    let next = (delay as f64 * config.backoff_multiplier) as u64;
    next.min(config.max_delay_ms)
}

#[async_trait]
impl TransactionSubmitter for JsonRpcSubmitter {
    async fn submit_vote(
        &self,
        dao_address: &str,
        proposal_id: &str,
        voter: &str,
        choice: VoteChoice,
    ) -> Result<TxResult, SubmitError> {
        let params = serde_json::json!({
            "dao": dao_address,
            "proposalId": proposal_id,
            "from": voter,
            "vote": choice,
        });
        let (tx, _) = self.invoke("dao_vote", params).await?;
        Ok(tx)
    }

    async fn submit_execution(
        &self,
        dao_address: &str,
        proposal_id: &str,
    ) -> Result<TxResult, SubmitError> {
        let params = serde_json::json!({
            "dao": dao_address,
            "proposalId": proposal_id,
        });
        let (tx, _) = self.invoke("dao_execute", params).await?;
        Ok(tx)
    }

    async fn submit_proposal(
        &self,
        dao_address: &str,
        metadata: &ProposalMetadata,
        actions: &[ProposalAction],
    ) -> Result<ProposalSubmission, SubmitError> {
        let actions: Vec<serde_json::Value> = actions
            .iter()
            .map(|a| serde_json::json!({ "to": a.to, "value": a.value.to_string(), "data": a.data }))
            .collect();
        let params = serde_json::json!({
            "dao": dao_address,
            "metadata": metadata,
            "actions": actions,
        });

        let (tx, proposal_id) = self.invoke("dao_createProposal", params).await?;
        let proposal_id = proposal_id.ok_or_else(|| {
            SubmitError::InvalidResponse("relayer did not return a proposal id".to_string())
        })?;

        Ok(ProposalSubmission { proposal_id, tx })
    }

    async fn submit_deposit(
        &self,
        dao_address: &str,
        token: &TokenInfo,
        amount: TokenAmount,
    ) -> Result<TxResult, SubmitError> {
        let params = serde_json::json!({
            "dao": dao_address,
            "token": token.address,
            "amount": amount.to_string(),
        });
        let (tx, _) = self.invoke("dao_deposit", params).await?;
        Ok(tx)
    }
}
