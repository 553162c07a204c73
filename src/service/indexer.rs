//! Indexer client
//!
//! Reads proposals and treasury transfers from the governance subgraph over
//! GraphQL. Integer fields come back as decimal strings and are parsed into
//! `TokenAmount`; timestamps come back as unix seconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    ExecutionInfo, IndexedProposal, ProposalAction, ProposalMetadata, ProposalStatus, Tally,
    TokenAmount, TokenInfo, Transfer, TransferDirection, VoteChoice, VoterRecord, VotingSettings,
};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Indexer unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Read side of the governance indexer
#[async_trait]
pub trait IndexerClient: Send + Sync {
    async fn fetch_proposal(
        &self,
        dao_address: &str,
        proposal_id: &str,
    ) -> Result<Option<IndexedProposal>, IndexerError>;

    async fn fetch_proposal_list(
        &self,
        dao_address: &str,
    ) -> Result<Vec<IndexedProposal>, IndexerError>;

    async fn fetch_transfer_list(&self, dao_address: &str) -> Result<Vec<Transfer>, IndexerError>;
}

const PROPOSAL_FIELDS: &str = r#"
    id dao { id } creator metadata { title summary description resources { name url } }
    supportThreshold minParticipation minDuration
    startDate endDate createdAt status executionTxHash executionDate
    yes no abstain approvals
    voters { address choice weight voteReplaced }
    actions { to value data }
"#;

/// GraphQL client for the subgraph
#[derive(Clone)]
pub struct GraphQlIndexer {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: String,
    variables: serde_json::Value,
    #[serde(rename = "operationName")]
    operation_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProposalData {
    proposal: Option<RawProposal>,
}

#[derive(Debug, Deserialize)]
struct ProposalListData {
    proposals: Vec<RawProposal>,
}

#[derive(Debug, Deserialize)]
struct TransferListData {
    transfers: Vec<RawTransfer>,
}

#[derive(Debug, Deserialize)]
struct RawDao {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProposal {
    id: String,
    dao: RawDao,
    creator: String,
    metadata: Option<ProposalMetadata>,
    #[serde(default)]
    support_threshold: Option<String>,
    #[serde(default)]
    min_participation: Option<String>,
    #[serde(default)]
    min_duration: Option<String>,
    start_date: String,
    end_date: String,
    created_at: String,
    status: String,
    execution_tx_hash: Option<String>,
    execution_date: Option<String>,
    #[serde(default)]
    yes: Option<String>,
    #[serde(default)]
    no: Option<String>,
    #[serde(default)]
    abstain: Option<String>,
    #[serde(default)]
    approvals: Option<u64>,
    #[serde(default)]
    voters: Vec<RawVoter>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVoter {
    address: String,
    choice: String,
    weight: String,
    #[serde(default)]
    vote_replaced: bool,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    to: String,
    value: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransfer {
    tx_hash: String,
    #[serde(rename = "type")]
    kind: String,
    token: RawToken,
    amount: String,
    from: String,
    to: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    id: String,
    symbol: String,
    decimals: u8,
}

impl GraphQlIndexer {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, IndexerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    async fn query<T>(
        &self,
        operation_name: &str,
        query: String,
        variables: serde_json::Value,
    ) -> Result<T, IndexerError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = GraphQlRequest {
            query,
            variables,
            operation_name,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    IndexerError::Unavailable(e.to_string())
                } else {
                    IndexerError::NetworkError(e)
                }
            })?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_server_error() {
            return Err(IndexerError::Unavailable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(IndexerError::QueryFailed(format!("HTTP {}: {}", status, text)));
        }

        let body: GraphQlResponse<T> = serde_json::from_str(&text)?;
        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            warn!(operation = operation_name, errors = ?messages, "Indexer returned errors");
            return Err(IndexerError::QueryFailed(messages.join("; ")));
        }

        debug!(operation = operation_name, "Indexer query succeeded");
        body.data
            .ok_or_else(|| IndexerError::InvalidResponse("missing data".to_string()))
    }
}

#[async_trait]
impl IndexerClient for GraphQlIndexer {
    async fn fetch_proposal(
        &self,
        _dao_address: &str,
        proposal_id: &str,
    ) -> Result<Option<IndexedProposal>, IndexerError> {
        let query = format!(
            "query Proposal($id: ID!) {{ proposal(id: $id) {{ {} }} }}",
            PROPOSAL_FIELDS
        );
        let data: ProposalData = self
            .query("Proposal", query, serde_json::json!({ "id": proposal_id }))
            .await?;
        data.proposal.map(RawProposal::into_model).transpose()
    }

    async fn fetch_proposal_list(
        &self,
        dao_address: &str,
    ) -> Result<Vec<IndexedProposal>, IndexerError> {
        let query = format!(
            "query Proposals($dao: String!) {{ proposals(where: {{ dao: $dao }}, orderBy: createdAt, orderDirection: desc) {{ {} }} }}",
            PROPOSAL_FIELDS
        );
        let data: ProposalListData = self
            .query("Proposals", query, serde_json::json!({ "dao": dao_address.to_ascii_lowercase() }))
            .await?;
        data.proposals
            .into_iter()
            .map(RawProposal::into_model)
            .collect()
    }

    async fn fetch_transfer_list(&self, dao_address: &str) -> Result<Vec<Transfer>, IndexerError> {
        let query = "query Transfers($dao: String!) { transfers(where: { dao: $dao }, orderBy: createdAt, orderDirection: desc) { txHash type token { id symbol decimals } amount from to createdAt } }".to_string();
        let data: TransferListData = self
            .query("Transfers", query, serde_json::json!({ "dao": dao_address.to_ascii_lowercase() }))
            .await?;
        data.transfers
            .into_iter()
            .map(RawTransfer::into_model)
            .collect()
    }
}

fn parse_amount(field: &str, value: &str) -> Result<TokenAmount, IndexerError> {
    TokenAmount::from_dec_str(value)
        .map_err(|e| IndexerError::InvalidResponse(format!("{}: {}", field, e)))
}

fn parse_optional_amount(field: &str, value: Option<&str>) -> Result<TokenAmount, IndexerError> {
    value.map_or(Ok(TokenAmount::zero()), |v| parse_amount(field, v))
}

fn parse_number<T: std::str::FromStr>(field: &str, value: Option<&str>) -> Result<T, IndexerError>
where
    T: Default,
{
    match value {
        None => Ok(T::default()),
        Some(v) => v
            .parse()
            .map_err(|_| IndexerError::InvalidResponse(format!("{}: {}", field, v))),
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, IndexerError> {
    let secs: i64 = value
        .parse()
        .map_err(|_| IndexerError::InvalidResponse(format!("{}: {}", field, value)))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| IndexerError::InvalidResponse(format!("{} out of range: {}", field, value)))
}

impl RawProposal {
    fn into_model(self) -> Result<IndexedProposal, IndexerError> {
        let status: ProposalStatus = self
            .status
            .parse()
            .map_err(IndexerError::InvalidResponse)?;

        let execution = match (self.execution_tx_hash, self.execution_date) {
            (Some(tx_hash), Some(date)) => Some(ExecutionInfo {
                tx_hash,
                executed_at: parse_timestamp("executionDate", &date)?,
            }),
            _ => None,
        };

        let voters = self
            .voters
            .into_iter()
            .map(|v| {
                Ok(VoterRecord {
                    choice: v
                        .choice
                        .parse::<VoteChoice>()
                        .map_err(IndexerError::InvalidResponse)?,
                    weight: parse_amount("weight", &v.weight)?,
                    address: v.address,
                    vote_replaced: v.vote_replaced,
                })
            })
            .collect::<Result<Vec<_>, IndexerError>>()?;

        let actions = self
            .actions
            .into_iter()
            .map(|a| {
                Ok(ProposalAction {
                    value: parse_amount("value", &a.value)?,
                    to: a.to,
                    data: a.data,
                })
            })
            .collect::<Result<Vec<_>, IndexerError>>()?;

        Ok(IndexedProposal {
            id: self.id,
            dao_address: self.dao.id,
            creator: self.creator,
            metadata: self.metadata.unwrap_or_default(),
            settings: VotingSettings {
                support_threshold: parse_number("supportThreshold", self.support_threshold.as_deref())?,
                min_participation: parse_number("minParticipation", self.min_participation.as_deref())?,
                min_duration: parse_number("minDuration", self.min_duration.as_deref())?,
            },
            start_date: parse_timestamp("startDate", &self.start_date)?,
            end_date: parse_timestamp("endDate", &self.end_date)?,
            created_at: parse_timestamp("createdAt", &self.created_at)?,
            status,
            execution,
            voters,
            tally: Tally {
                yes: parse_optional_amount("yes", self.yes.as_deref())?,
                no: parse_optional_amount("no", self.no.as_deref())?,
                abstain: parse_optional_amount("abstain", self.abstain.as_deref())?,
                approvals: self.approvals.unwrap_or_default(),
            },
            actions,
        })
    }
}

impl RawTransfer {
    fn into_model(self) -> Result<Transfer, IndexerError> {
        let direction = match self.kind.to_ascii_lowercase().as_str() {
            "deposit" => TransferDirection::Deposit,
            "withdraw" => TransferDirection::Withdraw,
            other => {
                return Err(IndexerError::InvalidResponse(format!(
                    "unknown transfer type: {}",
                    other
                )))
            }
        };

        Ok(Transfer {
            tx_id: self.tx_hash,
            direction,
            token: TokenInfo {
                address: self.token.id,
                symbol: self.token.symbol,
                decimals: self.token.decimals,
            },
            amount: parse_amount("amount", &self.amount)?,
            sender: self.from,
            recipient: self.to,
            created_at: parse_timestamp("createdAt", &self.created_at)?,
        })
    }
}
