//! Governance Service
//!
//! Submits governance transactions for a DAO and records each accepted one in
//! the pending store, so the dashboard shows it before the indexer catches up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use validator::Validate;

use super::submitter::{ProposalSubmission, SubmitError, TransactionSubmitter, TxResult, TxStatus};
use crate::cache::PendingStore;
use crate::models::{
    normalize_address, IndexedProposal, PendingDeposit, PendingEntry, PendingExecution,
    PendingProposal, PendingVote, ProposalAction, ProposalMetadata, ProposalResource,
    ProposalStatus, Tally, TokenAmount, TokenInfo, VoteChoice, VotingSettings,
};

/// Governance service errors
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Submission error: {0}")]
    SubmitError(#[from] SubmitError),

    #[error("Transaction {hash} failed: {reason}")]
    TransactionFailed { hash: String, reason: String },
}

/// DTO for casting a vote
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CastVoteDto {
    #[validate(length(min = 1, max = 128))]
    pub voter: String,
    pub choice: VoteChoice,
    pub weight: TokenAmount,
    /// The voter is replacing an earlier vote
    #[serde(default)]
    pub replace: bool,
}

/// DTO for creating a proposal
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProposalDto {
    #[validate(length(min = 1, max = 128))]
    pub creator: String,
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[validate(length(max = 2048))]
    pub summary: String,
    pub description: Option<String>,
    #[serde(default)]
    pub resources: Vec<ProposalResource>,
    #[serde(default)]
    pub settings: VotingSettings,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub actions: Vec<ProposalAction>,
}

/// DTO for depositing tokens into a DAO treasury
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DepositDto {
    #[validate(length(min = 1, max = 128))]
    pub sender: String,
    pub token: TokenInfo,
    pub amount: TokenAmount,
}

/// Governance service for submitting DAO transactions
#[derive(Clone)]
pub struct GovernanceService {
    submitter: Arc<dyn TransactionSubmitter>,
    store: Arc<PendingStore>,
}

impl GovernanceService {
    pub fn new(submitter: Arc<dyn TransactionSubmitter>, store: Arc<PendingStore>) -> Self {
        Self { submitter, store }
    }

    /// Cast a vote signed by `dto.voter`. The pending vote is recorded once the
    /// transaction is confirmed, so the cached voter is always the signer; a
    /// re-vote by the same voter overwrites the earlier entry.
    pub async fn cast_vote(
        &self,
        dao_address: &str,
        proposal_id: &str,
        dto: CastVoteDto,
    ) -> Result<TxResult, GovernanceError> {
        dto.validate()?;
        let dao = normalize_address(dao_address);

        info!(
            dao = %dao,
            proposal_id = proposal_id,
            voter = %dto.voter,
            choice = %dto.choice,
            "Casting vote"
        );

        let tx = self
            .submitter
            .submit_vote(&dao, proposal_id, &dto.voter, dto.choice)
            .await?;
        let tx = reject_failed(tx)?;

        if tx.status == TxStatus::Success {
            self.store.insert_entry(PendingEntry::Vote(PendingVote {
                dao_address: dao,
                proposal_id: proposal_id.to_string(),
                voter: dto.voter,
                choice: dto.choice,
                weight: dto.weight,
                replaced: dto.replace,
            }));
        } else {
            warn!(tx_hash = %tx.hash, "Vote not yet confirmed, not caching");
        }

        Ok(tx)
    }

    /// Execute a passed proposal
    pub async fn execute_proposal(
        &self,
        dao_address: &str,
        proposal_id: &str,
    ) -> Result<TxResult, GovernanceError> {
        let dao = normalize_address(dao_address);
        info!(dao = %dao, proposal_id = proposal_id, "Executing proposal");

        let tx = self.submitter.submit_execution(&dao, proposal_id).await?;
        let tx = reject_failed(tx)?;

        if tx.status == TxStatus::Success {
            self.store
                .insert_entry(PendingEntry::Execution(PendingExecution {
                    dao_address: dao,
                    proposal_id: proposal_id.to_string(),
                    tx_hash: tx.hash.clone(),
                    executed_at: Utc::now(),
                }));
        } else {
            warn!(tx_hash = %tx.hash, "Execution not yet confirmed, not caching");
        }

        Ok(tx)
    }

    /// Create a proposal. The snapshot is cached as soon as the relayer has
    /// accepted the transaction, shaped as the indexer will report it.
    pub async fn create_proposal(
        &self,
        dao_address: &str,
        dto: CreateProposalDto,
    ) -> Result<ProposalSubmission, GovernanceError> {
        dto.validate()?;
        if dto.end_date <= dto.start_date {
            return Err(GovernanceError::InvalidRequest(
                "end_date must be after start_date".to_string(),
            ));
        }
        let dao = normalize_address(dao_address);

        info!(
            dao = %dao,
            creator = %dto.creator,
            title = %dto.title,
            "Creating proposal"
        );

        let metadata = ProposalMetadata {
            title: dto.title,
            summary: dto.summary,
            description: dto.description,
            resources: dto.resources,
        };

        let submission = self
            .submitter
            .submit_proposal(&dao, &metadata, &dto.actions)
            .await?;
        let tx = reject_failed(submission.tx)?;

        let now = Utc::now();
        let snapshot = IndexedProposal {
            id: submission.proposal_id.clone(),
            dao_address: dao,
            creator: dto.creator,
            metadata,
            settings: dto.settings,
            start_date: dto.start_date,
            end_date: dto.end_date,
            created_at: now,
            status: if dto.start_date > now {
                ProposalStatus::Pending
            } else {
                ProposalStatus::Active
            },
            execution: None,
            voters: vec![],
            tally: Tally::default(),
            actions: dto.actions,
        };

        self.store
            .insert_entry(PendingEntry::Proposal(PendingProposal {
                snapshot,
                tx_hash: Some(tx.hash.clone()),
            }));

        info!(
            proposal_id = %submission.proposal_id,
            tx_hash = %tx.hash,
            "Proposal submitted"
        );

        Ok(ProposalSubmission {
            proposal_id: submission.proposal_id,
            tx,
        })
    }

    /// Deposit tokens into the DAO. The transaction hash doubles as the
    /// transfer id the indexer will report.
    pub async fn deposit(
        &self,
        dao_address: &str,
        dto: DepositDto,
    ) -> Result<TxResult, GovernanceError> {
        dto.validate()?;
        if dto.amount.is_zero() {
            return Err(GovernanceError::InvalidRequest(
                "amount must be greater than zero".to_string(),
            ));
        }
        let dao = normalize_address(dao_address);

        info!(
            dao = %dao,
            token = %dto.token.symbol,
            amount = %dto.amount,
            "Depositing tokens"
        );

        let tx = self
            .submitter
            .submit_deposit(&dao, &dto.token, dto.amount)
            .await?;
        let tx = reject_failed(tx)?;

        self.store.insert_entry(PendingEntry::Deposit(PendingDeposit {
            dao_address: dao,
            tx_id: tx.hash.clone(),
            token: dto.token,
            amount: dto.amount,
            sender: dto.sender,
            created_at: Utc::now(),
        }));

        Ok(tx)
    }
}

fn reject_failed(tx: TxResult) -> Result<TxResult, GovernanceError> {
    match tx.status {
        TxStatus::Failed => Err(GovernanceError::TransactionFailed {
            hash: tx.hash,
            reason: tx.error.unwrap_or_else(|| "unknown".to_string()),
        }),
        _ => Ok(tx),
    }
}
