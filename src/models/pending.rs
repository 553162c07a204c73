//! Locally-synthesized records for transactions the indexer has not reflected yet.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::amount::TokenAmount;
use super::proposal::{IndexedProposal, VoteChoice, VoterRecord};
use super::transfer::{TokenInfo, Transfer, TransferDirection};
use super::normalize_address;

/// Pending entries of one kind for a single DAO, keyed by entity id
pub type DaoEntries<E> = BTreeMap<String, E>;

/// Pending entries of one kind, keyed by DAO address then entity id
pub type PendingMap<E> = BTreeMap<String, DaoEntries<E>>;

/// The four kinds of pending entity the store keeps apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingKind {
    Votes,
    Executions,
    Proposals,
    Deposits,
}

impl PendingKind {
    pub const ALL: [PendingKind; 4] = [
        PendingKind::Votes,
        PendingKind::Executions,
        PendingKind::Proposals,
        PendingKind::Deposits,
    ];

    /// Record name used in persistent storage
    pub fn storage_name(&self) -> &'static str {
        match self {
            PendingKind::Votes => "pendingVotes",
            PendingKind::Executions => "pendingExecutions",
            PendingKind::Proposals => "pendingProposals",
            PendingKind::Deposits => "pendingDeposits",
        }
    }
}

impl std::fmt::Display for PendingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_name())
    }
}

/// Common shape of every pending record
pub trait PendingEntity:
    Clone + std::fmt::Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: PendingKind;

    fn dao_address(&self) -> &str;

    /// Identity within the DAO; a second write with the same id overwrites
    fn entity_id(&self) -> String;
}

/// A vote confirmed on-chain but not yet in the indexer's voter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVote {
    pub dao_address: String,
    pub proposal_id: String,
    pub voter: String,
    pub choice: VoteChoice,
    pub weight: TokenAmount,
    #[serde(default)]
    pub replaced: bool,
}

impl PendingVote {
    pub fn vote_id(proposal_id: &str, voter: &str) -> String {
        format!("{}_{}", proposal_id, normalize_address(voter))
    }

    pub fn to_voter_record(&self) -> VoterRecord {
        VoterRecord {
            address: self.voter.clone(),
            choice: self.choice,
            weight: self.weight,
            vote_replaced: self.replaced,
        }
    }
}

impl PendingEntity for PendingVote {
    const KIND: PendingKind = PendingKind::Votes;

    fn dao_address(&self) -> &str {
        &self.dao_address
    }

    fn entity_id(&self) -> String {
        PendingVote::vote_id(&self.proposal_id, &self.voter)
    }
}

/// An execution transaction that succeeded before the indexer flipped the status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingExecution {
    pub dao_address: String,
    pub proposal_id: String,
    pub tx_hash: String,
    pub executed_at: DateTime<Utc>,
}

impl PendingEntity for PendingExecution {
    const KIND: PendingKind = PendingKind::Executions;

    fn dao_address(&self) -> &str {
        &self.dao_address
    }

    fn entity_id(&self) -> String {
        self.proposal_id.clone()
    }
}

/// A freshly created proposal, shaped the way the indexer will eventually return it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingProposal {
    pub snapshot: IndexedProposal,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl PendingEntity for PendingProposal {
    const KIND: PendingKind = PendingKind::Proposals;

    fn dao_address(&self) -> &str {
        &self.snapshot.dao_address
    }

    fn entity_id(&self) -> String {
        self.snapshot.id.clone()
    }
}

/// A treasury deposit submitted but not yet in the transfer list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeposit {
    pub dao_address: String,
    pub tx_id: String,
    pub token: TokenInfo,
    pub amount: TokenAmount,
    pub sender: String,
    pub created_at: DateTime<Utc>,
}

impl PendingDeposit {
    pub fn to_transfer(&self) -> Transfer {
        Transfer {
            tx_id: self.tx_id.clone(),
            direction: TransferDirection::Deposit,
            token: self.token.clone(),
            amount: self.amount,
            sender: self.sender.clone(),
            recipient: self.dao_address.clone(),
            created_at: self.created_at,
        }
    }
}

impl PendingEntity for PendingDeposit {
    const KIND: PendingKind = PendingKind::Deposits;

    fn dao_address(&self) -> &str {
        &self.dao_address
    }

    fn entity_id(&self) -> String {
        self.tx_id.to_ascii_lowercase()
    }
}

/// Any pending record, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entry", rename_all = "lowercase")]
pub enum PendingEntry {
    Vote(PendingVote),
    Execution(PendingExecution),
    Proposal(PendingProposal),
    Deposit(PendingDeposit),
}

impl PendingEntry {
    pub fn kind(&self) -> PendingKind {
        match self {
            PendingEntry::Vote(_) => PendingKind::Votes,
            PendingEntry::Execution(_) => PendingKind::Executions,
            PendingEntry::Proposal(_) => PendingKind::Proposals,
            PendingEntry::Deposit(_) => PendingKind::Deposits,
        }
    }

    pub fn dao_address(&self) -> &str {
        match self {
            PendingEntry::Vote(e) => e.dao_address(),
            PendingEntry::Execution(e) => e.dao_address(),
            PendingEntry::Proposal(e) => e.dao_address(),
            PendingEntry::Deposit(e) => e.dao_address(),
        }
    }

    pub fn entity_id(&self) -> String {
        match self {
            PendingEntry::Vote(e) => e.entity_id(),
            PendingEntry::Execution(e) => e.entity_id(),
            PendingEntry::Proposal(e) => e.entity_id(),
            PendingEntry::Deposit(e) => e.entity_id(),
        }
    }
}
