use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::TokenAmount;

/// Lifecycle status of a proposal as reported by the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Active,
    Succeeded,
    Executed,
    Defeated,
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposalStatus::Pending => write!(f, "pending"),
            ProposalStatus::Active => write!(f, "active"),
            ProposalStatus::Succeeded => write!(f, "succeeded"),
            ProposalStatus::Executed => write!(f, "executed"),
            ProposalStatus::Defeated => write!(f, "defeated"),
        }
    }
}

impl std::str::FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ProposalStatus::Pending),
            "active" => Ok(ProposalStatus::Active),
            "succeeded" => Ok(ProposalStatus::Succeeded),
            "executed" => Ok(ProposalStatus::Executed),
            "defeated" => Ok(ProposalStatus::Defeated),
            other => Err(format!("unknown proposal status: {}", other)),
        }
    }
}

/// Vote option cast by a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
    /// Multisig-style plugins only record approvals
    Approve,
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteChoice::Yes => write!(f, "yes"),
            VoteChoice::No => write!(f, "no"),
            VoteChoice::Abstain => write!(f, "abstain"),
            VoteChoice::Approve => write!(f, "approve"),
        }
    }
}

impl std::str::FromStr for VoteChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yes" => Ok(VoteChoice::Yes),
            "no" => Ok(VoteChoice::No),
            "abstain" => Ok(VoteChoice::Abstain),
            "approve" => Ok(VoteChoice::Approve),
            other => Err(format!("unknown vote choice: {}", other)),
        }
    }
}

/// Human-readable proposal content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resources: Vec<ProposalResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResource {
    pub name: String,
    pub url: String,
}

/// Voting rules captured when the proposal was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingSettings {
    /// Parts per million
    pub support_threshold: u32,
    /// Parts per million
    pub min_participation: u32,
    /// Seconds
    pub min_duration: u64,
}

/// Contract call the proposal performs when executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAction {
    pub to: String,
    pub value: TokenAmount,
    pub data: String,
}

/// Execution record attached to an executed proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub tx_hash: String,
    pub executed_at: DateTime<Utc>,
}

/// One entry in a proposal's voter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub address: String,
    pub choice: VoteChoice,
    pub weight: TokenAmount,
    #[serde(default)]
    pub vote_replaced: bool,
}

/// Aggregated voting weight per option
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: TokenAmount,
    pub no: TokenAmount,
    pub abstain: TokenAmount,
    #[serde(default)]
    pub approvals: u64,
}

impl Tally {
    /// Count one more vote of `weight` for `choice`
    pub fn add(&mut self, choice: VoteChoice, weight: TokenAmount) {
        match choice {
            VoteChoice::Yes => self.yes = self.yes.saturating_add(weight),
            VoteChoice::No => self.no = self.no.saturating_add(weight),
            VoteChoice::Abstain => self.abstain = self.abstain.saturating_add(weight),
            VoteChoice::Approve => self.approvals += 1,
        }
    }
}

/// A proposal as the indexer shapes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedProposal {
    pub id: String,
    pub dao_address: String,
    pub creator: String,
    pub metadata: ProposalMetadata,
    #[serde(default)]
    pub settings: VotingSettings,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: ProposalStatus,
    #[serde(default)]
    pub execution: Option<ExecutionInfo>,
    #[serde(default)]
    pub voters: Vec<VoterRecord>,
    #[serde(default)]
    pub tally: Tally,
    #[serde(default)]
    pub actions: Vec<ProposalAction>,
}

impl IndexedProposal {
    /// Whether `address` already appears in the voter list
    pub fn has_voter(&self, address: &str) -> bool {
        self.voters
            .iter()
            .any(|v| v.address.eq_ignore_ascii_case(address))
    }
}
