//! Composition of the per-kind reconcilers into the views the hooks return.

use std::collections::BTreeSet;

use super::{ProposalLookup, Reconcilable};
use crate::models::{
    DaoEntries, IndexedProposal, PendingDeposit, PendingExecution, PendingKind, PendingProposal,
    PendingVote, Transfer,
};

/// Snapshot of every pending kind for one DAO
#[derive(Debug, Clone, Default)]
pub struct DaoPending {
    pub votes: DaoEntries<PendingVote>,
    pub executions: DaoEntries<PendingExecution>,
    pub proposals: DaoEntries<PendingProposal>,
    pub deposits: DaoEntries<PendingDeposit>,
}

/// Pending ids to evict, per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evictions {
    pub votes: BTreeSet<String>,
    pub executions: BTreeSet<String>,
    pub proposals: BTreeSet<String>,
    pub deposits: BTreeSet<String>,
}

impl Evictions {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.votes.len() + self.executions.len() + self.proposals.len() + self.deposits.len()
    }

    pub fn of(&self, kind: PendingKind) -> &BTreeSet<String> {
        match kind {
            PendingKind::Votes => &self.votes,
            PendingKind::Executions => &self.executions,
            PendingKind::Proposals => &self.proposals,
            PendingKind::Deposits => &self.deposits,
        }
    }
}

/// A merged view and what it superseded
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay<T> {
    pub merged: T,
    pub evictions: Evictions,
}

// Indexer data: merges, and evicts what the indexer already shows
fn overlay_indexed(
    proposal: IndexedProposal,
    pending: &DaoPending,
    evictions: &mut Evictions,
) -> IndexedProposal {
    let with_votes = Reconcilable::<PendingVote>::reconcile(proposal, &pending.votes);
    evictions.votes.extend(with_votes.evict);

    let with_execution =
        Reconcilable::<PendingExecution>::reconcile(with_votes.merged, &pending.executions);
    evictions.executions.extend(with_execution.evict);

    with_execution.merged
}

// A local snapshot is not indexer confirmation, so nothing it contains may evict
fn overlay_snapshot(proposal: IndexedProposal, pending: &DaoPending) -> IndexedProposal {
    overlay_indexed(proposal, pending, &mut Evictions::default())
}

/// Merge pending state into the indexer's answer for one proposal id
pub fn overlay_proposal(
    id: &str,
    fetched: Option<IndexedProposal>,
    pending: &DaoPending,
) -> Overlay<Option<IndexedProposal>> {
    let mut evictions = Evictions::default();
    let indexed = fetched.is_some();
    let fetched = fetched.map(|p| overlay_indexed(p, pending, &mut evictions));

    let lookup = ProposalLookup::new(id, fetched).reconcile(&pending.proposals);
    evictions.proposals = lookup.evict;

    let merged = if indexed {
        lookup.merged
    } else {
        lookup.merged.map(|snapshot| overlay_snapshot(snapshot, pending))
    };

    Overlay { merged, evictions }
}

/// Merge pending state into the indexer's proposal list for a DAO
pub fn overlay_proposal_list(
    fetched: Vec<IndexedProposal>,
    pending: &DaoPending,
) -> Overlay<Vec<IndexedProposal>> {
    let mut evictions = Evictions::default();
    let fetched_len = fetched.len();
    let fetched: Vec<IndexedProposal> = fetched
        .into_iter()
        .map(|p| overlay_indexed(p, pending, &mut evictions))
        .collect();

    let listed = fetched.reconcile(&pending.proposals);
    evictions.proposals = listed.evict;

    // Unlisted pending snapshots sit at the front
    let snapshots = listed.merged.len() - fetched_len;
    let merged = listed
        .merged
        .into_iter()
        .enumerate()
        .map(|(i, p)| if i < snapshots { overlay_snapshot(p, pending) } else { p })
        .collect();

    Overlay { merged, evictions }
}

/// Merge pending deposits into the indexer's transfer list for a DAO
pub fn overlay_transfers(fetched: Vec<Transfer>, pending: &DaoPending) -> Overlay<Vec<Transfer>> {
    let result = fetched.reconcile(&pending.deposits);
    Overlay {
        merged: result.merged,
        evictions: Evictions {
            deposits: result.evict,
            ..Evictions::default()
        },
    }
}
