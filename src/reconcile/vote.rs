use std::collections::BTreeSet;
use tracing::debug;

use super::{Reconcilable, Reconciliation};
use crate::models::{DaoEntries, IndexedProposal, PendingVote};

/// Votes merge into the fetched proposal's voter list.
///
/// A voter the indexer already lists wins outright and the pending vote is
/// evicted; otherwise the pending vote is shown at the top of the list and
/// its weight counted in the tally.
impl Reconcilable<PendingVote> for IndexedProposal {
    type Output = IndexedProposal;

    fn reconcile(mut self, pending: &DaoEntries<PendingVote>) -> Reconciliation<IndexedProposal> {
        let mut evict = BTreeSet::new();
        let mut synthesized = Vec::new();

        for (id, vote) in pending.iter().filter(|(_, v)| v.proposal_id == self.id) {
            if self.has_voter(&vote.voter) {
                debug!(proposal_id = %self.id, voter = %vote.voter, "Indexer lists pending voter");
                evict.insert(id.clone());
                continue;
            }
            self.tally.add(vote.choice, vote.weight);
            synthesized.push(vote.to_voter_record());
        }

        if !synthesized.is_empty() {
            synthesized.append(&mut self.voters);
            self.voters = synthesized;
        }

        Reconciliation {
            merged: self,
            evict,
        }
    }
}
