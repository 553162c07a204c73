use std::collections::{BTreeSet, HashSet};

use super::{Reconcilable, Reconciliation};
use crate::models::{DaoEntries, IndexedProposal, PendingProposal};

/// Result of asking the indexer for a single proposal id
#[derive(Debug, Clone)]
pub struct ProposalLookup {
    pub id: String,
    pub fetched: Option<IndexedProposal>,
}

impl ProposalLookup {
    pub fn new(id: impl Into<String>, fetched: Option<IndexedProposal>) -> Self {
        Self {
            id: id.into(),
            fetched,
        }
    }
}

/// Presence is all that matters: any indexed copy evicts the pending snapshot,
/// an absent one is replaced by it.
impl Reconcilable<PendingProposal> for ProposalLookup {
    type Output = Option<IndexedProposal>;

    fn reconcile(
        self,
        pending: &DaoEntries<PendingProposal>,
    ) -> Reconciliation<Option<IndexedProposal>> {
        match self.fetched {
            Some(indexed) => {
                // TODO: confirm with product whether a freshly indexed proposal
                // with zero votes should keep the pending snapshot a bit longer
                let evict = if pending.contains_key(&self.id) {
                    BTreeSet::from([self.id])
                } else {
                    BTreeSet::new()
                };
                Reconciliation {
                    merged: Some(indexed),
                    evict,
                }
            }
            None => Reconciliation::keep(pending.get(&self.id).map(|p| p.snapshot.clone())),
        }
    }
}

/// Pending proposals the indexer has not listed yet go first, newest first.
impl Reconcilable<PendingProposal> for Vec<IndexedProposal> {
    type Output = Vec<IndexedProposal>;

    fn reconcile(
        self,
        pending: &DaoEntries<PendingProposal>,
    ) -> Reconciliation<Vec<IndexedProposal>> {
        let listed: HashSet<&str> = self.iter().map(|p| p.id.as_str()).collect();

        let mut evict = BTreeSet::new();
        let mut unlisted = Vec::new();
        for (id, entry) in pending {
            if listed.contains(id.as_str()) {
                evict.insert(id.clone());
            } else {
                unlisted.push(entry.snapshot.clone());
            }
        }
        unlisted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        unlisted.extend(self);
        Reconciliation {
            merged: unlisted,
            evict,
        }
    }
}
