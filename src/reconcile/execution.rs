use std::collections::BTreeSet;

use super::{Reconcilable, Reconciliation};
use crate::models::{DaoEntries, ExecutionInfo, IndexedProposal, PendingExecution, ProposalStatus};

/// Executions only touch the status of the fetched proposal.
///
/// `succeeded` is shown as `executed` with the cached hash and timestamp until
/// the indexer reports `executed` itself, at which point the entry is evicted.
impl Reconcilable<PendingExecution> for IndexedProposal {
    type Output = IndexedProposal;

    fn reconcile(
        mut self,
        pending: &DaoEntries<PendingExecution>,
    ) -> Reconciliation<IndexedProposal> {
        let Some(execution) = pending.get(&self.id) else {
            return Reconciliation::keep(self);
        };

        match self.status {
            ProposalStatus::Executed => Reconciliation {
                merged: self,
                evict: BTreeSet::from([execution.proposal_id.clone()]),
            },
            ProposalStatus::Succeeded => {
                self.status = ProposalStatus::Executed;
                self.execution = Some(ExecutionInfo {
                    tx_hash: execution.tx_hash.clone(),
                    executed_at: execution.executed_at,
                });
                Reconciliation::keep(self)
            }
            _ => Reconciliation::keep(self),
        }
    }
}
