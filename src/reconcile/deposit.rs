use std::collections::BTreeSet;

use super::{Reconcilable, Reconciliation};
use crate::models::{DaoEntries, PendingDeposit, Transfer};

/// Transfer list ∪ pending deposits the list does not contain yet, newest first.
impl Reconcilable<PendingDeposit> for Vec<Transfer> {
    type Output = Vec<Transfer>;

    fn reconcile(mut self, pending: &DaoEntries<PendingDeposit>) -> Reconciliation<Vec<Transfer>> {
        let mut evict = BTreeSet::new();
        let mut unlisted = Vec::new();

        for (id, deposit) in pending {
            if self.iter().any(|t| t.is_deposit_for(&deposit.tx_id)) {
                evict.insert(id.clone());
            } else {
                unlisted.push(deposit.to_transfer());
            }
        }

        self.extend(unlisted);
        self.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Reconciliation {
            merged: self,
            evict,
        }
    }
}
