//! Reconciler
//!
//! Pure merge/evict logic between indexer results and pending entries. Nothing
//! here touches the store: each reconciliation returns the merged view plus
//! the ids the caller should evict. Eviction is only ever derived from data
//! the indexer returned, never from its absence.

pub mod deposit;
pub mod execution;
pub mod overlay;
pub mod proposal;
pub mod vote;

use std::collections::BTreeSet;

use crate::models::{DaoEntries, PendingEntity};

pub use overlay::{
    overlay_proposal, overlay_proposal_list, overlay_transfers, DaoPending, Evictions, Overlay,
};
pub use proposal::ProposalLookup;

/// Merged view plus the pending ids the indexer has superseded
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<T> {
    pub merged: T,
    pub evict: BTreeSet<String>,
}

impl<T> Reconciliation<T> {
    /// Nothing to evict
    pub fn keep(merged: T) -> Self {
        Self {
            merged,
            evict: BTreeSet::new(),
        }
    }
}

/// Fetched indexer data that can absorb pending entries of kind `E`
pub trait Reconcilable<E: PendingEntity>: Sized {
    type Output;

    fn reconcile(self, pending: &DaoEntries<E>) -> Reconciliation<Self::Output>;
}
