use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::last_good::{self, LastGood};
use super::{Liveness, MergedResult, Poller};
use crate::cache::PendingStore;
use crate::models::{
    normalize_address, IndexedProposal, PendingDeposit, PendingExecution, PendingProposal,
    PendingVote, Transfer,
};
use crate::reconcile::{
    overlay_proposal, overlay_proposal_list, overlay_transfers, DaoPending, Evictions,
};
use crate::service::{IndexerClient, IndexerError};

type ProposalKey = (String, String);

/// Read side of the dashboard: indexer data with pending state overlaid
pub struct QueryHooks {
    indexer: Arc<dyn IndexerClient>,
    store: Arc<PendingStore>,
    // Last non-empty indexer answer per query, re-overlaid when the indexer is down
    last_proposal: LastGood<ProposalKey, IndexedProposal>,
    last_proposal_list: LastGood<String, Vec<IndexedProposal>>,
    last_transfers: LastGood<String, Vec<Transfer>>,
}

impl QueryHooks {
    pub fn new(indexer: Arc<dyn IndexerClient>, store: Arc<PendingStore>) -> Self {
        Self::with_last_good(
            indexer,
            store,
            last_good::DEFAULT_CAPACITY,
            last_good::DEFAULT_TTL,
        )
    }

    /// Bound the fallback answers kept per query shape
    pub fn with_last_good(
        indexer: Arc<dyn IndexerClient>,
        store: Arc<PendingStore>,
        capacity: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            indexer,
            store,
            last_proposal: LastGood::new(capacity, ttl),
            last_proposal_list: LastGood::new(capacity, ttl),
            last_transfers: LastGood::new(capacity, ttl),
        }
    }

    pub fn store(&self) -> &Arc<PendingStore> {
        &self.store
    }

    /// One proposal with pending votes and execution merged in; a proposal
    /// the indexer has not seen yet is served from its pending snapshot.
    pub async fn use_proposal(
        &self,
        dao_address: &str,
        proposal_id: &str,
        liveness: &Liveness,
    ) -> MergedResult<Option<IndexedProposal>> {
        let dao = normalize_address(dao_address);
        let key = (dao.clone(), proposal_id.to_string());

        match self.indexer.fetch_proposal(&dao, proposal_id).await {
            Ok(fetched) => {
                match &fetched {
                    Some(proposal) => self.last_proposal.remember(key, proposal.clone()),
                    None => self.last_proposal.forget(&key),
                }
                let overlay = overlay_proposal(proposal_id, fetched, &self.pending_for(&dao));
                self.apply_evictions(&dao, &overlay.evictions, liveness);
                MergedResult::fresh(overlay.merged)
            }
            Err(e) => {
                let last = self.last_proposal.recall(&key);
                let stale = last.is_some();
                let overlay = overlay_proposal(proposal_id, last, &self.pending_for(&dao));
                failed(&dao, "proposal", overlay.merged, e, stale)
            }
        }
    }

    /// Every proposal of a DAO, unindexed pending proposals first
    pub async fn use_proposal_list(
        &self,
        dao_address: &str,
        liveness: &Liveness,
    ) -> MergedResult<Vec<IndexedProposal>> {
        let dao = normalize_address(dao_address);

        match self.indexer.fetch_proposal_list(&dao).await {
            Ok(fetched) => {
                remember_list(&self.last_proposal_list, &dao, &fetched);
                let overlay = overlay_proposal_list(fetched, &self.pending_for(&dao));
                self.apply_evictions(&dao, &overlay.evictions, liveness);
                MergedResult::fresh(overlay.merged)
            }
            Err(e) => {
                let last = self.last_proposal_list.recall(&dao);
                let stale = last.is_some();
                let overlay =
                    overlay_proposal_list(last.unwrap_or_default(), &self.pending_for(&dao));
                failed(&dao, "proposal list", overlay.merged, e, stale)
            }
        }
    }

    /// Treasury transfers of a DAO with pending deposits merged in, newest first
    pub async fn use_transfer_list(
        &self,
        dao_address: &str,
        liveness: &Liveness,
    ) -> MergedResult<Vec<Transfer>> {
        let dao = normalize_address(dao_address);

        match self.indexer.fetch_transfer_list(&dao).await {
            Ok(fetched) => {
                remember_list(&self.last_transfers, &dao, &fetched);
                let overlay = overlay_transfers(fetched, &self.pending_for(&dao));
                self.apply_evictions(&dao, &overlay.evictions, liveness);
                MergedResult::fresh(overlay.merged)
            }
            Err(e) => {
                let last = self.last_transfers.recall(&dao);
                let stale = last.is_some();
                let overlay = overlay_transfers(last.unwrap_or_default(), &self.pending_for(&dao));
                failed(&dao, "transfer list", overlay.merged, e, stale)
            }
        }
    }

    /// Keep `use_proposal` fresh in the background
    pub fn poll_proposal(
        self: &Arc<Self>,
        dao_address: &str,
        proposal_id: &str,
        interval: Duration,
    ) -> Poller<Option<IndexedProposal>> {
        let hooks = Arc::clone(self);
        let dao = dao_address.to_string();
        let id = proposal_id.to_string();
        Poller::spawn(interval, move |liveness| {
            let hooks = Arc::clone(&hooks);
            let dao = dao.clone();
            let id = id.clone();
            async move { hooks.use_proposal(&dao, &id, &liveness).await }
        })
    }

    /// Keep `use_proposal_list` fresh in the background
    pub fn poll_proposal_list(
        self: &Arc<Self>,
        dao_address: &str,
        interval: Duration,
    ) -> Poller<Vec<IndexedProposal>> {
        let hooks = Arc::clone(self);
        let dao = dao_address.to_string();
        Poller::spawn(interval, move |liveness| {
            let hooks = Arc::clone(&hooks);
            let dao = dao.clone();
            async move { hooks.use_proposal_list(&dao, &liveness).await }
        })
    }

    /// Keep `use_transfer_list` fresh in the background
    pub fn poll_transfer_list(
        self: &Arc<Self>,
        dao_address: &str,
        interval: Duration,
    ) -> Poller<Vec<Transfer>> {
        let hooks = Arc::clone(self);
        let dao = dao_address.to_string();
        Poller::spawn(interval, move |liveness| {
            let hooks = Arc::clone(&hooks);
            let dao = dao.clone();
            async move { hooks.use_transfer_list(&dao, &liveness).await }
        })
    }

    #[cfg(test)]
    pub(crate) fn last_good_len(&self) -> usize {
        self.last_proposal.len() + self.last_proposal_list.len() + self.last_transfers.len()
    }

    // Taken after the fetch so entries written while it was in flight are merged
    fn pending_for(&self, dao: &str) -> DaoPending {
        DaoPending {
            votes: self.store.entries_for::<PendingVote>(dao),
            executions: self.store.entries_for::<PendingExecution>(dao),
            proposals: self.store.entries_for::<PendingProposal>(dao),
            deposits: self.store.entries_for::<PendingDeposit>(dao),
        }
    }

    fn apply_evictions(&self, dao: &str, evictions: &Evictions, liveness: &Liveness) {
        if evictions.is_empty() {
            return;
        }
        if !liveness.is_alive() {
            debug!(dao = %dao, skipped = evictions.total(), "View torn down, skipping evictions");
            return;
        }
        self.store.evict::<PendingVote>(dao, &evictions.votes);
        self.store.evict::<PendingExecution>(dao, &evictions.executions);
        self.store.evict::<PendingProposal>(dao, &evictions.proposals);
        self.store.evict::<PendingDeposit>(dao, &evictions.deposits);
    }
}

// An empty answer falls back to the same pending-only view, so it is not kept
fn remember_list<T: Clone>(cache: &LastGood<String, Vec<T>>, dao: &str, fetched: &[T]) {
    if fetched.is_empty() {
        cache.forget(&dao.to_string());
    } else {
        cache.remember(dao.to_string(), fetched.to_vec());
    }
}

fn failed<T>(dao: &str, query: &str, data: T, error: IndexerError, stale: bool) -> MergedResult<T> {
    warn!(
        dao = %dao,
        query = query,
        stale = stale,
        error = %error,
        "Indexer fetch failed, serving pending overlay"
    );
    MergedResult::failed(data, error.to_string(), stale)
}
