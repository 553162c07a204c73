//! Pending Store
//!
//! Holds one reactive map per pending kind. Reads are synchronous snapshots;
//! every mutation is a closure applied under the kind's channel lock, so a
//! read-merge-write can never interleave with another writer of the same kind.
//!
//! Mutations never touch storage. A background writer per kind watches the
//! same channel, re-encodes the newest map after each change and writes it
//! out; bursts of changes collapse into one write. Write failures are logged
//! and otherwise ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::codec;
use super::storage::CacheStorage;
use crate::models::{
    normalize_address, DaoEntries, PendingDeposit, PendingEntity, PendingEntry, PendingExecution,
    PendingKind, PendingMap, PendingProposal, PendingVote,
};

type Slot<E> = watch::Sender<Arc<PendingMap<E>>>;

/// Pending kinds the store can hold, mapped to their slot
pub trait Stored: PendingEntity {
    fn slot(store: &PendingStore) -> &Slot<Self>;
}

impl Stored for PendingVote {
    fn slot(store: &PendingStore) -> &Slot<Self> {
        &store.votes
    }
}

impl Stored for PendingExecution {
    fn slot(store: &PendingStore) -> &Slot<Self> {
        &store.executions
    }
}

impl Stored for PendingProposal {
    fn slot(store: &PendingStore) -> &Slot<Self> {
        &store.proposals
    }
}

impl Stored for PendingDeposit {
    fn slot(store: &PendingStore) -> &Slot<Self> {
        &store.deposits
    }
}

/// Not-yet-indexed state for one network
pub struct PendingStore {
    network: String,
    storage: Arc<dyn CacheStorage>,
    votes: Slot<PendingVote>,
    executions: Slot<PendingExecution>,
    proposals: Slot<PendingProposal>,
    deposits: Slot<PendingDeposit>,
}

impl PendingStore {
    /// Create an empty store. Nothing is mirrored into `storage` until
    /// [`PendingStore::spawn_writers`] runs.
    pub fn new(network: &str, storage: Arc<dyn CacheStorage>) -> Self {
        Self::from_maps(
            network,
            storage,
            PendingMap::new(),
            PendingMap::new(),
            PendingMap::new(),
            PendingMap::new(),
        )
    }

    /// Seed the store from whatever `storage` holds for `network` and start
    /// mirroring changes back into it.
    ///
    /// A record that cannot be read or decoded is discarded and that kind
    /// starts empty; the store is always usable afterwards.
    pub async fn load(network: &str, storage: Arc<dyn CacheStorage>) -> Self {
        let votes = load_kind::<PendingVote>(network, storage.as_ref()).await;
        let executions = load_kind::<PendingExecution>(network, storage.as_ref()).await;
        let proposals = load_kind::<PendingProposal>(network, storage.as_ref()).await;
        let deposits = load_kind::<PendingDeposit>(network, storage.as_ref()).await;

        let store = Self::from_maps(network, storage, votes, executions, proposals, deposits);
        store.spawn_writers();
        info!(
            network = network,
            backend = store.storage.backend(),
            counts = ?store.counts(),
            "Pending store initialised"
        );
        store
    }

    /// Start one background writer per kind. Each stops once the store is
    /// dropped.
    pub fn spawn_writers(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.spawn_writer::<PendingVote>(),
            self.spawn_writer::<PendingExecution>(),
            self.spawn_writer::<PendingProposal>(),
            self.spawn_writer::<PendingDeposit>(),
        ]
    }

    fn from_maps(
        network: &str,
        storage: Arc<dyn CacheStorage>,
        votes: PendingMap<PendingVote>,
        executions: PendingMap<PendingExecution>,
        proposals: PendingMap<PendingProposal>,
        deposits: PendingMap<PendingDeposit>,
    ) -> Self {
        Self {
            network: network.to_string(),
            storage,
            votes: watch::Sender::new(Arc::new(votes)),
            executions: watch::Sender::new(Arc::new(executions)),
            proposals: watch::Sender::new(Arc::new(proposals)),
            deposits: watch::Sender::new(Arc::new(deposits)),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Current map for kind `E`
    pub fn get<E: Stored>(&self) -> Arc<PendingMap<E>> {
        E::slot(self).borrow().clone()
    }

    /// Current entries of kind `E` for one DAO
    pub fn entries_for<E: Stored>(&self, dao_address: &str) -> DaoEntries<E> {
        E::slot(self)
            .borrow()
            .get(&normalize_address(dao_address))
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the whole map for kind `E`
    pub fn set<E: Stored>(&self, map: PendingMap<E>) {
        E::slot(self).send_replace(Arc::new(map));
    }

    /// Apply `mutate` to the current map for kind `E`.
    ///
    /// `mutate` returns whether it changed anything; observers (the storage
    /// writer included) are only notified when it did.
    pub fn update<E, F>(&self, mutate: F) -> bool
    where
        E: Stored,
        F: FnOnce(&mut PendingMap<E>) -> bool,
    {
        E::slot(self).send_if_modified(|current| mutate(Arc::make_mut(current)))
    }

    /// Insert or overwrite a pending entity under its identity
    pub fn insert<E: Stored>(&self, entity: E) {
        let dao = normalize_address(entity.dao_address());
        let id = entity.entity_id();
        self.update::<E, _>(|map| {
            map.entry(dao.clone())
                .or_default()
                .insert(id.clone(), entity);
            true
        });
        debug!(kind = %E::KIND, dao = %dao, id = %id, "Pending entry stored");
    }

    /// Store any tagged pending entry
    pub fn insert_entry(&self, entry: PendingEntry) {
        match entry {
            PendingEntry::Vote(vote) => self.insert(vote),
            PendingEntry::Execution(execution) => self.insert(execution),
            PendingEntry::Proposal(proposal) => self.insert(proposal),
            PendingEntry::Deposit(deposit) => self.insert(deposit),
        }
    }

    /// Remove the given ids for one DAO from whatever the map holds right now.
    ///
    /// Returns how many entries were actually removed; ids already gone are
    /// skipped, and entries written after the caller's snapshot survive.
    pub fn evict<E: Stored>(&self, dao_address: &str, ids: &BTreeSet<String>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let dao = normalize_address(dao_address);
        let mut removed = 0;
        self.update::<E, _>(|map| {
            if let Some(entries) = map.get_mut(&dao) {
                for id in ids {
                    if entries.remove(id).is_some() {
                        removed += 1;
                    }
                }
                if entries.is_empty() {
                    map.remove(&dao);
                }
            }
            removed > 0
        });
        if removed > 0 {
            info!(kind = %E::KIND, dao = %dao, removed = removed, "Evicted indexed pending entries");
        }
        removed
    }

    /// Observe changes to kind `E`
    pub fn subscribe<E: Stored>(&self) -> watch::Receiver<Arc<PendingMap<E>>> {
        E::slot(self).subscribe()
    }

    /// Number of pending entries per kind
    pub fn counts(&self) -> BTreeMap<PendingKind, usize> {
        fn count<E: Stored>(store: &PendingStore) -> usize {
            store.get::<E>().values().map(|entries| entries.len()).sum()
        }

        BTreeMap::from([
            (PendingKind::Votes, count::<PendingVote>(self)),
            (PendingKind::Executions, count::<PendingExecution>(self)),
            (PendingKind::Proposals, count::<PendingProposal>(self)),
            (PendingKind::Deposits, count::<PendingDeposit>(self)),
        ])
    }

    fn spawn_writer<E: Stored>(&self) -> JoinHandle<()> {
        let mut changes = self.subscribe::<E>();
        let storage = Arc::clone(&self.storage);
        let key = storage_key(&self.network, E::KIND);

        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let snapshot = changes.borrow_and_update().clone();
                let text = match codec::encode(snapshot.as_ref()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to encode pending cache");
                        continue;
                    }
                };

                if let Err(e) = storage.write(&key, &text).await {
                    warn!(
                        key = %key,
                        backend = storage.backend(),
                        error = %e,
                        "Failed to persist pending cache"
                    );
                }
            }
            debug!(key = %key, "Pending cache writer stopped");
        })
    }
}

/// Storage key of the record holding kind `kind` on `network`
pub fn storage_key(network: &str, kind: PendingKind) -> String {
    format!("{}:{}", network, kind.storage_name())
}

async fn load_kind<E: PendingEntity>(network: &str, storage: &dyn CacheStorage) -> PendingMap<E> {
    let key = storage_key(network, E::KIND);
    let text = match storage.read(&key).await {
        Ok(Some(text)) => text,
        Ok(None) => return PendingMap::new(),
        Err(e) => {
            warn!(key = %key, error = %e, "Pending cache unreadable, starting empty");
            return PendingMap::new();
        }
    };

    match codec::decode::<E>(&text) {
        Ok(map) => map,
        Err(e) => {
            warn!(key = %key, error = %e, "Discarding corrupt pending cache");
            PendingMap::new()
        }
    }
}
