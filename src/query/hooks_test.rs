#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;

    use crate::cache::{MemoryStorage, PendingStore};
    use crate::models::*;
    use crate::query::{Liveness, QueryHooks};
    use crate::reconcile::overlay::test_support::*;
    use crate::service::fakes::FakeIndexer;

    fn create_test_hooks() -> (Arc<QueryHooks>, Arc<FakeIndexer>, Arc<PendingStore>) {
        let indexer = FakeIndexer::new();
        let store = Arc::new(PendingStore::new("goerli", Arc::new(MemoryStorage::new())));
        let hooks = Arc::new(QueryHooks::new(indexer.clone(), store.clone()));
        (hooks, indexer, store)
    }

    fn voters_of(proposal: &IndexedProposal) -> Vec<(String, VoteChoice, TokenAmount)> {
        proposal
            .voters
            .iter()
            .map(|v| (v.address.clone(), v.choice, v.weight))
            .collect()
    }

    async fn eventually<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_vote_before_indexing_is_merged() {
        let (hooks, indexer, store) = create_test_hooks();
        indexer.set_proposals(vec![proposal("P1", ProposalStatus::Active)]);
        store.insert(pending_vote("P1", "0xA", VoteChoice::Yes, 100));

        let result = hooks.use_proposal(DAO, "P1", &Liveness::new()).await;

        assert!(!result.is_error());
        let merged = result.data.unwrap();
        assert_eq!(
            voters_of(&merged),
            vec![("0xA".to_string(), VoteChoice::Yes, TokenAmount::from(100u64))]
        );
        assert_eq!(merged.tally.yes, TokenAmount::from(100u64));
        assert_eq!(store.entries_for::<PendingVote>(DAO).len(), 1);
    }

    #[tokio::test]
    async fn test_vote_after_indexing_is_evicted() {
        let (hooks, indexer, store) = create_test_hooks();
        let mut indexed = proposal("P1", ProposalStatus::Active);
        indexed.voters = vec![voter("0xA", VoteChoice::Yes, 100)];
        indexed.tally.add(VoteChoice::Yes, TokenAmount::from(100u64));
        indexer.set_proposals(vec![indexed.clone()]);
        store.insert(pending_vote("P1", "0xA", VoteChoice::Yes, 100));

        let result = hooks.use_proposal(DAO, "P1", &Liveness::new()).await;

        assert_eq!(result.data, Some(indexed));
        assert!(store.entries_for::<PendingVote>(DAO).is_empty());
    }

    #[tokio::test]
    async fn test_execution_shown_then_evicted() {
        let (hooks, indexer, store) = create_test_hooks();
        indexer.set_proposals(vec![proposal("P1", ProposalStatus::Succeeded)]);
        store.insert(pending_execution("P1", "0xexec"));

        let result = hooks.use_proposal(DAO, "P1", &Liveness::new()).await;
        let merged = result.data.unwrap();
        assert_eq!(merged.status, ProposalStatus::Executed);
        assert_eq!(merged.execution.unwrap().tx_hash, "0xexec");
        assert_eq!(store.entries_for::<PendingExecution>(DAO).len(), 1);

        indexer.set_proposals(vec![proposal("P1", ProposalStatus::Executed)]);
        hooks.use_proposal(DAO, "P1", &Liveness::new()).await;
        assert!(store.entries_for::<PendingExecution>(DAO).is_empty());
    }

    #[tokio::test]
    async fn test_deposit_is_deduplicated_once_indexed() {
        let (hooks, indexer, store) = create_test_hooks();
        store.insert(pending_deposit("T1", 50, 1_700_000_300));

        let before = hooks.use_transfer_list(DAO, &Liveness::new()).await;
        assert_eq!(before.data.len(), 1);

        indexer.set_transfers(vec![transfer("T1", TransferDirection::Deposit, 1_700_000_310)]);
        let after = hooks.use_transfer_list(DAO, &Liveness::new()).await;

        assert_eq!(after.data.iter().filter(|t| t.tx_id == "T1").count(), 1);
        assert!(store.entries_for::<PendingDeposit>(DAO).is_empty());
    }

    #[tokio::test]
    async fn test_unindexed_proposal_served_from_snapshot() {
        let (hooks, _, store) = create_test_hooks();
        let pending = pending_proposal("P9");
        store.insert(pending.clone());

        let result = hooks.use_proposal(DAO, "P9", &Liveness::new()).await;

        assert_eq!(result.data, Some(pending.snapshot));
        assert_eq!(store.entries_for::<PendingProposal>(DAO).len(), 1);

        let list = hooks.use_proposal_list(DAO, &Liveness::new()).await;
        assert_eq!(list.data.len(), 1);
        assert_eq!(store.entries_for::<PendingProposal>(DAO).len(), 1);
    }

    #[tokio::test]
    async fn test_indexed_proposal_evicts_snapshot() {
        let (hooks, indexer, store) = create_test_hooks();
        store.insert(pending_proposal("P9"));
        indexer.set_proposals(vec![proposal("P9", ProposalStatus::Active)]);

        let list = hooks.use_proposal_list(DAO, &Liveness::new()).await;

        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].status, ProposalStatus::Active);
        assert!(store.entries_for::<PendingProposal>(DAO).is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_indexer_without_history_serves_pending_only() {
        let (hooks, indexer, store) = create_test_hooks();
        indexer.set_unavailable(true);
        store.insert(pending_proposal("P9"));
        store.insert(pending_deposit("T1", 50, 1_700_000_300));

        let list = hooks.use_proposal_list(DAO, &Liveness::new()).await;
        assert!(list.is_error());
        assert!(!list.stale);
        assert_eq!(list.data.len(), 1);

        let transfers = hooks.use_transfer_list(DAO, &Liveness::new()).await;
        assert!(transfers.is_error());
        assert_eq!(transfers.data.len(), 1);

        assert_eq!(store.entries_for::<PendingProposal>(DAO).len(), 1);
        assert_eq!(store.entries_for::<PendingDeposit>(DAO).len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_indexer_serves_stale_result_and_keeps_pending() {
        let (hooks, indexer, store) = create_test_hooks();
        indexer.set_proposals(vec![proposal("P1", ProposalStatus::Active)]);
        hooks.use_proposal(DAO, "P1", &Liveness::new()).await;

        // Vote lands while the indexer is down
        indexer.set_unavailable(true);
        store.insert(pending_vote("P1", "0xA", VoteChoice::No, 7));

        let result = hooks.use_proposal(DAO, "P1", &Liveness::new()).await;

        assert!(result.is_error());
        assert!(result.stale);
        let merged = result.data.unwrap();
        assert_eq!(merged.status, ProposalStatus::Active);
        assert_eq!(merged.voters.len(), 1);
        assert_eq!(store.entries_for::<PendingVote>(DAO).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_queries_leave_no_fallback_behind() {
        let (hooks, indexer, _) = create_test_hooks();
        indexer.set_proposals(vec![proposal("P1", ProposalStatus::Active)]);

        for i in 0..10_000 {
            let dao = format!("0xjunk{}", i);
            let liveness = Liveness::new();
            hooks.use_proposal(&dao, &format!("X{}", i), &liveness).await;
            hooks.use_proposal_list(&dao, &liveness).await;
            hooks.use_transfer_list(&dao, &liveness).await;
        }

        assert_eq!(hooks.last_good_len(), 0);
    }

    #[tokio::test]
    async fn test_fallback_answers_are_bounded() {
        let indexer = FakeIndexer::new();
        let store = Arc::new(PendingStore::new("goerli", Arc::new(MemoryStorage::new())));
        let hooks = QueryHooks::with_last_good(
            indexer.clone(),
            store,
            8,
            Duration::from_secs(60),
        );
        let proposals: Vec<IndexedProposal> = (0..50)
            .map(|i| proposal(&format!("P{}", i), ProposalStatus::Active))
            .collect();
        indexer.set_proposals(proposals);

        for i in 0..50 {
            hooks
                .use_proposal(DAO, &format!("P{}", i), &Liveness::new())
                .await;
        }
        assert_eq!(hooks.last_good_len(), 8);

        // The newest answer is still there to fall back on
        indexer.set_unavailable(true);
        let result = hooks.use_proposal(DAO, "P49", &Liveness::new()).await;
        assert!(result.stale);
        assert_eq!(result.data.unwrap().id, "P49");
    }

    #[tokio::test]
    async fn test_proposal_gone_from_indexer_is_not_served_stale() {
        let (hooks, indexer, _) = create_test_hooks();
        indexer.set_proposals(vec![proposal("P1", ProposalStatus::Active)]);
        hooks.use_proposal(DAO, "P1", &Liveness::new()).await;

        indexer.set_proposals(vec![]);
        assert!(hooks.use_proposal(DAO, "P1", &Liveness::new()).await.data.is_none());

        indexer.set_unavailable(true);
        let result = hooks.use_proposal(DAO, "P1", &Liveness::new()).await;
        assert!(!result.stale);
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn test_torn_down_view_does_not_evict() {
        let (hooks, indexer, store) = create_test_hooks();
        let mut indexed = proposal("P1", ProposalStatus::Active);
        indexed.voters = vec![voter("0xA", VoteChoice::Yes, 100)];
        indexer.set_proposals(vec![indexed]);
        store.insert(pending_vote("P1", "0xA", VoteChoice::Yes, 100));

        let gate = indexer.hold();
        let liveness = Liveness::new();
        let view = liveness.clone();
        let task = {
            let hooks = hooks.clone();
            tokio::spawn(async move { hooks.use_proposal(DAO, "P1", &view).await })
        };

        liveness.teardown();
        gate.notify_one();
        task.await.unwrap();

        assert_eq!(store.entries_for::<PendingVote>(DAO).len(), 1);
    }

    #[tokio::test]
    async fn test_entry_written_during_fetch_survives_eviction() {
        let (hooks, indexer, store) = create_test_hooks();
        let mut indexed = proposal("P1", ProposalStatus::Active);
        indexed.voters = vec![voter("0xA", VoteChoice::Yes, 100)];
        indexer.set_proposals(vec![indexed]);
        store.insert(pending_vote("P1", "0xA", VoteChoice::Yes, 100));

        let gate = indexer.hold();
        let task = {
            let hooks = hooks.clone();
            tokio::spawn(async move { hooks.use_proposal(DAO, "P1", &Liveness::new()).await })
        };

        store.insert(pending_vote("P1", "0xB", VoteChoice::No, 3));
        gate.notify_one();
        let result = task.await.unwrap();

        let votes = store.entries_for::<PendingVote>(DAO);
        assert_eq!(votes.keys().collect::<Vec<_>>(), vec!["P1_0xb"]);
        assert_eq!(result.data.unwrap().voters.len(), 2);
    }

    #[tokio::test]
    async fn test_poller_fetches_on_mount_and_on_refetch() {
        let (hooks, indexer, _) = create_test_hooks();
        indexer.set_proposals(vec![proposal("P1", ProposalStatus::Active)]);

        let poller = hooks.poll_proposal_list(DAO, Duration::from_secs(3600));
        let mut results = poller.subscribe();
        results.wait_for(|r| r.is_some()).await.unwrap();
        assert_eq!(poller.latest().unwrap().data.len(), 1);

        indexer.set_unavailable(true);
        poller.refetch();
        results
            .wait_for(|r| r.as_ref().map_or(false, |r| r.stale))
            .await
            .unwrap();
        assert!(indexer.calls() >= 2);
    }

    #[tokio::test]
    async fn test_poller_with_zero_interval_keeps_running() {
        let (hooks, indexer, _) = create_test_hooks();
        indexer.set_proposals(vec![proposal("P1", ProposalStatus::Active)]);

        let poller = hooks.poll_proposal(DAO, "P1", Duration::ZERO);
        poller
            .subscribe()
            .wait_for(|r| r.is_some())
            .await
            .unwrap();

        assert!(!poller.is_finished());
        assert_eq!(poller.latest().unwrap().data.unwrap().id, "P1");
        poller.teardown();
    }

    #[tokio::test]
    async fn test_poller_teardown_stops_task() {
        let (hooks, indexer, _) = create_test_hooks();

        let poller = hooks.poll_transfer_list(DAO, Duration::from_secs(3600));
        poller
            .subscribe()
            .wait_for(|r| r.is_some())
            .await
            .unwrap();

        poller.teardown();
        eventually(|| poller.is_finished()).await;

        let calls = indexer.calls();
        poller.refetch();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(indexer.calls(), calls);
        assert!(!poller.liveness().is_alive());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Submit(u8),
        Index(u8),
        Fetch,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::Submit),
            (0u8..4).prop_map(Op::Index),
            Just(Op::Fetch),
        ]
    }

    // Indexer reports checksummed-looking addresses, the wallet lower-case ones
    fn indexed_address(i: u8) -> String {
        format!("0xAB{}", i)
    }

    fn wallet_address(i: u8) -> String {
        indexed_address(i).to_ascii_lowercase()
    }

    proptest! {
        #[test]
        fn prop_merged_voters_never_duplicate(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let (hooks, indexer, store) = create_test_hooks();
            let mut indexed: Vec<u8> = Vec::new();
            let mut submitted: HashSet<u8> = HashSet::new();

            let publish = |indexed: &[u8]| {
                let mut p = proposal("P1", ProposalStatus::Active);
                p.voters = indexed
                    .iter()
                    .map(|i| voter(&indexed_address(*i), VoteChoice::Yes, 1))
                    .collect();
                indexer.set_proposals(vec![p]);
            };
            publish(&indexed);

            for op in ops {
                match op {
                    Op::Submit(i) => {
                        submitted.insert(i);
                        store.insert(pending_vote("P1", &wallet_address(i), VoteChoice::Yes, 1));
                    }
                    Op::Index(i) => {
                        if !indexed.contains(&i) {
                            indexed.push(i);
                            publish(&indexed);
                        }
                    }
                    Op::Fetch => {
                        let result = tokio_test::block_on(hooks.use_proposal(DAO, "P1", &Liveness::new()));
                        let merged = result.data.unwrap();
                        let addresses: Vec<String> = merged
                            .voters
                            .iter()
                            .map(|v| v.address.to_ascii_lowercase())
                            .collect();
                        let unique: HashSet<&String> = addresses.iter().collect();
                        prop_assert_eq!(unique.len(), addresses.len());
                        for i in indexed.iter().chain(submitted.iter()) {
                            prop_assert!(unique.contains(&wallet_address(*i)));
                        }
                    }
                }
            }

            // Once the indexer lists every voter, one fetch clears the cache
            for i in submitted.iter().copied() {
                if !indexed.contains(&i) {
                    indexed.push(i);
                }
            }
            publish(&indexed);
            tokio_test::block_on(hooks.use_proposal(DAO, "P1", &Liveness::new()));
            prop_assert!(store.entries_for::<PendingVote>(DAO).is_empty());
        }
    }
}
