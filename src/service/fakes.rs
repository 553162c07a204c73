//! In-process collaborators for tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::indexer::{IndexerClient, IndexerError};
use super::submitter::{ProposalSubmission, SubmitError, TransactionSubmitter, TxResult, TxStatus};
use crate::models::{
    IndexedProposal, ProposalAction, ProposalMetadata, TokenAmount, TokenInfo, Transfer,
    VoteChoice,
};

/// Indexer serving whatever the test put in it
#[derive(Default)]
pub struct FakeIndexer {
    proposals: Mutex<Vec<IndexedProposal>>,
    transfers: Mutex<Vec<Transfer>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeIndexer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_proposals(&self, proposals: Vec<IndexedProposal>) {
        *self.proposals.lock().unwrap() = proposals;
    }

    pub fn set_transfers(&self, transfers: Vec<Transfer>) {
        *self.transfers.lock().unwrap() = transfers;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every later fetch wait until the returned handle is notified
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn enter(&self) -> Result<(), IndexerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IndexerError::Unavailable("indexer offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexerClient for FakeIndexer {
    async fn fetch_proposal(
        &self,
        dao_address: &str,
        proposal_id: &str,
    ) -> Result<Option<IndexedProposal>, IndexerError> {
        self.enter().await?;
        Ok(self
            .proposals
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.dao_address.eq_ignore_ascii_case(dao_address) && p.id == proposal_id)
            .cloned())
    }

    async fn fetch_proposal_list(
        &self,
        dao_address: &str,
    ) -> Result<Vec<IndexedProposal>, IndexerError> {
        self.enter().await?;
        Ok(self
            .proposals
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.dao_address.eq_ignore_ascii_case(dao_address))
            .cloned()
            .collect())
    }

    async fn fetch_transfer_list(&self, dao_address: &str) -> Result<Vec<Transfer>, IndexerError> {
        self.enter().await?;
        Ok(self
            .transfers
            .lock()
            .unwrap()
            .iter()
            .filter(|t| {
                t.recipient.eq_ignore_ascii_case(dao_address)
                    || t.sender.eq_ignore_ascii_case(dao_address)
            })
            .cloned()
            .collect())
    }
}

/// Submitter answering every transaction with a fixed status
pub struct FakeSubmitter {
    status: Mutex<TxStatus>,
    sent: Mutex<Vec<String>>,
    voters: Mutex<Vec<String>>,
}

impl FakeSubmitter {
    pub fn new(status: TxStatus) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            sent: Mutex::new(Vec::new()),
            voters: Mutex::new(Vec::new()),
        })
    }

    pub fn set_status(&self, status: TxStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Methods called so far, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Accounts votes were signed for, in order
    pub fn voters(&self) -> Vec<String> {
        self.voters.lock().unwrap().clone()
    }

    fn respond(&self, method: &str) -> TxResult {
        let mut sent = self.sent.lock().unwrap();
        sent.push(method.to_string());
        let status = *self.status.lock().unwrap();
        TxResult {
            hash: format!("0xtx{}", sent.len()),
            status,
            error: (status == TxStatus::Failed).then(|| "reverted".to_string()),
        }
    }
}

#[async_trait]
impl TransactionSubmitter for FakeSubmitter {
    async fn submit_vote(
        &self,
        _dao_address: &str,
        _proposal_id: &str,
        voter: &str,
        _choice: VoteChoice,
    ) -> Result<TxResult, SubmitError> {
        self.voters.lock().unwrap().push(voter.to_string());
        Ok(self.respond("dao_vote"))
    }

    async fn submit_execution(
        &self,
        _dao_address: &str,
        _proposal_id: &str,
    ) -> Result<TxResult, SubmitError> {
        Ok(self.respond("dao_execute"))
    }

    async fn submit_proposal(
        &self,
        dao_address: &str,
        _metadata: &ProposalMetadata,
        _actions: &[ProposalAction],
    ) -> Result<ProposalSubmission, SubmitError> {
        let tx = self.respond("dao_createProposal");
        Ok(ProposalSubmission {
            proposal_id: format!("{}_{}", dao_address, tx.hash),
            tx,
        })
    }

    async fn submit_deposit(
        &self,
        _dao_address: &str,
        _token: &TokenInfo,
        _amount: TokenAmount,
    ) -> Result<TxResult, SubmitError> {
        Ok(self.respond("dao_deposit"))
    }
}
