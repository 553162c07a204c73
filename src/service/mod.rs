// Service layer module
pub mod governance_service;
pub mod indexer;
pub mod submitter;

#[cfg(test)]
pub(crate) mod fakes;

pub use governance_service::{
    CastVoteDto, CreateProposalDto, DepositDto, GovernanceError, GovernanceService,
};
pub use indexer::{GraphQlIndexer, IndexerClient, IndexerError};
pub use submitter::{
    JsonRpcSubmitter, ProposalSubmission, RetryConfig, SubmitError, TransactionSubmitter, TxResult,
    TxStatus,
};
