//! Pending-transaction overlay for a DAO governance dashboard.
//!
//! Transactions the user has submitted are cached locally until the indexer
//! reports them, and overlaid on every indexer read in the meantime.

pub mod api_error;
pub mod cache;
pub mod config;
pub mod http;
pub mod middleware;
pub mod models;
pub mod query;
pub mod reconcile;
pub mod service;
pub mod telemetry;
