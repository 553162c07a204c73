//! Query hooks
//!
//! Fetch from the indexer, overlay pending state, evict what the indexer has
//! caught up with, and hand back the merged view.

pub mod hooks;
pub mod last_good;
pub mod poller;

#[cfg(test)]
mod hooks_test;

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use hooks::QueryHooks;
pub use poller::Poller;

/// What a hook returns to the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedResult<T> {
    pub data: T,
    /// Set when the last fetch failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `data` was built from an earlier successful fetch
    pub stale: bool,
}

impl<T> MergedResult<T> {
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            error: None,
            stale: false,
        }
    }

    pub fn failed(data: T, error: impl Into<String>, stale: bool) -> Self {
        Self {
            data,
            error: Some(error.into()),
            stale,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Whether the view that started a query is still mounted.
///
/// Checked between the awaited fetch and the eviction write; a torn-down
/// view leaves the store untouched.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn teardown(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
