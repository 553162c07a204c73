use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::{Liveness, MergedResult};

// `tokio::time::interval` rejects a zero period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background refresh of one mounted view.
///
/// Runs the query immediately, then every `interval` and on each
/// [`Poller::refetch`]. Results are published on a watch channel. Tearing
/// down (or dropping) the poller stops the task; a query already in flight
/// finishes without evicting anything.
pub struct Poller<T> {
    liveness: Liveness,
    refetch: Arc<Notify>,
    results: watch::Receiver<Option<MergedResult<T>>>,
    handle: JoinHandle<()>,
}

impl<T> Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn spawn<F, Fut>(interval: Duration, query: F) -> Self
    where
        F: Fn(Liveness) -> Fut + Send + 'static,
        Fut: Future<Output = MergedResult<T>> + Send + 'static,
    {
        let liveness = Liveness::new();
        let refetch = Arc::new(Notify::new());
        let (tx, results) = watch::channel(None);

        let task_liveness = liveness.clone();
        let task_refetch = refetch.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = task_refetch.notified() => {}
                }
                if !task_liveness.is_alive() {
                    break;
                }

                let result = query(task_liveness.clone()).await;
                if !task_liveness.is_alive() || tx.send(Some(result)).is_err() {
                    break;
                }
            }
            debug!("Poller stopped");
        });

        Self {
            liveness,
            refetch,
            results,
            handle,
        }
    }

    /// Run the query now instead of waiting for the next tick
    pub fn refetch(&self) {
        self.refetch.notify_one();
    }

    /// Most recent result, if the first fetch has completed
    pub fn latest(&self) -> Option<MergedResult<T>> {
        self.results.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<MergedResult<T>>> {
        self.results.clone()
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Unmount the view
    pub fn teardown(&self) {
        self.liveness.teardown();
        self.refetch.notify_one();
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.liveness.teardown();
        self.refetch.notify_one();
    }
}
