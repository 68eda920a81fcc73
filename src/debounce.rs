//! # Debounce module
//!
//! Module dedicated to time-windowed coalescing of per-key
//! operations: N rapid triggers for the same key produce exactly one
//! task run after the quiet period. A new trigger resets the window.

use std::{collections::HashMap, future::Future, hash::Hash, sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle, time};
use tracing::trace;

/// A per-key coalescing timer map.
pub struct Debouncer<K> {
    window: Duration,
    pending: Arc<Mutex<HashMap<K, JoinHandle<()>>>>,
}

impl<K> Debouncer<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(HashMap::default())),
        }
    }

    /// Schedule the given task to run after the quiet period,
    /// cancelling any task already pending for the same key.
    pub async fn trigger<F>(&self, key: K, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock().await;

        if let Some(handle) = pending.remove(&key) {
            trace!("resetting debounce window");
            handle.abort();
        }

        let window = self.window;
        let pending_ref = self.pending.clone();
        let key_ref = key.clone();

        let handle = tokio::spawn(async move {
            time::sleep(window).await;
            pending_ref.lock().await.remove(&key_ref);
            task.await;
        });

        pending.insert(key, handle);
    }

    /// Cancel the pending task for the given key, if any.
    pub async fn cancel(&self, key: &K) {
        if let Some(handle) = self.pending.lock().await.remove(key) {
            handle.abort();
        }
    }

    /// Return `true` if a task is pending for the given key.
    pub async fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().await.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn coalesces_rapid_triggers_test() {
        let debouncer = Debouncer::new(Duration::from_secs(2));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let runs = runs.clone();
            debouncer
                .trigger("folder", async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                })
                .await;
            time::advance(Duration::from_millis(500)).await;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 0);

        time::advance(Duration::from_secs(3)).await;
        // let the spawned task run
        tokio::task::yield_now().await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending(&"folder").await);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_do_not_coalesce_test() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let runs = Arc::new(AtomicUsize::new(0));

        for key in ["a", "b"] {
            let runs = runs.clone();
            debouncer
                .trigger(key, async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        // let both spawned tasks register their timers before advancing
        tokio::task::yield_now().await;
        time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_test() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let runs = Arc::new(AtomicUsize::new(0));

        let runs_ref = runs.clone();
        debouncer
            .trigger("folder", async move {
                runs_ref.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        debouncer.cancel(&"folder").await;

        time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
