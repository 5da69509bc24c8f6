//! Inner subscription set.
//!
//! A two-tier view keeps one outer subscription (a query) and one inner
//! subscription per item it returns. Each outer event reconciles the inner set:
//! new keys get a subscription, departed keys lose theirs, unchanged keys keep
//! theirs. Inner events are funneled into one channel tagged with their key.

use std::collections::BTreeMap;
use std::sync::Arc;

use studyhub_db::store::{DocPath, DocumentStore, WatchEvent, WatchTarget};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub(crate) struct InnerSet<K> {
    store: Arc<dyn DocumentStore>,
    tasks: BTreeMap<K, JoinHandle<()>>,
    events: mpsc::UnboundedSender<(K, WatchEvent)>,
}

impl<K> InnerSet<K>
where
    K: Ord + Clone + Send + std::fmt::Display + 'static,
{
    pub fn new(store: Arc<dyn DocumentStore>) -> (Self, mpsc::UnboundedReceiver<(K, WatchEvent)>) {
        let (events, rx) = mpsc::unbounded_channel();
        let set = Self {
            store,
            tasks: BTreeMap::new(),
            events,
        };
        (set, rx)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tasks.contains_key(key)
    }

    /// Make the tracked keys equal `wanted`, opening and closing only the difference.
    pub async fn reconcile(&mut self, wanted: &[K], path_of: impl Fn(&K) -> DocPath) {
        let stale: Vec<K> = self
            .tasks
            .keys()
            .filter(|key| !wanted.contains(key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(task) = self.tasks.remove(&key) {
                task.abort();
            }
        }

        for key in wanted {
            if self.tasks.contains_key(key) {
                continue;
            }
            let mut watch = match self.store.subscribe(WatchTarget::Document(path_of(key))).await {
                Ok(watch) => watch,
                Err(e) => {
                    // Left untracked; the next outer event tries again.
                    tracing::warn!(key = %key, error = %e, "Inner subscription failed");
                    continue;
                }
            };
            let events = self.events.clone();
            let tagged = key.clone();
            let task = tokio::spawn(async move {
                while let Some(event) = watch.next().await {
                    if events.send((tagged.clone(), event)).is_err() {
                        break;
                    }
                }
            });
            self.tasks.insert(key.clone(), task);
        }
    }
}

impl<K> Drop for InnerSet<K> {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}
