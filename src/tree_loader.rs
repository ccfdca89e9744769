use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::{ConnectError, Credentials, IntegrationBackend, TreeNode, TreeStrategy};

/// Observable state of the item tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeSnapshot {
    pub nodes: Vec<TreeNode>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Set once any fetch has completed successfully.
    pub loaded: bool,
}

/// Fetches an integration's flat item list and rebuilds it into a tree.
///
/// Every call is tagged with a generation; a call that finishes after a newer
/// one has started leaves the published snapshot alone.
pub struct ItemTreeLoader<B: IntegrationBackend> {
    backend: Arc<B>,
    strategy: TreeStrategy,
    state: watch::Sender<TreeSnapshot>,
    generation: AtomicU64,
    last_credentials: Mutex<Option<Credentials>>,
}

impl<B: IntegrationBackend> ItemTreeLoader<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let strategy = backend.integration().tree_strategy();
        Self::with_strategy(backend, strategy)
    }

    pub fn with_strategy(backend: Arc<B>, strategy: TreeStrategy) -> Self {
        let (state, _) = watch::channel(TreeSnapshot::default());
        Self {
            backend,
            strategy,
            state,
            generation: AtomicU64::new(0),
            last_credentials: Mutex::new(None),
        }
    }

    pub fn strategy(&self) -> &TreeStrategy {
        &self.strategy
    }

    pub fn subscribe(&self) -> watch::Receiver<TreeSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        self.state.borrow().clone()
    }

    pub async fn fetch_and_build_tree(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<TreeNode>, ConnectError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut last) = self.last_credentials.lock() {
            *last = Some(credentials.clone());
        }
        self.state.send_modify(|snapshot| {
            snapshot.is_loading = true;
            snapshot.error = None;
        });

        let mut pending = PendingFetch {
            loader: self,
            generation,
            settled: false,
        };
        let result = self
            .backend
            .fetch_items(credentials)
            .await
            .map(|items| self.strategy.build(&items));
        pending.settled = true;

        match &result {
            Ok(nodes) => {
                let applied = self.apply(generation, |snapshot| {
                    snapshot.nodes = nodes.clone();
                    snapshot.is_loading = false;
                    snapshot.loaded = true;
                });
                if applied {
                    tracing::info!(
                        integration = self.backend.integration().id(),
                        roots = nodes.len(),
                        "item tree rebuilt"
                    );
                }
            }
            Err(err) => {
                let message = self.error_message(err);
                tracing::warn!(
                    integration = self.backend.integration().id(),
                    error = %err,
                    "item fetch failed"
                );
                self.apply(generation, |snapshot| {
                    snapshot.is_loading = false;
                    snapshot.error = Some(message);
                });
            }
        }

        result
    }

    /// Re-fetches with the credentials from the most recent call.
    pub async fn refresh(&self) -> Result<Option<Vec<TreeNode>>, ConnectError> {
        let credentials = self
            .last_credentials
            .lock()
            .ok()
            .and_then(|last| last.clone());
        match credentials {
            Some(credentials) => self.fetch_and_build_tree(&credentials).await.map(Some),
            None => Ok(None),
        }
    }

    fn error_message(&self, err: &ConnectError) -> String {
        err.detail().map(str::to_string).unwrap_or_else(|| {
            self.backend
                .integration()
                .default_error_message(err.kind())
        })
    }

    fn apply<F>(&self, generation: u64, update: F) -> bool
    where
        F: FnOnce(&mut TreeSnapshot),
    {
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "dropping stale item fetch");
            return false;
        }
        self.state.send_modify(update);
        true
    }
}

/// Clears `is_loading` when a fetch is dropped before it settles.
struct PendingFetch<'a, B: IntegrationBackend> {
    loader: &'a ItemTreeLoader<B>,
    generation: u64,
    settled: bool,
}

impl<B: IntegrationBackend> Drop for PendingFetch<'_, B> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(generation = self.generation, "item fetch cancelled");
            self.loader.apply(self.generation, |snapshot| {
                snapshot.is_loading = false;
            });
        }
    }
}
