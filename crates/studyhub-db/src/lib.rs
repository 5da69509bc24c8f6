//! # studyhub-db
//!
//! Document store layer for StudyHub:
//! - **store** — the document store contract consumed by the engine, plus the in-process store
//! - **repository** — invariant-preserving read/write primitives per record set
//! - **storage** — blob storage for avatars

pub mod paths;
pub mod repository;
pub mod storage;
pub mod store;

use std::future::Future;
use std::sync::Arc;

use studyhub_common::config::{AppConfig, StoreBackend, StoreConfig};
use studyhub_common::error::StoreError;

use store::{DocumentStore, MemoryStore, Transaction};

/// Shared store handle passed to the engine, live views, and route handlers.
#[derive(Clone)]
pub struct Database {
    pub store: Arc<dyn DocumentStore>,
    transaction_attempts: u32,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            transaction_attempts: config.transaction_attempts.max(1),
        }
    }

    /// Lite-mode database backed by a fresh [`MemoryStore`]. Returns the concrete store
    /// too, so callers (tests, fixtures) can seed it or inject faults.
    pub fn memory(config: &StoreConfig) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(config.max_batch_ops));
        (Self::new(store.clone(), config), store)
    }

    /// Connect to the configured backend.
    pub fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        match config.store.backend {
            StoreBackend::Memory => {
                tracing::info!(
                    max_batch_ops = config.store.max_batch_ops,
                    "Using in-process document store (lite mode)"
                );
                Ok(Self::memory(&config.store).0)
            }
        }
    }

    /// Run `body` inside an optimistic transaction, retrying when the store reports
    /// that a document read by the body changed before commit.
    ///
    /// Business-rule errors returned by `body` are surfaced immediately, never retried.
    pub async fn run_transaction<T, E, F, Fut>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StoreError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let tx = Transaction::new(self.store.clone());
            let value = body(tx.clone()).await?;
            let (preconditions, writes) = tx.into_commit();
            match self.store.commit(preconditions, writes).await {
                Ok(()) => return Ok(value),
                Err(StoreError::Conflict(path)) if attempt < self.transaction_attempts => {
                    tracing::debug!(attempt, %path, "Transaction conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
