//! In-process document store with the transactional semantics the engine
//! relies on: versioned documents, single-document optimistic transactions
//! that abort cleanly on conflict, and a change feed backing live queries.

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;

/// Emitted on every committed write.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent<T> {
    pub id: Uuid,
    pub doc: T,
}

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    doc: T,
}

/// What a transaction closure decided after seeing the current snapshot.
pub enum TxOutcome<T> {
    /// Commit this document, provided nobody wrote in between.
    Write(T),
    /// Preconditions no longer hold and that is fine; commit nothing.
    Skip,
}

pub struct Collection<T> {
    docs: DashMap<Uuid, Versioned<T>>,
    changes_tx: broadcast::Sender<ChangeEvent<T>>,
    tx_retry_limit: usize,
}

impl<T: Clone + Send + 'static> Collection<T> {
    pub fn new(event_buffer_size: usize, tx_retry_limit: usize) -> Self {
        let (changes_tx, _unused_rx) = broadcast::channel(event_buffer_size);
        Self {
            docs: DashMap::new(),
            changes_tx,
            tx_retry_limit,
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<T> {
        self.docs.get(&id).map(|entry| entry.doc.clone())
    }

    pub async fn insert(&self, id: Uuid, doc: T) {
        self.docs.insert(
            id,
            Versioned {
                version: 0,
                doc: doc.clone(),
            },
        );
        let _ = self.changes_tx.send(ChangeEvent { id, doc });
    }

    pub async fn query<F>(&self, predicate: F) -> Vec<(Uuid, T)>
    where
        F: Fn(&T) -> bool,
    {
        self.docs
            .iter()
            .filter(|entry| predicate(&entry.doc))
            .map(|entry| (*entry.key(), entry.doc.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent<T>> {
        self.changes_tx.subscribe()
    }

    /// Read-modify-write with snapshot isolation over a single document.
    ///
    /// The closure sees a consistent snapshot (or `None` when the document
    /// does not exist) and either writes, skips, or aborts with an error.
    /// A concurrent write between snapshot and commit re-runs the closure
    /// against the fresh state, so preconditions are re-validated on every
    /// attempt. After `tx_retry_limit` lost races the operation surfaces
    /// `TransientStore`.
    ///
    /// Returns the committed document, or `None` when the closure skipped.
    pub async fn run_transaction<F>(&self, id: Uuid, mut f: F) -> Result<Option<T>, AppError>
    where
        F: FnMut(Option<&T>) -> Result<TxOutcome<T>, AppError>,
    {
        for _ in 0..self.tx_retry_limit {
            let snapshot = self
                .docs
                .get(&id)
                .map(|entry| (entry.version, entry.doc.clone()));

            let next = match f(snapshot.as_ref().map(|(_, doc)| doc))? {
                TxOutcome::Write(next) => next,
                TxOutcome::Skip => return Ok(None),
            };

            let Some((read_version, _)) = snapshot else {
                return Err(AppError::Internal(
                    "transaction wrote a document that does not exist".to_string(),
                ));
            };

            let committed = {
                match self.docs.get_mut(&id) {
                    Some(mut entry) if entry.version == read_version => {
                        entry.version += 1;
                        entry.doc = next.clone();
                        true
                    }
                    _ => false,
                }
            };

            if committed {
                let _ = self.changes_tx.send(ChangeEvent {
                    id,
                    doc: next.clone(),
                });
                return Ok(Some(next));
            }
        }

        Err(AppError::TransientStore(format!(
            "transaction on {id} lost {} consecutive conflicts",
            self.tx_retry_limit
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let collection: Collection<u64> = Collection::new(16, 5);
        let id = Uuid::from_u128(1);

        assert!(collection.get(id).await.is_none());
        collection.insert(id, 7).await;
        assert_eq!(collection.get(id).await, Some(7));
    }

    #[tokio::test]
    async fn skip_commits_nothing() {
        let collection: Collection<u64> = Collection::new(16, 5);
        let id = Uuid::from_u128(1);
        collection.insert(id, 7).await;

        let written = collection
            .run_transaction(id, |_| Ok(TxOutcome::Skip))
            .await
            .unwrap();

        assert!(written.is_none());
        assert_eq!(collection.get(id).await, Some(7));
    }

    #[tokio::test]
    async fn closure_errors_abort_the_transaction() {
        let collection: Collection<u64> = Collection::new(16, 5);
        let id = Uuid::from_u128(1);
        collection.insert(id, 7).await;

        let result = collection
            .run_transaction(id, |_| {
                Err(AppError::NotFound("gone".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(collection.get(id).await, Some(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_increments_never_lose_writes() {
        let collection: Arc<Collection<u64>> = Arc::new(Collection::new(16, 1000));
        let id = Uuid::from_u128(1);
        collection.insert(id, 0).await;

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let collection = collection.clone();
                tokio::spawn(async move {
                    collection
                        .run_transaction(id, |doc| match doc {
                            Some(n) => Ok(TxOutcome::Write(n + 1)),
                            None => Err(AppError::NotFound("missing".to_string())),
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(collection.get(id).await, Some(100));
    }

    #[tokio::test]
    async fn change_feed_sees_committed_writes() {
        let collection: Collection<u64> = Collection::new(16, 5);
        let mut changes = collection.subscribe();
        let id = Uuid::from_u128(1);

        collection.insert(id, 1).await;
        collection
            .run_transaction(id, |doc| match doc {
                Some(n) => Ok(TxOutcome::Write(n + 1)),
                None => Err(AppError::NotFound("missing".to_string())),
            })
            .await
            .unwrap();

        assert_eq!(changes.recv().await.unwrap().doc, 1);
        assert_eq!(changes.recv().await.unwrap().doc, 2);
    }
}
