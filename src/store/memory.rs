use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use super::{Document, DocumentStore, WriteBatch, WriteOp};
use crate::error::StoreError;

/// Whole-database snapshot: collection → id → document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Db {
    collections: BTreeMap<String, BTreeMap<String, Document>>,
}

impl Db {
    pub fn collection(&self, name: &str) -> BTreeMap<String, Document> {
        self.collections.get(name).cloned().unwrap_or_default()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<&Document> {
        self.collections.get(collection)?.get(id)
    }

    /// Apply `ops` in order. Infallible, so callers get atomicity by applying to a copy.
    pub fn apply(&mut self, ops: Vec<WriteOp>) {
        for op in ops {
            match op {
                WriteOp::Set { collection, id, doc } => {
                    self.collections.entry(collection).or_default().insert(id, doc);
                }
                WriteOp::Merge {
                    collection,
                    id,
                    fields,
                } => {
                    let existing = self
                        .collections
                        .entry(collection)
                        .or_default()
                        .entry(id)
                        .or_default();
                    existing.extend(fields);
                }
            }
        }
    }
}

/// In-process document store with failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    db: Mutex<Db>,
    failing: Mutex<HashSet<String>>,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every commit that touches `collection` fail until [`MemoryStore::heal`].
    pub fn fail_commits_to(&self, collection: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(collection.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Db {
        self.db.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<BTreeMap<String, Document>, StoreError> {
        Ok(self.snapshot().collection(collection))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        Ok(db.get(collection, id).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        {
            let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(op) = batch.ops().iter().find(|op| failing.contains(op.collection())) {
                return Err(StoreError::Unavailable(format!(
                    "commits to {} are failing",
                    op.collection()
                )));
            }
        }
        let mut db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        db.apply(batch.into_ops());
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::doc;
    use serde_json::json;

    #[tokio::test]
    async fn set_replaces_whole_document() {
        let store = MemoryStore::new();
        store
            .set("c", "x", doc([("a", json!(1)), ("b", json!(2))]))
            .await
            .unwrap();
        store.set("c", "x", doc([("a", json!(3))])).await.unwrap();

        let got = store.get("c", "x").await.unwrap().unwrap();
        assert_eq!(got, doc([("a", json!(3))]));
    }

    #[tokio::test]
    async fn merge_keeps_other_fields() {
        let store = MemoryStore::new();
        store
            .set("c", "x", doc([("a", json!(1)), ("b", json!(2))]))
            .await
            .unwrap();
        let mut batch = WriteBatch::new();
        batch.merge("c", "x", doc([("b", json!(9))]));
        store.commit(batch).await.unwrap();

        let got = store.get("c", "x").await.unwrap().unwrap();
        assert_eq!(got, doc([("a", json!(1)), ("b", json!(9))]));
    }

    #[tokio::test]
    async fn failing_batch_applies_nothing() {
        let store = MemoryStore::new();
        store.fail_commits_to("bad");

        let mut batch = WriteBatch::new();
        batch
            .set("good", "1", doc([("v", json!(true))]))
            .set("bad", "1", doc([("v", json!(true))]));
        assert!(store.commit(batch).await.is_err());
        assert!(store.list("good").await.unwrap().is_empty());
        assert_eq!(store.commit_count(), 0);

        store.heal();
        store.set("bad", "1", doc([("v", json!(true))])).await.unwrap();
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn allocated_ids_are_unique() {
        let store = MemoryStore::new();
        assert_ne!(store.allocate_id(), store.allocate_id());
    }
}
