//! Document store abstraction and its backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::StoreError;

pub mod file;
pub mod firestore;
pub mod memory;

pub use file::FileStore;
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

/// A document body: top-level field name → JSON value.
pub type Document = Map<String, Value>;

/// Collection names the pipeline reads and writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Collections {
    pub vendors: String,
    pub vendor_names: String,
    pub schedules: String,
    pub file_status: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            vendors: "vendors".into(),
            vendor_names: "vendorNames".into(),
            schedules: "schedules".into(),
            file_status: "fileStatus".into(),
        }
    }
}

/// A single staged write.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    /// Replace the whole document, creating it if absent.
    Set {
        collection: String,
        id: String,
        doc: Document,
    },
    /// Overwrite only the given top-level fields, creating the document if absent.
    Merge {
        collection: String,
        id: String,
        fields: Document,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Set { collection, .. } | WriteOp::Merge { collection, .. } => collection,
        }
    }
}

/// Writes that commit together or not at all.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, doc: Document) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            doc,
        });
        self
    }

    pub fn merge(&mut self, collection: &str, id: &str, fields: Document) -> &mut Self {
        self.ops.push(WriteOp::Merge {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Long-lived handle to a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in `collection`, keyed by id.
    async fn list(&self, collection: &str) -> Result<BTreeMap<String, Document>, StoreError>;

    /// One document, `None` when absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Apply every op in `batch` atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Replace a single document.
    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.set(collection, id, doc);
        self.commit(batch).await
    }

    /// A fresh opaque document id.
    fn allocate_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Build a [`Document`] from `(field, value)` pairs.
pub fn doc<I, K>(fields: I) -> Document
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
