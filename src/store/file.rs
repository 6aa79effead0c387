use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{memory::Db, Document, DocumentStore, WriteBatch};
use crate::error::StoreError;

/// Document store persisted as a single JSON file.
///
/// Each commit writes the full database to a temp file beside the target and renames
/// it into place, so readers see either the old or the new state.
pub struct FileStore {
    path: PathBuf,
    db: Mutex<Db>,
}

impl FileStore {
    /// Open `path`, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let db = if path.exists() {
            let file =
                fs::File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            serde_json::from_reader(file).with_context(|| format!("parsing {}", path.display()))?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            Db::default()
        };
        Ok(Self {
            path,
            db: Mutex::new(db),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, db: &Db) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut w, db)?;
            w.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn list(&self, collection: &str) -> Result<BTreeMap<String, Document>, StoreError> {
        let db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        Ok(db.collection(collection))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        Ok(db.get(collection, id).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut db = self.db.lock().unwrap_or_else(|e| e.into_inner());
        let writes = batch.len();
        let mut next = db.clone();
        next.apply(batch.into_ops());
        self.persist(&next)?;
        *db = next;
        debug!(path = %self.path.display(), writes, "committed batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::doc;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("db").join("store.json");
        {
            let store = FileStore::open(&path).unwrap();
            let mut batch = WriteBatch::new();
            batch
                .set("schedules", "2019-07-01", doc([("Plaza", json!([{"id": "x"}]))]))
                .set("fileStatus", "Jul 2019", doc([("ok", json!(true))]));
            store.commit(batch).await.unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        let status = reopened.get("fileStatus", "Jul 2019").await.unwrap().unwrap();
        assert_eq!(status["ok"], json!(true));
        assert_eq!(reopened.list("schedules").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let tmp = tempdir().unwrap();
        let store = FileStore::open(tmp.path().join("store.json")).unwrap();
        assert!(store.list("vendors").await.unwrap().is_empty());
        assert!(store.get("vendors", "nope").await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store.json");
        fs::write(&path, "{not json").unwrap();
        assert!(FileStore::open(&path).is_err());
    }
}
