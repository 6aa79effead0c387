//! Blob sources the pipeline reads uploaded schedule files from.

use async_trait::async_trait;
use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::objects::{download::Range, get::GetObjectRequest},
};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::error::StoreError;

/// Read-only access to named objects grouped in buckets.
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn fetch(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError>;
}

/// Google Cloud Storage, authenticated with application default credentials.
pub struct GcsSource {
    client: Client,
}

impl GcsSource {
    pub async fn connect() -> Result<Self, StoreError> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| StoreError::Auth(e.to_string()))?;
        info!("GCS client authenticated");
        Ok(Self {
            client: Client::new(config),
        })
    }
}

#[async_trait]
impl BlobSource for GcsSource {
    async fn fetch(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let request = GetObjectRequest {
            bucket: bucket.to_string(),
            object: name.to_string(),
            ..Default::default()
        };
        let data = self
            .client
            .download_object(&request, &Range::default())
            .await?;
        debug!(bucket, name, bytes = data.len(), "downloaded object");
        Ok(data)
    }
}

/// Objects laid out on disk as `<root>/<bucket>/<name>`.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(bucket).join(name);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::NotFound(format!("{bucket}/{name}")));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobSource for DirSource {
    async fn fetch(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => {
                debug!(path = %path.display(), bytes = data.len(), "read object");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("{bucket}/{name}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn dir_source_reads_bucket_files() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("uploads")).unwrap();
        std::fs::write(tmp.path().join("uploads").join("Jul 2019.csv"), "a,b\n").unwrap();

        let src = DirSource::new(tmp.path());
        let data = src.fetch("uploads", "Jul 2019.csv").await.unwrap();
        assert_eq!(data, b"a,b\n");
    }

    #[tokio::test]
    async fn dir_source_missing_and_escaping_names() {
        let tmp = tempdir().unwrap();
        let src = DirSource::new(tmp.path());
        assert!(matches!(
            src.fetch("uploads", "nope.csv").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            src.fetch("uploads", "../secret.csv").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
