//! Error types for the schedule ingestion pipeline and its stores.

use thiserror::Error;

/// Failures raised by blob sources and document stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GCS error: {0}")]
    Gcs(#[from] google_cloud_storage::http::Error),

    #[error("GCS auth error: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot decode document {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One variant per way a pipeline run can fail.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no month/year found in file name {0:?}")]
    UnrecognizedDateFormat(String),

    #[error("failed to fetch gs://{bucket}/{name}: {source}")]
    FetchFailure {
        bucket: String,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("malformed tabular data: {0}")]
    MalformedTabularData(String),

    #[error("schema mismatch, missing columns: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("identity store failure: {0}")]
    IdentityStoreFailure(#[source] StoreError),

    #[error("schedule upload failed: {0}")]
    UploadBatchFailure(#[source] StoreError),

    #[error("could not record status for {file_key}: {source}")]
    StatusWriteFailure {
        file_key: String,
        #[source]
        source: StoreError,
    },
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::MalformedTabularData(err.to_string())
    }
}
