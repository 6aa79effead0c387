//! Per-file processing status markers.

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    error::PipelineError,
    store::{doc, Collections, DocumentStore},
};

pub const OK_FIELD: &str = "ok";

/// Outcome marker for one processed file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingStatus {
    pub file_key: String,
    pub ok: bool,
}

impl ProcessingStatus {
    pub fn new(file_name: &str, ok: bool) -> Self {
        Self {
            file_key: file_key(file_name),
            ok,
        }
    }
}

/// File name with its last extension removed: `"Jul 2019 - x.csv"` → `"Jul 2019 - x"`.
///
/// The extension is whatever follows the last `.` of the final path element.
pub fn file_key(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// Upsert the status marker, overwriting any earlier one.
pub async fn record_status(
    store: &dyn DocumentStore,
    cols: &Collections,
    status: &ProcessingStatus,
) -> Result<(), PipelineError> {
    store
        .set(
            &cols.file_status,
            &status.file_key,
            doc([(OK_FIELD, Value::Bool(status.ok))]),
        )
        .await
        .map_err(|source| PipelineError::StatusWriteFailure {
            file_key: status.file_key.clone(),
            source,
        })
}

/// Obligation to record a file's status, discharged by [`StatusGuard::finish`].
///
/// `finish` consumes the guard, so it runs at most once; dropping an unfinished guard
/// (panic or cancelled future) is logged since no async write can happen in `Drop`.
#[must_use = "call finish() on every exit path"]
pub struct StatusGuard<'a> {
    store: &'a dyn DocumentStore,
    cols: &'a Collections,
    file_name: String,
    finished: bool,
}

impl<'a> StatusGuard<'a> {
    pub fn new(store: &'a dyn DocumentStore, cols: &'a Collections, file_name: &str) -> Self {
        Self {
            store,
            cols,
            file_name: file_name.to_string(),
            finished: false,
        }
    }

    /// Record `result` and hand it back untouched. Status write failures are only logged.
    pub async fn finish<T>(
        mut self,
        result: Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        self.finished = true;
        let status = ProcessingStatus::new(&self.file_name, result.is_ok());
        match record_status(self.store, self.cols, &status).await {
            Ok(()) => debug!(file_key = %status.file_key, ok = status.ok, "status recorded"),
            Err(e) => warn!(error = %e, "status write failed; outcome unchanged"),
        }
        result
    }
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            error!(file = %self.file_name, "status guard dropped without recording an outcome");
        }
    }
}
