//! The schedule ingestion pipeline, run once per uploaded file.

use std::{sync::Arc, time::Instant};
use tracing::{debug, error, info, info_span, Instrument};

use crate::{
    config::{Settings, SCHEDULE_EXTENSION},
    error::PipelineError,
    fetch::BlobSource,
    history::StatusGuard,
    identity::resolve_identities,
    process::{build_schedule, extract_month_year, read_records, validate_columns, TargetMonth},
    store::DocumentStore,
    upload::upload_schedule,
};

/// An object written to a bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEvent {
    pub name: String,
    pub bucket: String,
}

impl FileEvent {
    pub fn new(name: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
        }
    }
}

/// Progress through one run. Failures jump straight to `StatusRecorded`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Start,
    DateParsed,
    Fetched,
    Parsed,
    Validated,
    Built,
    IdentitiesResolved,
    Uploaded,
    StatusRecorded,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Not a schedule file; nothing was read or written besides the status marker.
    Skipped,
    Loaded {
        target: TargetMonth,
        dates: usize,
        vendors: usize,
        created_identities: usize,
    },
}

/// Whether `name` carries the schedule file extension.
pub fn is_schedule_file(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| ext == SCHEDULE_EXTENSION)
}

/// Store handles plus settings, built once and shared by every run.
pub struct Pipeline {
    blobs: Arc<dyn BlobSource>,
    store: Arc<dyn DocumentStore>,
    settings: Settings,
}

impl Pipeline {
    pub fn new(
        blobs: Arc<dyn BlobSource>,
        store: Arc<dyn DocumentStore>,
        settings: Settings,
    ) -> Self {
        Self {
            blobs,
            store,
            settings,
        }
    }

    /// Process one uploaded file and record its status, whatever happens.
    pub async fn load_file(&self, event: &FileEvent) -> Result<LoadOutcome, PipelineError> {
        let span = info_span!("load_file", file = %event.name, bucket = %event.bucket);
        async move {
            let start = Instant::now();
            let guard = StatusGuard::new(
                self.store.as_ref(),
                &self.settings.collections,
                &event.name,
            );

            let mut stage = Stage::Start;
            let result = self.run_stages(event, &mut stage).await;
            match &result {
                Ok(outcome) => info!(?outcome, elapsed = ?start.elapsed(), "file processed"),
                Err(e) => error!(last_stage = ?stage, error = %e, "file failed"),
            }

            let result = guard.finish(result).await;
            debug!(stage = ?Stage::StatusRecorded, ok = result.is_ok(), "run finished");
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        event: &FileEvent,
        stage: &mut Stage,
    ) -> Result<LoadOutcome, PipelineError> {
        let cols = &self.settings.collections;
        let store = self.store.as_ref();

        if !is_schedule_file(&event.name) {
            info!("not a schedule file; skipping");
            return Ok(LoadOutcome::Skipped);
        }

        let target = extract_month_year(&event.name)?;
        advance(stage, Stage::DateParsed);

        let data = self
            .blobs
            .fetch(&event.bucket, &event.name)
            .await
            .map_err(|source| PipelineError::FetchFailure {
                bucket: event.bucket.clone(),
                name: event.name.clone(),
                source,
            })?;
        advance(stage, Stage::Fetched);

        let records = read_records(&data, self.settings.csv_mode)?;
        advance(stage, Stage::Parsed);

        let records = validate_columns(records)?;
        advance(stage, Stage::Validated);

        let schedule = build_schedule(&records, target);
        drop(records);
        advance(stage, Stage::Built);

        let ids = resolve_identities(store, cols, &schedule.vendors).await?;
        advance(stage, Stage::IdentitiesResolved);

        let dates = upload_schedule(store, cols, &schedule, &ids).await?;
        advance(stage, Stage::Uploaded);

        Ok(LoadOutcome::Loaded {
            target,
            dates,
            vendors: schedule.vendors.len(),
            created_identities: ids.created().len(),
        })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = ?*stage, to = ?next, "stage");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_csv_is_processed() {
        assert!(is_schedule_file("Jul 2019 - results.csv"));
        assert!(!is_schedule_file("readme.txt"));
        assert!(!is_schedule_file("Jul 2019.CSV"));
        assert!(!is_schedule_file("csv"));
        assert!(!is_schedule_file("Jul 2019.csv/"));
    }
}
