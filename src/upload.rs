use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    error::PipelineError,
    identity::{IdentityMap, ID_FIELD},
    process::{DailySchedule, MonthlySchedule},
    store::{Collections, Document, DocumentStore, WriteBatch},
};

/// `{stop: [{id}, ...]}` for one day. Vendors without an id are left out, and so is
/// a stop left with none.
pub fn schedule_document(day: &DailySchedule, ids: &IdentityMap) -> Document {
    day.iter()
        .filter_map(|(stop, vendors)| {
            let refs: Vec<Value> = vendors
                .iter()
                .filter_map(|v| match ids.id_for(v) {
                    Some(id) => Some(json!({ ID_FIELD: id })),
                    None => {
                        warn!(vendor = %v, stop = %stop, "vendor has no id; leaving it out");
                        None
                    }
                })
                .collect();
            if refs.is_empty() {
                return None;
            }
            Some((stop.clone(), Value::Array(refs)))
        })
        .collect()
}

/// Replace every date document of the month in one atomic batch.
pub async fn upload_schedule(
    store: &dyn DocumentStore,
    cols: &Collections,
    schedule: &MonthlySchedule,
    ids: &IdentityMap,
) -> Result<usize, PipelineError> {
    let mut batch = WriteBatch::new();
    for (date, day) in &schedule.days {
        batch.set(&cols.schedules, date, schedule_document(day, ids));
    }
    let written = batch.len();
    store
        .commit(batch)
        .await
        .map_err(PipelineError::UploadBatchFailure)?;
    info!(dates = written, "schedule uploaded");
    Ok(written)
}
