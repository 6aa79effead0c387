//! Vendor roster import: display names, alternate business names and social handles.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{normalize_key, DISPLAY_NAME_FIELD, ID_FIELD};
use crate::{
    error::PipelineError,
    process::csv_reader::{read_records, CsvMode},
    store::{doc, Collections, DocumentStore, WriteBatch},
};

pub const TWITTER_FIELD: &str = "twitter";

/// One vendor as described by the roster file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub display_name: String,
    /// Normalized keys this vendor is known by, display name first.
    pub aliases: Vec<String>,
    pub twitter: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RosterSummary {
    pub entries: usize,
    pub created: usize,
    pub updated: usize,
}

/// Parse a roster CSV (`display_name,business_name,twitter`), grouping rows by display name.
pub fn read_roster(data: &[u8]) -> Vec<RosterEntry> {
    let records = read_records(data, CsvMode::Lenient).unwrap_or_default();

    let mut grouped: BTreeMap<String, RosterEntry> = BTreeMap::new();
    for rec in records {
        let field = |k: &str| rec.get(k).cloned().unwrap_or_default();
        let display_name = field("display_name");
        if display_name.is_empty() {
            continue;
        }
        let entry = grouped
            .entry(display_name.clone())
            .or_insert_with(|| RosterEntry {
                aliases: vec![normalize_key(&display_name)],
                display_name,
                twitter: field("twitter"),
            });
        entry.aliases.push(normalize_key(&field("business_name")));
    }

    grouped
        .into_values()
        .map(|mut e| {
            let mut seen = std::collections::HashSet::new();
            e.aliases.retain(|a| !a.is_empty() && seen.insert(a.clone()));
            e
        })
        .collect()
}

/// First existing id among `aliases`.
async fn lookup_id(
    store: &dyn DocumentStore,
    cols: &Collections,
    aliases: &[String],
) -> Result<Option<String>, PipelineError> {
    for alias in aliases {
        let found = store
            .get(&cols.vendor_names, alias)
            .await
            .map_err(PipelineError::IdentityStoreFailure)?;
        if let Some(Value::String(id)) = found.as_ref().and_then(|d| d.get(ID_FIELD)) {
            return Ok(Some(id.clone()));
        }
    }
    Ok(None)
}

/// Upsert every roster entry: one atomic batch per vendor.
pub async fn import_roster(
    store: &dyn DocumentStore,
    cols: &Collections,
    entries: &[RosterEntry],
) -> Result<RosterSummary, PipelineError> {
    let mut summary = RosterSummary {
        entries: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        if entry.aliases.is_empty() {
            warn!(vendor = %entry.display_name, "roster entry has no usable name; skipping");
            continue;
        }
        let mut batch = WriteBatch::new();
        let id = match lookup_id(store, cols, &entry.aliases).await? {
            Some(id) => {
                // Display names are fixed at creation; only fill in a known handle.
                if !entry.twitter.is_empty() {
                    batch.merge(
                        &cols.vendors,
                        &id,
                        doc([(TWITTER_FIELD, Value::from(entry.twitter.as_str()))]),
                    );
                }
                summary.updated += 1;
                id
            }
            None => {
                let id = store.allocate_id();
                batch.set(
                    &cols.vendors,
                    &id,
                    doc([
                        (DISPLAY_NAME_FIELD, Value::from(entry.display_name.as_str())),
                        (TWITTER_FIELD, Value::from(entry.twitter.as_str())),
                    ]),
                );
                summary.created += 1;
                id
            }
        };
        for alias in &entry.aliases {
            batch.set(
                &cols.vendor_names,
                alias,
                doc([(ID_FIELD, Value::from(id.as_str()))]),
            );
        }
        store
            .commit(batch)
            .await
            .map_err(PipelineError::IdentityStoreFailure)?;
        info!(vendor = %entry.display_name, id = %id, aliases = entry.aliases.len(), "roster entry stored");
    }

    Ok(summary)
}
