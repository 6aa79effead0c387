use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use super::{normalize_key, DISPLAY_NAME_FIELD, ID_FIELD};
use crate::{
    error::PipelineError,
    store::{doc, Collections, DocumentStore, WriteBatch},
};

/// Normalized vendor key → vendor id, as of one resolution pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentityMap {
    ids: HashMap<String, String>,
    created: Vec<String>,
}

impl IdentityMap {
    /// Id for a raw vendor name, if it has one.
    pub fn id_for(&self, vendor: &str) -> Option<&str> {
        self.ids.get(&normalize_key(vendor)).map(String::as_str)
    }

    /// Keys that received a new identity in this pass, sorted.
    pub fn created(&self) -> &[String] {
        &self.created
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.ids
    }
}

/// Read the full key → id index from `vendorNames`.
pub async fn load_index(
    store: &dyn DocumentStore,
    cols: &Collections,
) -> Result<HashMap<String, String>, PipelineError> {
    let docs = store
        .list(&cols.vendor_names)
        .await
        .map_err(PipelineError::IdentityStoreFailure)?;

    let mut index = HashMap::with_capacity(docs.len());
    for (key, d) in docs {
        match d.get(ID_FIELD) {
            Some(Value::String(id)) => {
                index.insert(key, id.clone());
            }
            _ => warn!(key = %key, "name index entry has no id; ignoring"),
        }
    }
    Ok(index)
}

/// Give every vendor a stable id, creating identities for unseen normalized keys.
///
/// All creations go out in one batch; when nothing is new, nothing is written.
pub async fn resolve_identities(
    store: &dyn DocumentStore,
    cols: &Collections,
    vendors: &HashSet<String>,
) -> Result<IdentityMap, PipelineError> {
    // key → smallest raw name, so the chosen display name does not depend on set order.
    let mut wanted: BTreeMap<String, &str> = BTreeMap::new();
    for name in vendors {
        let key = normalize_key(name);
        if key.is_empty() {
            warn!(vendor = %name, "vendor name has no letters or digits; skipping");
            continue;
        }
        wanted
            .entry(key)
            .and_modify(|cur| {
                if name.as_str() < *cur {
                    *cur = name.as_str();
                }
            })
            .or_insert(name.as_str());
    }

    let mut ids = load_index(store, cols).await?;
    debug!(existing = ids.len(), wanted = wanted.len(), "loaded name index");

    let mut batch = WriteBatch::new();
    let mut created = Vec::new();
    for (key, display_name) in wanted {
        if ids.contains_key(&key) {
            continue;
        }
        let id = store.allocate_id();
        batch
            .set(
                &cols.vendors,
                &id,
                doc([(DISPLAY_NAME_FIELD, Value::from(display_name))]),
            )
            .set(
                &cols.vendor_names,
                &key,
                doc([(ID_FIELD, Value::from(id.as_str()))]),
            );
        ids.insert(key.clone(), id);
        created.push(key);
    }

    if !batch.is_empty() {
        store
            .commit(batch)
            .await
            .map_err(PipelineError::IdentityStoreFailure)?;
        info!(created = created.len(), "created vendor identities");
    }

    Ok(IdentityMap { ids, created })
}
