//! Firestore REST (v1) backend.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Document, DocumentStore, WriteBatch, WriteOp};
use crate::error::StoreError;

const PAGE_SIZE: usize = 300;
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Connection settings for [`FirestoreStore`].
#[derive(Clone, Debug)]
pub struct FirestoreConfig {
    pub project: String,
    pub database: String,
    /// `host:port` of a local emulator; disables auth.
    pub emulator_host: Option<String>,
    /// Fixed bearer token; when absent the metadata server is asked.
    pub access_token: Option<String>,
}

impl FirestoreConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            database: "(default)".into(),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST").ok(),
            access_token: std::env::var("FIRESTORE_ACCESS_TOKEN").ok(),
        }
    }
}

enum TokenSource {
    Emulator,
    Static(String),
    Metadata(Mutex<Option<(String, Instant)>>),
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RestDocument>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Firestore client over the public REST API.
pub struct FirestoreStore {
    http: Client,
    /// `projects/{p}/databases/{d}/documents`
    root: String,
    /// Base URL ending in `/v1/`.
    endpoint: Url,
    tokens: TokenSource,
}

impl FirestoreStore {
    pub fn new(http: Client, cfg: FirestoreConfig) -> Result<Self, StoreError> {
        let (endpoint, tokens) = match (&cfg.emulator_host, cfg.access_token) {
            (Some(host), _) => (format!("http://{}/v1/", host), TokenSource::Emulator),
            (None, Some(token)) => (
                "https://firestore.googleapis.com/v1/".to_string(),
                TokenSource::Static(token),
            ),
            (None, None) => (
                "https://firestore.googleapis.com/v1/".to_string(),
                TokenSource::Metadata(Mutex::new(None)),
            ),
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| StoreError::Unavailable(format!("bad Firestore endpoint: {e}")))?;
        info!(project = %cfg.project, endpoint = %endpoint, "firestore client ready");
        Ok(Self {
            http,
            root: format!("projects/{}/databases/{}/documents", cfg.project, cfg.database),
            endpoint,
            tokens,
        })
    }

    fn doc_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.root, collection, id)
    }

    /// URL for `root` plus path segments, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::Unavailable("endpoint cannot be a base".into()))?;
            path.pop_if_empty();
            path.extend(self.root.split('/'));
            path.extend(segments);
        }
        Ok(url)
    }

    async fn authorize(&self, req: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        match &self.tokens {
            TokenSource::Emulator => Ok(req.bearer_auth("owner")),
            TokenSource::Static(token) => Ok(req.bearer_auth(token)),
            TokenSource::Metadata(cache) => {
                let mut cached = cache.lock().await;
                if let Some((token, expires)) = cached.as_ref() {
                    if Instant::now() < *expires {
                        return Ok(req.bearer_auth(token));
                    }
                }
                let resp = self
                    .http
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;
                let fresh: MetadataToken = check(resp).await?.json().await?;
                // Refresh a minute early.
                let ttl = Duration::from_secs(fresh.expires_in.saturating_sub(60));
                let req = req.bearer_auth(&fresh.access_token);
                *cached = Some((fresh.access_token, Instant::now() + ttl));
                Ok(req)
            }
        }
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list(&self, collection: &str) -> Result<BTreeMap<String, Document>, StoreError> {
        let url = self.url(&[collection])?;
        let mut out = BTreeMap::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .http
                .get(url.clone())
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(tok) = &page_token {
                req = req.query(&[("pageToken", tok)]);
            }
            let resp = self.authorize(req).await?.send().await?;
            let page: ListResponse = check(resp).await?.json().await?;
            for d in page.documents {
                let id = d.name.rsplit('/').next().unwrap_or_default().to_string();
                out.insert(id, decode_fields(&d.name, d.fields)?);
            }
            match page.next_page_token {
                Some(tok) if !tok.is_empty() => page_token = Some(tok),
                _ => break,
            }
        }
        debug!(collection, documents = out.len(), "listed collection");
        Ok(out)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let url = self.url(&[collection, id])?;
        let resp = self.authorize(self.http.get(url)).await?.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let d: RestDocument = check(resp).await?.json().await?;
        decode_fields(&d.name, d.fields).map(Some)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        // Size limits are enforced server-side and come back as `StoreError::Status`.
        let body = self.commit_body(&batch);
        let mut url = self.url(&[])?;
        url.set_path(&format!("{}:commit", url.path()));
        let resp = self
            .authorize(self.http.post(url))
            .await?
            .json(&body)
            .send()
            .await?;
        check(resp).await?;
        debug!(writes = batch.len(), "committed batch");
        Ok(())
    }
}

impl FirestoreStore {
    /// Request body for `documents:commit`; every op goes into one atomic commit.
    fn commit_body(&self, batch: &WriteBatch) -> Value {
        let writes: Vec<Value> = batch
            .ops()
            .iter()
            .map(|op| self.encode_write(op))
            .collect();
        json!({ "writes": writes })
    }

    fn encode_write(&self, op: &WriteOp) -> Value {
        match op {
            WriteOp::Set {
                collection,
                id,
                doc,
            } => json!({
                "update": {
                    "name": self.doc_name(collection, id),
                    "fields": encode_fields(doc),
                }
            }),
            WriteOp::Merge {
                collection,
                id,
                fields,
            } => json!({
                "update": {
                    "name": self.doc_name(collection, id),
                    "fields": encode_fields(fields),
                },
                "updateMask": {
                    "fieldPaths": fields.keys().map(|k| field_path(k)).collect::<Vec<_>>(),
                }
            }),
        }
    }
}

/// Quote a top-level field name for use in an update mask.
fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn encode_fields(doc: &Document) -> Value {
    Value::Object(
        doc.iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

/// JSON → Firestore typed value.
fn encode_value(v: &Value) -> Value {
    match v {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn decode_fields(path: &str, fields: Map<String, Value>) -> Result<Document, StoreError> {
    fields
        .into_iter()
        .map(|(k, v)| decode_value(path, v).map(|v| (k, v)))
        .collect()
}

/// Firestore typed value → JSON.
fn decode_value(path: &str, v: Value) -> Result<Value, StoreError> {
    let bad = |reason: String| StoreError::Decode {
        path: path.to_string(),
        reason,
    };
    let mut obj = match v {
        Value::Object(obj) => obj,
        other => return Err(bad(format!("expected typed value, got {other}"))),
    };
    let Some((kind, inner)) = obj.iter_mut().next().map(|(k, v)| (k.clone(), v.take())) else {
        return Err(bad("empty typed value".into()));
    };
    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => inner,
        "integerValue" => {
            let s = inner.as_str().unwrap_or_default();
            let i: i64 = s
                .parse()
                .map_err(|_| bad(format!("bad integerValue {s:?}")))?;
            Value::Number(i.into())
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner,
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            Value::Array(
                values
                    .into_iter()
                    .map(|item| decode_value(path, item))
                    .collect::<Result<_, _>>()?,
            )
        }
        "mapValue" => {
            let fields = match inner.get("fields") {
                Some(Value::Object(f)) => f.clone(),
                _ => Map::new(),
            };
            Value::Object(decode_fields(path, fields)?)
        }
        other => return Err(bad(format!("unsupported value type {other}"))),
    };
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FirestoreStore {
        let cfg = FirestoreConfig {
            project: "demo".into(),
            database: "(default)".into(),
            emulator_host: Some("localhost:8080".into()),
            access_token: None,
        };
        FirestoreStore::new(Client::new(), cfg).unwrap()
    }

    #[test]
    fn values_survive_encoding() {
        let original = json!({
            "ok": true,
            "n": 42,
            "x": 1.5,
            "none": null,
            "Plaza": [{"id": "abc"}, {"id": "abc"}],
        });
        let Value::Object(doc) = original.clone() else {
            unreachable!()
        };
        let Value::Object(encoded) = encode_fields(&doc) else {
            panic!("fields must encode to an object")
        };
        assert_eq!(encoded["n"], json!({"integerValue": "42"}));
        assert_eq!(encoded["ok"], json!({"booleanValue": true}));

        let decoded = decode_fields("p", encoded).unwrap();
        assert_eq!(Value::Object(decoded), original);
    }

    #[test]
    fn unknown_value_kind_is_rejected() {
        let mut fields = Map::new();
        fields.insert("g".into(), json!({"geoPointValue": {"latitude": 1.0}}));
        assert!(matches!(
            decode_fields("p", fields),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn urls_encode_document_ids() {
        let s = store();
        let url = s.url(&["fileStatus", "Apr 2017 - MRV"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/fileStatus/Apr%202017%20-%20MRV"
        );
    }

    #[test]
    fn merge_writes_carry_a_mask() {
        let s = store();
        let mut fields = Map::new();
        fields.insert("twitter".into(), json!("@tacos"));
        fields.insert("display name".into(), json!("Tacos"));
        let w = s.encode_write(&WriteOp::Merge {
            collection: "vendors".into(),
            id: "v1".into(),
            fields,
        });
        assert_eq!(
            w["update"]["name"],
            json!("projects/demo/databases/(default)/documents/vendors/v1")
        );
        assert_eq!(
            w["updateMask"]["fieldPaths"],
            json!(["`display name`", "twitter"])
        );
    }

    #[test]
    fn large_batches_stay_in_one_commit() {
        let s = store();
        let mut batch = WriteBatch::new();
        for i in 0..600 {
            batch.set("vendorNames", &format!("v{i}"), Document::new());
        }
        let body = s.commit_body(&batch);
        let writes = body["writes"].as_array().unwrap();
        assert_eq!(writes.len(), 600);
        assert_eq!(
            writes[599]["update"]["name"],
            json!("projects/demo/databases/(default)/documents/vendorNames/v599")
        );
    }
}
