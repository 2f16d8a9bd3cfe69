use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{EntityStore, Record, StoreError, Write};
use crate::entities::Entity;

/// Client for the hosted REST persistence API: one resource per entity,
/// `{"error": "..."}` bodies on failure.
pub struct HttpStore {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    results: Vec<BulkItem>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    record: Option<Record>,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, StoreError> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, entity: &dyn Entity) -> String {
        format!("{}/{}", self.base_url, entity.name().replace('_', "-"))
    }

    fn send(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let response = request
            .send()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        read_body(response)
    }
}

fn read_body(response: Response) -> Result<Value, StoreError> {
    let status = response.status();
    let text = response
        .text()
        .map_err(|e| StoreError::Network(e.to_string()))?;
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(body);
    }
    match body.get("error").and_then(|e| e.as_str()) {
        Some(message) => Err(StoreError::Rejected(message.to_string())),
        None => Err(StoreError::Rejected(format!(
            "Request failed with status {}",
            status.as_u16()
        ))),
    }
}

fn record_or(body: Value, id: &str, sent: &Record) -> Record {
    match body {
        Value::Object(obj) if !obj.is_empty() => obj,
        _ => {
            let mut rec = sent.clone();
            rec.insert("id".into(), Value::String(id.to_string()));
            rec
        }
    }
}

fn query_pairs(filters: &Record) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(k, v)| {
            let s = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), s)
        })
        .collect()
}

impl EntityStore for HttpStore {
    fn list(&self, entity: &dyn Entity, filters: &Record) -> Result<Vec<Record>, StoreError> {
        let body = self.send(self.client.get(self.url(entity)).query(&query_pairs(filters)))?;
        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("data") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(o) => Some(o),
                _ => None,
            })
            .collect())
    }

    fn create(&self, entity: &dyn Entity, id: &str, record: &Record) -> Result<Record, StoreError> {
        let mut payload = record.clone();
        payload.insert("id".into(), Value::String(id.to_string()));
        let body = self.send(self.client.post(self.url(entity)).json(&payload))?;
        Ok(record_or(body, id, record))
    }

    fn update(&self, entity: &dyn Entity, id: &str, record: &Record) -> Result<Record, StoreError> {
        let mut payload = record.clone();
        payload.insert("id".into(), Value::String(id.to_string()));
        let body = self.send(self.client.put(self.url(entity)).json(&payload))?;
        Ok(record_or(body, id, record))
    }

    fn delete(&self, entity: &dyn Entity, id: &str) -> Result<(), StoreError> {
        self.send(self.client.delete(self.url(entity)).query(&[("id", id)]))?;
        Ok(())
    }

    fn write_batch(
        &self,
        entity: &dyn Entity,
        writes: &[Write],
    ) -> Result<Vec<Result<Record, StoreError>>, StoreError> {
        let items: Vec<Value> = writes
            .iter()
            .map(|w| {
                let (id, record) = match w {
                    Write::Create { id, record } | Write::Update { id, record } => (id, record),
                };
                let mut item = record.clone();
                item.insert("id".into(), Value::String(id.clone()));
                Value::Object(item)
            })
            .collect();
        let mut payload = json!({ "bulk": true });
        payload[entity.bulk_key()] = Value::Array(items);

        let body = self.send(self.client.post(self.url(entity)).json(&payload))?;
        let parsed: BulkResponse = serde_json::from_value(body)
            .map_err(|e| StoreError::Rejected(format!("Malformed bulk response: {}", e)))?;
        if parsed.results.len() != writes.len() {
            return Err(StoreError::Rejected(format!(
                "Bulk response returned {} results for {} records",
                parsed.results.len(),
                writes.len()
            )));
        }
        Ok(parsed
            .results
            .into_iter()
            .zip(writes)
            .map(|(item, write)| match item.error {
                Some(message) => Err(StoreError::Rejected(message)),
                None => {
                    let id = item.id.unwrap_or_else(|| write.id().to_string());
                    let mut rec = item.record.unwrap_or_default();
                    rec.insert("id".into(), Value::String(id));
                    Ok(rec)
                }
            })
            .collect())
    }
}
