//! Import settings, stored as the `setup.import` section of the workspace
//! settings table.

use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::db;
use crate::entities::{self, Entity};

pub const SECTION_KEY: &str = "setup.import";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persistence {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSettings {
    pub batch_size: usize,
    pub concurrency: usize,
    pub persistence: Persistence,
    pub remote_base_url: String,
    pub timeout_seconds: u64,
    pub batch_size_overrides: BTreeMap<String, usize>,
}

pub fn default_section() -> Value {
    json!({
        "batchSize": 1,
        "concurrency": 1,
        "persistence": "local",
        "remoteBaseUrl": "",
        "timeoutSeconds": 30,
        "batchSizeOverrides": {}
    })
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

pub fn merge_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match k.as_str() {
            "batchSize" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 500)?));
            }
            "concurrency" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 16)?));
            }
            "persistence" => {
                let s = parse_string_max(v, k, 16)?.to_ascii_lowercase();
                if s != "local" && s != "remote" {
                    return Err("persistence must be one of: local, remote".into());
                }
                obj.insert(k.clone(), Value::String(s));
            }
            "remoteBaseUrl" => {
                let s = parse_string_max(v, k, 500)?;
                if !s.is_empty() && !s.starts_with("http://") && !s.starts_with("https://") {
                    return Err("remoteBaseUrl must start with http:// or https://".into());
                }
                obj.insert(k.clone(), Value::String(s));
            }
            "timeoutSeconds" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 600)?));
            }
            "batchSizeOverrides" => {
                let overrides = v
                    .as_object()
                    .ok_or_else(|| "batchSizeOverrides must be an object".to_string())?;
                let mut out = Map::new();
                for (entity, size) in overrides {
                    if entities::lookup(entity).is_none() {
                        return Err(format!("unknown entity in batchSizeOverrides: {}", entity));
                    }
                    let n = parse_i64_range(size, &format!("batchSizeOverrides.{}", entity), 1, 500)?;
                    out.insert(entity.clone(), Value::from(n));
                }
                obj.insert(k.clone(), Value::Object(out));
            }
            _ => return Err(format!("unknown import field: {}", k)),
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection) -> anyhow::Result<Value> {
    let mut current = default_section();
    if let Some(saved) = db::settings_get_json(conn, SECTION_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values should not block imports.
            let _ = merge_patch(&mut current, saved_obj);
        }
    }
    Ok(current)
}

pub fn save_patch(conn: &Connection, patch: &Map<String, Value>) -> anyhow::Result<Result<Value, String>> {
    let mut current = load_section(conn)?;
    if let Err(msg) = merge_patch(&mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, SECTION_KEY, &current)?;
    Ok(Ok(current))
}

impl ImportSettings {
    /// Reads a merged section; fields missing from it fall back to defaults.
    pub fn from_section(section: &Value) -> Self {
        let int = |key: &str, default: u64| {
            section
                .get(key)
                .and_then(|v| v.as_u64())
                .unwrap_or(default)
        };
        let persistence = match section.get("persistence").and_then(|v| v.as_str()) {
            Some("remote") => Persistence::Remote,
            _ => Persistence::Local,
        };
        let batch_size_overrides = section
            .get("batchSizeOverrides")
            .and_then(|v| v.as_object())
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n as usize)))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            batch_size: int("batchSize", 1) as usize,
            concurrency: int("concurrency", 1) as usize,
            persistence,
            remote_base_url: section
                .get("remoteBaseUrl")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            timeout_seconds: int("timeoutSeconds", 30),
            batch_size_overrides,
        }
    }

    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        Ok(Self::from_section(&load_section(conn)?))
    }

    /// Per-entity override, else a global size above one, else the entity's own default.
    pub fn batch_size_for(&self, entity: &dyn Entity) -> usize {
        if let Some(n) = self.batch_size_overrides.get(entity.name()) {
            return *n;
        }
        if self.batch_size > 1 {
            return self.batch_size;
        }
        entity.default_batch_size()
    }

    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_seconds))
        }
    }
}
