use rusqlite::Connection;
use serde_json::Value;

use crate::config::{ImportSettings, Persistence};
use crate::entities::{self, Entity};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::{EntityStore, HttpStore, SqliteStore, StoreError};

pub fn require_db<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn entity_param(req: &Request) -> Result<&'static dyn Entity, Value> {
    let Some(name) = str_param(req, "entity") else {
        return Err(err(&req.id, "bad_params", "missing params.entity", None));
    };
    entities::lookup(name).ok_or_else(|| {
        err(
            &req.id,
            "unknown_entity",
            format!("unknown entity: {}", name),
            None,
        )
    })
}

/// Where records of the current workspace live.
pub enum Backend<'c> {
    Local(SqliteStore<'c>),
    Remote(HttpStore),
}

impl<'c> Backend<'c> {
    pub fn open(conn: &'c Connection, settings: &ImportSettings) -> Result<Self, String> {
        match settings.persistence {
            Persistence::Local => Ok(Backend::Local(SqliteStore::new(conn))),
            Persistence::Remote => {
                if settings.remote_base_url.is_empty() {
                    return Err("remoteBaseUrl is not configured".to_string());
                }
                HttpStore::new(&settings.remote_base_url, settings.timeout())
                    .map(Backend::Remote)
                    .map_err(|e| e.to_string())
            }
        }
    }

    pub fn store(&self) -> &dyn EntityStore {
        match self {
            Backend::Local(s) => s,
            Backend::Remote(s) => s,
        }
    }
}

/// Opens the configured backend or produces the error response.
pub fn backend<'c>(conn: &'c Connection, req: &Request) -> Result<Backend<'c>, Value> {
    let settings = ImportSettings::load(conn)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    Backend::open(conn, &settings).map_err(|msg| err(&req.id, "bad_params", msg, None))
}

pub fn store_error(req: &Request, fallback: &str, e: &StoreError) -> Value {
    let code = match e {
        StoreError::NotFound(_) => "not_found",
        StoreError::UnknownColumn(_) => "bad_params",
        _ => fallback,
    };
    err(&req.id, code, e.to_string(), None)
}
