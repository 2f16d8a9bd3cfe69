use std::path::PathBuf;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::entities::Entity;
use crate::import::export::export_records;
use crate::import::mapper;
use crate::import::reference::ReferenceIndex;
use crate::import::upsert::record_for;
use crate::import::validate::validate_row;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{backend, entity_param, require_db, store_error, str_param};
use crate::ipc::types::{AppState, Request};
use crate::store::{EntityStore, Record};

fn filters_param(req: &Request) -> Result<Record, serde_json::Value> {
    match req.params.get("filters") {
        None | Some(serde_json::Value::Null) => Ok(Record::new()),
        Some(serde_json::Value::Object(m)) => Ok(m.clone()),
        Some(_) => Err(err(&req.id, "bad_params", "filters must be an object", None)),
    }
}

/// Maps and validates `params.record`, returning the persisted form.
fn checked_record(
    store: &dyn EntityStore,
    entity: &dyn Entity,
    req: &Request,
) -> Result<Record, serde_json::Value> {
    let Some(obj) = req.params.get("record").and_then(|v| v.as_object()) else {
        return Err(err(&req.id, "bad_params", "record must be an object", None));
    };
    let refs = ReferenceIndex::build(store, entity)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    let row = mapper::map_json(entity, obj);
    let errors = validate_row(entity, &row, &refs);
    if !errors.is_empty() {
        return Err(err(
            &req.id,
            "validation_failed",
            errors.join("; "),
            Some(json!({ "errors": errors })),
        ));
    }
    Ok(record_for(entity, &row, &refs))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let entity = match entity_param(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let filters = match filters_param(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let backend = match backend(conn, req) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match backend.store().list(entity, &filters) {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => store_error(req, "db_query_failed", &e),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let entity = match entity_param(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let backend = match backend(conn, req) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let store = backend.store();
    let record = match checked_record(store, entity, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let id = Uuid::new_v4().to_string();
    match store.create(entity, &id, &record) {
        Ok(saved) => {
            info!(entity = entity.name(), id = %id, "record created");
            ok(&req.id, json!({ "record": saved }))
        }
        Err(e) => store_error(req, "db_insert_failed", &e),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let entity = match entity_param(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let Some(id) = str_param(req, "id") else {
        return err(&req.id, "bad_params", "missing params.id", None);
    };
    let backend = match backend(conn, req) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let store = backend.store();
    let record = match checked_record(store, entity, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match store.update(entity, id, &record) {
        Ok(saved) => ok(&req.id, json!({ "record": saved })),
        Err(e) => store_error(req, "db_update_failed", &e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let entity = match entity_param(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let Some(id) = str_param(req, "id") else {
        return err(&req.id, "bad_params", "missing params.id", None);
    };
    let backend = match backend(conn, req) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match backend.store().delete(entity, id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_error(req, "db_delete_failed", &e),
    }
}

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let entity = match entity_param(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let Some(out_path) = str_param(req, "outPath").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing params.outPath", None);
    };
    let filters = match filters_param(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let backend = match backend(conn, req) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let records = match backend.store().list(entity, &filters) {
        Ok(r) => r,
        Err(e) => return store_error(req, "db_query_failed", &e),
    };
    match export_records(entity, &records, &out_path) {
        Ok(format) => ok(
            &req.id,
            json!({
                "path": out_path.to_string_lossy(),
                "count": records.len(),
                "format": format.name(),
            }),
        ),
        Err(e) => err(&req.id, "io_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.list" => Some(handle_list(state, req)),
        "records.create" => Some(handle_create(state, req)),
        "records.update" => Some(handle_update(state, req)),
        "records.delete" => Some(handle_delete(state, req)),
        "records.export" => Some(handle_export(state, req)),
        _ => None,
    }
}
