use crate::db;
use crate::entities;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            info!(workspace = %path.display(), "workspace selected");
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_entities_list(req: &Request) -> serde_json::Value {
    let list: Vec<serde_json::Value> = entities::all()
        .iter()
        .map(|e| {
            let fields: Vec<serde_json::Value> = e
                .fields()
                .iter()
                .map(|f| {
                    json!({
                        "key": f.key,
                        "label": f.label,
                        "kind": f.kind.name(),
                        "required": f.required,
                    })
                })
                .collect();
            let references: Vec<serde_json::Value> = e
                .references()
                .iter()
                .map(|r| json!({ "target": r.target, "fields": r.fields, "idColumn": r.id_column }))
                .collect();
            json!({
                "name": e.name(),
                "title": e.title(),
                "fields": fields,
                "naturalKey": e.natural_key(),
                "references": references,
                "defaultBatchSize": e.default_batch_size(),
            })
        })
        .collect();
    ok(&req.id, json!({ "entities": list }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "entities.list" => Some(handle_entities_list(req)),
        _ => None,
    }
}
