use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_db;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_import_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match config::load_section(conn) {
        Ok(section) => ok(&req.id, json!({ "import": section })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_import_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    match config::save_patch(conn, patch_obj) {
        Ok(Ok(section)) => ok(&req.id, json!({ "import": section })),
        Ok(Err(msg)) => err(&req.id, "bad_params", msg, None),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.import.get" => Some(handle_import_get(state, req)),
        "setup.import.update" => Some(handle_import_update(state, req)),
        _ => None,
    }
}
