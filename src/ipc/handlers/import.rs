use std::path::PathBuf;

use rusqlite::Connection;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::ImportSettings;
use crate::db;
use crate::entities::Entity;
use crate::import::parse::{self, FileFormat};
use crate::import::report::{error_workbook, RowOutcome};
use crate::import::row::RawRow;
use crate::import::template::{build_template, fetch_references};
use crate::import::{run_import, run_import_shared, ImportError, ImportObserver, ImportOptions};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{backend, entity_param, require_db, str_param, Backend};
use crate::ipc::types::{AppState, Request};

/// Identifies an upload of `bytes` into `entity` across daemon restarts.
fn fingerprint(entity: &dyn Entity, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity.name().as_bytes());
    hasher.update([0u8]);
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Persists progress so an interrupted upload can resume.
struct CheckpointWriter<'a> {
    conn: &'a Connection,
    fingerprint: &'a str,
    entity: &'static str,
}

impl ImportObserver for CheckpointWriter<'_> {
    fn on_outcome(&mut self, outcome: &RowOutcome, _data: &RawRow) {
        debug!(row = outcome.row(), status = outcome.status_label(), "row finished");
    }

    fn on_checkpoint(&mut self, last_row: usize) {
        if let Err(e) = db::checkpoint_set(self.conn, self.fingerprint, self.entity, last_row) {
            warn!(error = %e, last_row, "failed to save import checkpoint");
        }
    }
}

fn optional_usize(
    req: &Request,
    key: &str,
    min: u64,
    max: u64,
) -> Result<Option<usize>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(n) if (min..=max).contains(&n) => Ok(Some(n as usize)),
            _ => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be in {}..={}", key, min, max),
                None,
            )),
        },
    }
}

fn handle_template(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let backend = match backend(conn, req) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let refs = fetch_references(backend.store(), entity);
    let workbook = build_template(entity, &refs);
    if let Err(e) = workbook.write_to(&out_path) {
        return err(&req.id, "io_failed", format!("{e:#}"), None);
    }
    ok(&req.id, json!({ "path": out_path.to_string_lossy() }))
}

fn handle_run(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let entity = match entity_param(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let Some(in_path) = str_param(req, "inPath").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing params.inPath", None);
    };
    let batch_size = match optional_usize(req, "batchSize", 1, 500) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let concurrency = match optional_usize(req, "concurrency", 1, 16) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let resume = req
        .params
        .get("resume")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let error_report = str_param(req, "errorReportPath").map(PathBuf::from);

    let settings = match ImportSettings::load(conn) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let format = match FileFormat::from_path(&in_path) {
        Ok(f) => f,
        Err(e) => return err(&req.id, "parse_failed", e.to_string(), None),
    };
    let bytes = match std::fs::read(&in_path) {
        Ok(b) => b,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("failed to read {}: {}", in_path.to_string_lossy(), e),
                None,
            )
        }
    };
    let parsed = match parse::parse_bytes(&bytes, format) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "parse_failed", e.to_string(), None),
    };

    let fingerprint = fingerprint(entity, &bytes);
    let resume_after = if resume {
        match db::checkpoint_get(conn, &fingerprint) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    } else {
        None
    };
    let options = ImportOptions {
        batch_size: batch_size.unwrap_or_else(|| settings.batch_size_for(entity)),
        concurrency: concurrency.unwrap_or(settings.concurrency),
        resume_after,
        ..ImportOptions::default()
    };

    let backend = match backend(conn, req) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let mut observer = CheckpointWriter {
        conn,
        fingerprint: &fingerprint,
        entity: entity.name(),
    };
    let result = match &backend {
        Backend::Local(store) => {
            if options.concurrency > 1 {
                debug!("local store writes on one connection; concurrency ignored");
            }
            run_import(store, entity, &parsed, &options, &mut observer)
        }
        Backend::Remote(store) => run_import_shared(store, entity, &parsed, &options, &mut observer),
    };
    let summary = match result {
        Ok(s) => s,
        Err(ImportError::Parse(e)) => return err(&req.id, "parse_failed", e.to_string(), None),
        Err(e @ ImportError::Reference(_)) => {
            return err(&req.id, "db_query_failed", e.to_string(), None)
        }
    };
    if let Err(e) = db::checkpoint_clear(conn, &fingerprint) {
        warn!(error = %e, "failed to clear import checkpoint");
    }

    let mut report_path: Option<String> = None;
    if let Some(path) = error_report.as_deref() {
        if !summary.issues.is_empty() {
            if let Err(e) = error_workbook(&parsed.headers, &summary).write_to(path) {
                return err(&req.id, "io_failed", format!("{e:#}"), None);
            }
            report_path = Some(path.to_string_lossy().to_string());
        }
    }
    info!(
        entity = entity.name(),
        file = %in_path.display(),
        resumed_after = ?resume_after,
        "upload processed"
    );

    let mut result = json!(summary);
    result["fingerprint"] = json!(fingerprint);
    result["errorReportPath"] = json!(report_path);
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "import.template" => Some(handle_template(state, req)),
        "import.run" => Some(handle_run(state, req)),
        _ => None,
    }
}
