use calamine::{open_workbook_auto, Data, Reader};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_examimportd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn examimportd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn requests_before_workspace_and_unknown_methods_fail_cleanly() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["workspacePath"].is_null());

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "records.list",
        json!({ "entity": "grades" }),
    );
    assert_eq!(error_code(&resp), "no_workspace");

    let resp = request(&mut stdin, &mut reader, "3", "grades.frobnicate", json!({}));
    assert_eq!(error_code(&resp), "not_implemented");

    let entities = request_ok(&mut stdin, &mut reader, "4", "entities.list", json!({}));
    let list = entities["entities"].as_array().expect("entities");
    assert_eq!(list.len(), 11);
    let attendance = list
        .iter()
        .find(|e| e["name"] == "exam_attendance")
        .expect("attendance entity");
    assert_eq!(attendance["defaultBatchSize"], json!(50));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn upload_with_error_report_then_crud_and_export() {
    let workspace = temp_dir("examimportd-ipc");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "records.list",
        json!({ "entity": "semesters" }),
    );
    assert_eq!(error_code(&resp), "unknown_entity");

    let settings = request_ok(&mut stdin, &mut reader, "3", "setup.import.get", json!({}));
    assert_eq!(settings["import"]["batchSize"], json!(1));
    assert_eq!(settings["import"]["persistence"], json!("local"));
    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.import.update",
        json!({ "patch": { "batchSize": 0 } }),
    );
    assert_eq!(error_code(&resp), "bad_params");
    let settings = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.import.update",
        json!({ "patch": { "batchSize": 25 } }),
    );
    assert_eq!(settings["import"]["batchSize"], json!(25));

    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "records.create",
        json!({ "entity": "institutions", "record": { "institution_code": "JKKN" } }),
    );
    assert_eq!(error_code(&resp), "validation_failed");
    assert_eq!(
        resp["error"]["details"]["errors"],
        json!(["Institution Name is required"])
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "records.create",
        json!({
            "entity": "institutions",
            "record": { "institution_code": "JKKN", "institution_name": "JKKN College", "is_active": "Yes" }
        }),
    );
    assert_eq!(created["record"]["is_active"], json!(true));

    let upload = workspace.join("years.csv");
    std::fs::write(
        &upload,
        "Institution Code *,Academic Year *,Start Date * (DD-MM-YYYY),End Date * (DD-MM-YYYY)\n\
         JKKN,2025-2026,01-06-2025,31-05-2026\n\
         JKKN,,01-06-2026,31-05-2027\n\
         ZZZZ,2027-2028,01-06-2027,31-05-2028\n",
    )
    .expect("write upload");
    let report_path = workspace.join("years_errors.xlsx");
    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "import.run",
        json!({
            "entity": "academic_years",
            "inPath": upload.to_string_lossy(),
            "errorReportPath": report_path.to_string_lossy(),
        }),
    );
    assert_eq!(summary["total"], json!(3));
    assert_eq!(summary["success"], json!(1));
    assert_eq!(summary["failed"], json!(2));
    assert_eq!(summary["issues"][0]["row"], json!(3));
    assert_eq!(summary["issues"][1]["row"], json!(4));
    assert!(summary["fingerprint"].as_str().is_some_and(|f| f.len() == 64));
    assert_eq!(summary["errorReportPath"], json!(report_path.to_string_lossy()));

    let mut book = open_workbook_auto(&report_path).expect("open error report");
    let range = book.worksheet_range("Upload Errors").expect("errors sheet");
    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], Data::String("Row".into()));
    assert_eq!(rows[0][5], Data::String("Status".into()));
    assert_eq!(rows[2][1], Data::String("ZZZZ".into()));

    let resp = request(
        &mut stdin,
        &mut reader,
        "9",
        "import.run",
        json!({ "entity": "academic_years", "inPath": workspace.join("years.txt").to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "parse_failed");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "records.list",
        json!({ "entity": "academic_years", "filters": { "academic_year": "2025-2026" } }),
    );
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    let id = records[0]["id"].as_str().expect("id").to_string();

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "records.update",
        json!({
            "entity": "academic_years",
            "id": id,
            "record": {
                "institution_code": "JKKN",
                "academic_year": "2025-2026",
                "start_date": "01-06-2025",
                "end_date": "30-04-2026",
                "remarks": "shortened"
            }
        }),
    );
    assert_eq!(updated["record"]["end_date"], json!("2026-04-30"));

    let export_path = workspace.join("years.json");
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "records.export",
        json!({ "entity": "academic_years", "outPath": export_path.to_string_lossy() }),
    );
    assert_eq!(exported["count"], json!(1));
    assert_eq!(exported["format"], json!("json"));
    assert!(export_path.exists());

    let template_path = workspace.join("years_template.xlsx");
    request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "import.template",
        json!({ "entity": "academic_years", "outPath": template_path.to_string_lossy() }),
    );
    assert!(template_path.exists());

    request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "records.delete",
        json!({ "entity": "academic_years", "id": id }),
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "15",
        "records.delete",
        json!({ "entity": "academic_years", "id": id }),
    );
    assert_eq!(error_code(&resp), "not_found");

    drop(stdin);
    let _ = child.wait();
}
