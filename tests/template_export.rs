use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use calamine::{open_workbook_auto, Data, Reader};
use examimportd::db;
use examimportd::entities::lookup;
use examimportd::import::export::{export_records, ExportFormat};
use examimportd::import::mapper::map_row;
use examimportd::import::parse::parse_file;
use examimportd::import::row::FieldValue;
use examimportd::import::template::{
    build_template, fetch_references, NO_REFERENCE_DATA, REFERENCE_SHEET, TEMPLATE_SHEET,
};
use examimportd::store::{EntityStore, Record, SqliteStore};
use rusqlite::Connection;
use serde_json::json;

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

fn sheet_rows(path: &PathBuf, sheet: &str) -> Vec<Vec<Data>> {
    let mut book = open_workbook_auto(path).expect("open workbook");
    let range = book.worksheet_range(sheet).expect("sheet");
    range.rows().map(|r| r.to_vec()).collect()
}

#[test]
fn empty_workspace_template_has_sample_and_placeholder() {
    let conn = Connection::open_in_memory().expect("open db");
    db::migrate(&conn).expect("migrate");
    let store = SqliteStore::new(&conn);
    let entity = lookup("academic_years").expect("entity");

    let dir = temp_dir("examimportd-template");
    let path = dir.join("academic_years_template.xlsx");
    build_template(entity, &fetch_references(&store, entity))
        .write_to(&path)
        .expect("write template");

    let template = sheet_rows(&path, TEMPLATE_SHEET);
    assert_eq!(template.len(), 2);
    assert_eq!(template[0][0], Data::String("Institution Code *".into()));
    assert_eq!(template[0][4], Data::String("Current".into()));

    let reference = sheet_rows(&path, REFERENCE_SHEET);
    assert_eq!(reference.len(), 2);
    assert_eq!(reference[1][1], Data::String(NO_REFERENCE_DATA.into()));

    // The sample row is itself a mappable upload.
    let parsed = parse_file(&path).expect("parse template");
    assert_eq!(parsed.rows.len(), 1);
    let row = map_row(entity, &parsed.rows[0]);
    assert_eq!(row.get("start_date"), &FieldValue::Text("2025-06-01".into()));
    assert_eq!(row.get("is_current"), &FieldValue::Bool(true));
}

#[test]
fn template_lists_existing_reference_records() {
    let conn = Connection::open_in_memory().expect("open db");
    db::migrate(&conn).expect("migrate");
    let store = SqliteStore::new(&conn);
    let institutions = lookup("institutions").expect("entity");
    let rec = json!({ "institution_code": "JKKN", "institution_name": "JKKN College", "is_active": true });
    store
        .create(institutions, "inst-1", rec.as_object().expect("object"))
        .expect("create institution");

    let entity = lookup("students").expect("entity");
    let dir = temp_dir("examimportd-template-refs");
    let path = dir.join("students_template.xlsx");
    build_template(entity, &fetch_references(&store, entity))
        .write_to(&path)
        .expect("write template");

    let reference = sheet_rows(&path, REFERENCE_SHEET);
    assert_eq!(
        reference[1],
        vec![
            Data::String("Institutions".into()),
            Data::String("JKKN".into()),
            Data::String("JKKN College".into()),
        ]
    );
}

#[test]
fn export_writes_labelled_sheet_and_json() {
    let conn = Connection::open_in_memory().expect("open db");
    db::migrate(&conn).expect("migrate");
    let store = SqliteStore::new(&conn);
    let institutions = lookup("institutions").expect("entity");
    for (id, code, active) in [("i-1", "JKKN", true), ("i-2", "PSG", false)] {
        let rec = json!({ "institution_code": code, "institution_name": format!("{code} College"), "is_active": active });
        store
            .create(institutions, id, rec.as_object().expect("object"))
            .expect("create institution");
    }
    let records = store.list(institutions, &Record::new()).expect("list");

    let dir = temp_dir("examimportd-export");
    let xlsx = dir.join("institutions.xlsx");
    assert_eq!(
        export_records(institutions, &records, &xlsx).expect("export xlsx"),
        ExportFormat::Xlsx
    );
    let rows = sheet_rows(&xlsx, "Institutions");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][1], Data::String("Institution Name".into()));
    assert_eq!(rows[1][2], Data::String("Yes".into()));
    assert_eq!(rows[2][2], Data::String("No".into()));

    let json_path = dir.join("institutions.json");
    export_records(institutions, &records, &json_path).expect("export json");
    let body = std::fs::read_to_string(&json_path).expect("read json");
    let back: Vec<serde_json::Value> = serde_json::from_str(&body).expect("parse json");
    assert_eq!(back.len(), 2);
    assert_eq!(back[1]["institution_code"], json!("PSG"));
    assert!(body.contains("\n  "), "json export should be pretty-printed");

    assert!(export_records(institutions, &records, &dir.join("institutions.csv")).is_err());
}
