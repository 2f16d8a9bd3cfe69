use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::entities::{Entity, FieldKind};
use crate::store::Record;
use crate::xlsx::{Sheet, Workbook, XCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("xlsx") => Some(ExportFormat::Xlsx),
            Some("json") => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Json => "json",
        }
    }
}

fn export_cell(kind: FieldKind, value: Option<&Value>) -> XCell {
    match (kind, value) {
        (_, None | Some(Value::Null)) => XCell::Empty,
        (FieldKind::Bool, Some(Value::Bool(b))) => XCell::from(if *b { "Yes" } else { "No" }),
        (_, Some(Value::Number(n))) => n.as_f64().map(XCell::Number).unwrap_or(XCell::Empty),
        (_, Some(Value::String(s))) => XCell::from(s.as_str()),
        (_, Some(other)) => XCell::Text(other.to_string()),
    }
}

/// One sheet named after the entity, labelled columns, Yes/No booleans.
pub fn records_workbook(entity: &dyn Entity, records: &[Record]) -> Workbook {
    let mut sheet = Sheet::new(entity.title());
    sheet.push_row(entity.fields().iter().map(|f| f.label));
    for rec in records {
        sheet.push_row(
            entity
                .fields()
                .iter()
                .map(|f| export_cell(f.kind, rec.get(f.key))),
        );
    }
    let mut wb = Workbook::new();
    wb.add_sheet(sheet);
    wb
}

pub fn export_records(
    entity: &dyn Entity,
    records: &[Record],
    path: &Path,
) -> anyhow::Result<ExportFormat> {
    let format = ExportFormat::from_path(path)
        .with_context(|| format!("unsupported export type: {}", path.to_string_lossy()))?;
    match format {
        ExportFormat::Xlsx => records_workbook(entity, records).write_to(path)?,
        ExportFormat::Json => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let body = serde_json::to_string_pretty(records).context("failed to serialize records")?;
            std::fs::write(path, body)
                .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
        }
    }
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::lookup;
    use serde_json::json;

    #[test]
    fn booleans_render_yes_no() {
        let grades = lookup("grades").unwrap();
        let rec = json!({"grade": "O", "grade_point": 10, "qualify": true, "exclude_cgpa": false});
        let wb = records_workbook(grades, &[rec.as_object().unwrap().clone()]);
        let sheet = &wb.sheets[0];
        assert_eq!(sheet.name, "Grades");
        assert_eq!(sheet.rows[0][2], XCell::from("Grade"));
        assert_eq!(sheet.rows[1][2], XCell::from("O"));
        assert_eq!(sheet.rows[1][3], XCell::Number(10.0));
        assert_eq!(sheet.rows[1][5], XCell::from("Yes"));
        assert_eq!(sheet.rows[1][6], XCell::from("No"));
        assert_eq!(sheet.rows[1][0], XCell::Empty);
    }

    #[test]
    fn unknown_extension_is_refused() {
        assert_eq!(ExportFormat::from_path(Path::new("a.JSON")), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_path(Path::new("a.csv")), None);
    }
}
