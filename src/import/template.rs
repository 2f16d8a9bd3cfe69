use tracing::warn;

use super::reference::ReferenceIndex;
use crate::entities::{lookup, Entity, FieldKind};
use crate::store::EntityStore;
use crate::xlsx::{Sheet, Workbook, XCell};

pub const TEMPLATE_SHEET: &str = "Template";
pub const REFERENCE_SHEET: &str = "Reference Data";
pub const NO_REFERENCE_DATA: &str = "No reference data available";

/// Reference lists for the template; a failed fetch yields an empty index.
pub fn fetch_references<S: EntityStore + ?Sized>(store: &S, entity: &dyn Entity) -> ReferenceIndex {
    match ReferenceIndex::build(store, entity) {
        Ok(index) => index,
        Err(e) => {
            warn!(entity = entity.name(), error = %e, "reference fetch failed; template gets a placeholder");
            ReferenceIndex::new()
        }
    }
}

pub fn build_template(entity: &dyn Entity, refs: &ReferenceIndex) -> Workbook {
    let mut template = Sheet::new(TEMPLATE_SHEET);
    template.push_row(entity.fields().iter().map(|f| f.template_header()));
    template.push_row(entity.fields().iter().map(|f| match f.kind {
        FieldKind::Number | FieldKind::Integer => f
            .sample
            .parse::<f64>()
            .map(XCell::Number)
            .unwrap_or_else(|_| XCell::from(f.sample)),
        _ if f.sample.is_empty() => XCell::Empty,
        _ => XCell::from(f.sample),
    }));

    let mut reference = Sheet::new(REFERENCE_SHEET);
    reference.push_row(["Reference", "Code", "Name"]);
    for r in entity.references() {
        let title = lookup(r.target).map(|t| t.title()).unwrap_or(r.noun);
        for entry in refs.entries(r.target) {
            reference.push_row([title, entry.code.as_str(), entry.name.as_str()]);
        }
    }
    if reference.rows.len() == 1 {
        reference.push_row(["-", NO_REFERENCE_DATA, ""]);
    }

    let mut wb = Workbook::new();
    wb.add_sheet(template);
    wb.add_sheet(reference);
    wb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{lookup, Institutions};
    use serde_json::json;

    #[test]
    fn template_has_headers_and_one_sample_row() {
        let grades = lookup("grades").unwrap();
        let wb = build_template(grades, &ReferenceIndex::new());
        let sheet = &wb.sheets[0];
        assert_eq!(sheet.name, TEMPLATE_SHEET);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][0], XCell::from("Institution Code *"));
        assert_eq!(sheet.rows[0][5], XCell::from("Qualify"));
        assert_eq!(sheet.rows[1][3], XCell::Number(10.0));
    }

    #[test]
    fn empty_references_get_a_placeholder_row() {
        let years = lookup("academic_years").unwrap();
        let wb = build_template(years, &ReferenceIndex::new());
        let sheet = &wb.sheets[1];
        assert_eq!(sheet.name, REFERENCE_SHEET);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1][1], XCell::from(NO_REFERENCE_DATA));
    }

    #[test]
    fn reference_rows_list_codes_and_names() {
        let mut refs = ReferenceIndex::new();
        let rec = json!({"id": "i-1", "institution_code": "JKKN", "institution_name": "JKKN College"});
        refs.load_records(&Institutions, &[rec.as_object().unwrap().clone()]);
        let years = lookup("academic_years").unwrap();
        let wb = build_template(years, &refs);
        assert_eq!(
            wb.sheets[1].rows[1],
            vec![
                XCell::from("Institutions"),
                XCell::from("JKKN"),
                XCell::from("JKKN College")
            ]
        );
    }
}
