use super::{Entity, FieldSpec, RefSpec, INSTITUTION_REF};

pub struct AcademicYears;

pub const ACADEMIC_YEAR_REF: RefSpec = RefSpec {
    target: "academic_years",
    fields: &["institution_code", "academic_year"],
    id_column: "academic_year_id",
    noun: "Academic year",
};

static FIELDS: [FieldSpec; 6] = [
    FieldSpec::text("institution_code", "Institution Code")
        .required()
        .sample("JKKN"),
    FieldSpec::text("academic_year", "Academic Year")
        .required()
        .aliases(&["Year"])
        .sample("2025-2026"),
    FieldSpec::date("start_date", "Start Date")
        .required()
        .aliases(&["Start Date * (DD-MM-YYYY)"])
        .sample("2025-06-01"),
    FieldSpec::date("end_date", "End Date")
        .required()
        .aliases(&["End Date * (DD-MM-YYYY)"])
        .sample("2026-05-31"),
    FieldSpec::boolean("is_current", "Current")
        .aliases(&["Is Current"])
        .sample("Yes"),
    FieldSpec::text("remarks", "Remarks"),
];

impl Entity for AcademicYears {
    fn name(&self) -> &'static str {
        "academic_years"
    }

    fn title(&self) -> &'static str {
        "Academic Years"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &["institution_code", "academic_year"]
    }

    fn references(&self) -> &'static [RefSpec] {
        &[INSTITUTION_REF]
    }

    fn date_order(&self) -> Option<(&'static str, &'static str)> {
        Some(("start_date", "end_date"))
    }
}
