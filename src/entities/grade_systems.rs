use super::grades::GRADE_REF;
use super::{Entity, FieldSpec, RefSpec, INSTITUTION_REF, REGULATION_REF};
use crate::import::row::CanonicalRow;

pub struct GradeSystems;

static FIELDS: [FieldSpec; 8] = [
    FieldSpec::text("institution_code", "Institution Code")
        .required()
        .sample("JKKN"),
    FieldSpec::text("grade_system_code", "Grade System Code")
        .required()
        .sample("UG-R2021"),
    FieldSpec::text("regulation_code", "Regulation Code")
        .required()
        .sample("R2021"),
    FieldSpec::text("grade", "Grade").required().sample("O"),
    FieldSpec::number("min_mark", "Min Mark")
        .required()
        .range(0.0, 100.0)
        .sample("91"),
    FieldSpec::number("max_mark", "Max Mark")
        .required()
        .range(0.0, 100.0)
        .sample("100"),
    FieldSpec::text("description", "Description")
        .required()
        .sample("Outstanding"),
    FieldSpec::boolean("is_active", "Active")
        .aliases(&["Status"])
        .sample("Yes"),
];

impl Entity for GradeSystems {
    fn name(&self) -> &'static str {
        "grade_systems"
    }

    fn title(&self) -> &'static str {
        "Grade Systems"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &["institution_code", "grade_system_code", "grade"]
    }

    fn references(&self) -> &'static [RefSpec] {
        &[INSTITUTION_REF, REGULATION_REF, GRADE_REF]
    }

    fn display_field(&self) -> Option<&'static str> {
        Some("description")
    }

    fn check(&self, row: &CanonicalRow, errors: &mut Vec<String>) {
        if let (Some(min), Some(max)) = (row.number("min_mark"), row.number("max_mark")) {
            if min >= max {
                errors.push("Min Mark must be less than Max Mark".to_string());
            }
        }
    }
}
