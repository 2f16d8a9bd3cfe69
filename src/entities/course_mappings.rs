use super::{Entity, FieldSpec, RefSpec, COURSE_REF, INSTITUTION_REF, REGULATION_REF};
use crate::import::row::CanonicalRow;

pub struct CourseMappings;

static FIELDS: [FieldSpec; 15] = [
    FieldSpec::text("institution_code", "Institution Code")
        .required()
        .sample("JKKN"),
    FieldSpec::text("program_code", "Program Code")
        .required()
        .sample("BE-CSE"),
    FieldSpec::text("regulation_code", "Regulation Code")
        .required()
        .sample("R2021"),
    FieldSpec::text("semester_code", "Semester Code")
        .required()
        .aliases(&["Semester"])
        .sample("SEM3"),
    FieldSpec::text("course_code", "Course Code")
        .required()
        .sample("CS3401"),
    FieldSpec::integer("course_order", "Course Order")
        .at_least(0.0)
        .sample("1"),
    FieldSpec::number("internal_max_mark", "Internal Max Mark")
        .range(0.0, 100.0)
        .sample("40"),
    FieldSpec::number("internal_pass_mark", "Internal Pass Mark")
        .range(0.0, 100.0)
        .sample("20"),
    FieldSpec::number("external_max_mark", "External Max Mark")
        .range(0.0, 100.0)
        .sample("60"),
    FieldSpec::number("external_pass_mark", "External Pass Mark")
        .range(0.0, 100.0)
        .sample("30"),
    FieldSpec::number("total_max_mark", "Total Max Mark")
        .range(0.0, 100.0)
        .sample("100"),
    FieldSpec::number("total_pass_mark", "Total Pass Mark")
        .range(0.0, 100.0)
        .sample("50"),
    FieldSpec::number("internal_converted_mark", "Internal Converted Mark")
        .range(0.0, 100.0)
        .sample("40"),
    FieldSpec::number("external_converted_mark", "External Converted Mark")
        .range(0.0, 100.0)
        .sample("60"),
    FieldSpec::boolean("is_active", "Active")
        .aliases(&["Status"])
        .sample("Yes"),
];

const PASS_LIMITS: [(&str, &str); 3] = [
    ("internal_pass_mark", "internal_max_mark"),
    ("external_pass_mark", "external_max_mark"),
    ("total_pass_mark", "total_max_mark"),
];

impl Entity for CourseMappings {
    fn name(&self) -> &'static str {
        "course_mappings"
    }

    fn title(&self) -> &'static str {
        "Course Mappings"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &[
            "institution_code",
            "program_code",
            "semester_code",
            "course_code",
        ]
    }

    fn references(&self) -> &'static [RefSpec] {
        &[INSTITUTION_REF, REGULATION_REF, COURSE_REF]
    }

    fn bulk_key(&self) -> &'static str {
        "mappings"
    }

    fn check(&self, row: &CanonicalRow, errors: &mut Vec<String>) {
        for (pass, max) in PASS_LIMITS {
            if let (Some(p), Some(m)) = (row.number(pass), row.number(max)) {
                if p > m {
                    errors.push(format!(
                        "{} cannot exceed {}",
                        self.label(pass),
                        self.label(max)
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::row::FieldValue;

    #[test]
    fn pass_mark_above_max_is_reported() {
        let mut row = CanonicalRow::new();
        row.set("internal_max_mark", FieldValue::Number(40.0));
        row.set("internal_pass_mark", FieldValue::Number(45.0));
        row.set("total_max_mark", FieldValue::Number(100.0));
        row.set("total_pass_mark", FieldValue::Number(50.0));
        let mut errors = Vec::new();
        CourseMappings.check(&row, &mut errors);
        assert_eq!(
            errors,
            vec!["Internal Pass Mark cannot exceed Internal Max Mark".to_string()]
        );
    }
}
