use super::{Entity, FieldSpec, RefSpec, INSTITUTION_REF, REGULATION_REF};

pub struct Grades;

pub const GRADE_REF: RefSpec = RefSpec {
    target: "grades",
    fields: &["institution_code", "regulation_code", "grade"],
    id_column: "grade_id",
    noun: "Grade",
};

static FIELDS: [FieldSpec; 10] = [
    FieldSpec::text("institution_code", "Institution Code")
        .required()
        .sample("JKKN"),
    FieldSpec::text("regulation_code", "Regulation Code")
        .required()
        .sample("R2021"),
    FieldSpec::text("grade", "Grade").required().sample("O"),
    FieldSpec::number("grade_point", "Grade Point")
        .required()
        .range(0.0, 10.0)
        .sample("10"),
    FieldSpec::text("description", "Description")
        .required()
        .sample("Outstanding"),
    FieldSpec::boolean("qualify", "Qualify").sample("Yes"),
    FieldSpec::boolean("exclude_cgpa", "Exclude CGPA").sample("No"),
    FieldSpec::integer("order_index", "Order Index")
        .at_least(0.0)
        .aliases(&["Order"])
        .sample("1"),
    FieldSpec::boolean("is_absent", "Is Absent").sample("No"),
    FieldSpec::text("result_status", "Result Status").sample("PASS"),
];

impl Entity for Grades {
    fn name(&self) -> &'static str {
        "grades"
    }

    fn title(&self) -> &'static str {
        "Grades"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &["institution_code", "regulation_code", "grade"]
    }

    fn references(&self) -> &'static [RefSpec] {
        &[INSTITUTION_REF, REGULATION_REF]
    }

    fn display_field(&self) -> Option<&'static str> {
        Some("description")
    }
}
