use super::{Entity, FieldSpec, RefSpec, INSTITUTION_REF};

pub struct ExamSessions;

pub const EXAM_SESSION_REF: RefSpec = RefSpec {
    target: "exam_sessions",
    fields: &["institution_code", "session_code"],
    id_column: "exam_session_id",
    noun: "Exam session",
};

static FIELDS: [FieldSpec; 5] = [
    FieldSpec::text("institution_code", "Institution Code")
        .required()
        .sample("JKKN"),
    FieldSpec::text("session_code", "Session Code")
        .required()
        .aliases(&["Exam Session Code"])
        .sample("NOV2025"),
    FieldSpec::text("session_name", "Session Name").sample("November 2025"),
    FieldSpec::date("start_date", "Start Date")
        .aliases(&["Start Date (DD-MM-YYYY)"])
        .sample("2025-11-03"),
    FieldSpec::date("end_date", "End Date")
        .aliases(&["End Date (DD-MM-YYYY)"])
        .sample("2025-11-28"),
];

impl Entity for ExamSessions {
    fn name(&self) -> &'static str {
        "exam_sessions"
    }

    fn title(&self) -> &'static str {
        "Exam Sessions"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &["institution_code", "session_code"]
    }

    fn references(&self) -> &'static [RefSpec] {
        &[INSTITUTION_REF]
    }

    fn display_field(&self) -> Option<&'static str> {
        Some("session_name")
    }

    fn date_order(&self) -> Option<(&'static str, &'static str)> {
        Some(("start_date", "end_date"))
    }
}
