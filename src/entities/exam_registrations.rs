use super::exam_sessions::EXAM_SESSION_REF;
use super::{Entity, FieldSpec, RefSpec, COURSE_REF, INSTITUTION_REF};

pub struct ExamRegistrations;

pub const EXAM_REGISTRATION_REF: RefSpec = RefSpec {
    target: "exam_registrations",
    fields: &[
        "institution_code",
        "register_number",
        "course_code",
        "session_code",
    ],
    id_column: "exam_registration_id",
    noun: "Exam registration",
};

static FIELDS: [FieldSpec; 4] = [
    FieldSpec::text("institution_code", "Institution Code")
        .required()
        .sample("JKKN"),
    FieldSpec::text("register_number", "Register Number")
        .required()
        .aliases(&["Register No", "Reg No"])
        .sample("7376221CS101"),
    FieldSpec::text("course_code", "Course Code")
        .required()
        .sample("CS3401"),
    FieldSpec::text("session_code", "Session Code")
        .required()
        .aliases(&["Exam Session Code"])
        .sample("NOV2025"),
];

impl Entity for ExamRegistrations {
    fn name(&self) -> &'static str {
        "exam_registrations"
    }

    fn title(&self) -> &'static str {
        "Exam Registrations"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &[
            "institution_code",
            "register_number",
            "course_code",
            "session_code",
        ]
    }

    fn references(&self) -> &'static [RefSpec] {
        &[INSTITUTION_REF, COURSE_REF, EXAM_SESSION_REF]
    }

    fn display_field(&self) -> Option<&'static str> {
        Some("register_number")
    }
}
