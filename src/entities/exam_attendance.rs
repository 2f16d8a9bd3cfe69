use super::exam_registrations::EXAM_REGISTRATION_REF;
use super::exam_sessions::EXAM_SESSION_REF;
use super::{Entity, FieldSpec, OnExisting, RefSpec, INSTITUTION_REF};
use crate::import::row::{CanonicalRow, FieldValue};

pub struct ExamAttendance;

static FIELDS: [FieldSpec; 8] = [
    FieldSpec::text("institution_code", "Institution Code")
        .required()
        .sample("JKKN"),
    FieldSpec::text("session_code", "Session Code")
        .required()
        .aliases(&["Exam Session Code"])
        .sample("NOV2025"),
    FieldSpec::text("register_number", "Register Number")
        .required()
        .aliases(&["Register No", "Reg No"])
        .sample("7376221CS101"),
    FieldSpec::text("course_code", "Course Code")
        .required()
        .sample("CS3401"),
    FieldSpec::text("attendance_status", "Attendance Status")
        .default_value("Present")
        .aliases(&["Status", "Attendance"])
        .sample("Present"),
    FieldSpec::time("entry_time", "Entry Time").sample("09:45"),
    FieldSpec::boolean("identity_verified", "Identity Verified").sample("Yes"),
    FieldSpec::text("remarks", "Remarks"),
];

const ABSENT: [&str; 7] = ["absent", "ab", "a", "no", "n", "0", "false"];

pub fn attendance_status(raw: &str) -> &'static str {
    let lowered = raw.trim().to_ascii_lowercase();
    if ABSENT.contains(&lowered.as_str()) {
        "Absent"
    } else {
        "Present"
    }
}

impl Entity for ExamAttendance {
    fn name(&self) -> &'static str {
        "exam_attendance"
    }

    fn title(&self) -> &'static str {
        "Exam Attendance"
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
        &[INSTITUTION_REF, EXAM_SESSION_REF, EXAM_REGISTRATION_REF]
    }

    fn on_existing(&self) -> OnExisting {
        OnExisting::Skip("Attendance already exists for this registration")
    }

    fn default_batch_size(&self) -> usize {
        50
    }

    fn bulk_key(&self) -> &'static str {
        "attendance"
    }

    fn normalize(&self, row: &mut CanonicalRow) {
        let status = attendance_status(&row.key_part("attendance_status"));
        row.set("attendance_status", FieldValue::Text(status.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_synonyms_map_to_absent() {
        for raw in ["Absent", "AB", "a", "No", "n", "0", "FALSE"] {
            assert_eq!(attendance_status(raw), "Absent", "{raw}");
        }
        for raw in ["present", "P", "yes", "1", "late"] {
            assert_eq!(attendance_status(raw), "Present", "{raw}");
        }
    }
}
