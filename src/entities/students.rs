use std::sync::LazyLock;

use regex::Regex;

use super::academic_years::ACADEMIC_YEAR_REF;
use super::{Entity, FieldSpec, RefSpec, INSTITUTION_REF};
use crate::import::row::{CanonicalRow, FieldValue};

pub struct Students;

static FIELDS: [FieldSpec; 12] = [
    FieldSpec::text("institution_code", "Institution Code")
        .required()
        .sample("JKKN"),
    FieldSpec::text("register_number", "Register Number")
        .required()
        .aliases(&["Register No", "Reg No"])
        .sample("7376221CS101"),
    FieldSpec::text("first_name", "First Name")
        .required()
        .sample("Anitha"),
    FieldSpec::text("last_name", "Last Name").sample("R"),
    FieldSpec::date("date_of_birth", "Date of Birth")
        .required()
        .aliases(&["Date of Birth * (DD-MM-YYYY)", "DOB"])
        .sample("2004-08-15"),
    FieldSpec::text("gender", "Gender").required().sample("Female"),
    FieldSpec::text("program_code", "Program Code")
        .required()
        .sample("BE-CSE"),
    FieldSpec::text("semester_code", "Semester Code")
        .required()
        .aliases(&["Semester"])
        .sample("SEM3"),
    FieldSpec::text("academic_year", "Academic Year")
        .required()
        .sample("2025-2026"),
    FieldSpec::text("student_email", "Email")
        .aliases(&["Student Email"])
        .sample("anitha@example.edu"),
    FieldSpec::text("student_mobile", "Mobile")
        .aliases(&["Student Mobile", "Mobile Number"])
        .sample("+91 9876543210"),
    FieldSpec::text("pin_code", "PIN Code")
        .aliases(&["Pincode"])
        .sample("638183"),
];

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static MOBILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[0-9\s\-()]{10,15}$").unwrap());
static PIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{6}$").unwrap());

impl Entity for Students {
    fn name(&self) -> &'static str {
        "students"
    }

    fn title(&self) -> &'static str {
        "Students"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &["institution_code", "register_number"]
    }

    fn references(&self) -> &'static [RefSpec] {
        &[INSTITUTION_REF, ACADEMIC_YEAR_REF]
    }

    fn display_field(&self) -> Option<&'static str> {
        Some("first_name")
    }

    fn normalize(&self, row: &mut CanonicalRow) {
        let gender = match row.text("gender").map(|g| g.to_ascii_lowercase()) {
            Some(g) if g == "male" => Some("Male"),
            Some(g) if g == "female" => Some("Female"),
            Some(g) if g == "other" => Some("Other"),
            _ => None,
        };
        if let Some(g) = gender {
            row.set("gender", FieldValue::Text(g.to_string()));
        }
    }

    fn check(&self, row: &CanonicalRow, errors: &mut Vec<String>) {
        if let Some(g) = row.text("gender") {
            if !matches!(g, "Male" | "Female" | "Other") {
                errors.push("Gender must be Male, Female or Other".to_string());
            }
        }
        if let Some(email) = row.text("student_email") {
            if !EMAIL.is_match(email) {
                errors.push("Email must be a valid email address".to_string());
            }
        }
        if let Some(mobile) = row.text("student_mobile") {
            if !MOBILE.is_match(mobile) {
                errors.push("Mobile must be a valid phone number".to_string());
            }
        }
        let pin = row.key_part("pin_code");
        if !pin.is_empty() && !PIN.is_match(&pin) {
            errors.push("PIN Code must be exactly 6 digits".to_string());
        }
    }
}
