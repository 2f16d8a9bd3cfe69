//! Reference masters other entities resolve against.

use super::{Entity, FieldSpec};

pub struct Institutions;

static INSTITUTION_FIELDS: [FieldSpec; 3] = [
    FieldSpec::text("institution_code", "Institution Code")
        .required()
        .sample("JKKN"),
    FieldSpec::text("institution_name", "Institution Name")
        .required()
        .sample("JKKN College of Engineering"),
    FieldSpec::boolean("is_active", "Active")
        .aliases(&["Status"])
        .sample("Yes"),
];

impl Entity for Institutions {
    fn name(&self) -> &'static str {
        "institutions"
    }

    fn title(&self) -> &'static str {
        "Institutions"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &INSTITUTION_FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &["institution_code"]
    }

    fn display_field(&self) -> Option<&'static str> {
        Some("institution_name")
    }
}

pub struct Regulations;

static REGULATION_FIELDS: [FieldSpec; 3] = [
    FieldSpec::text("regulation_code", "Regulation Code")
        .required()
        .sample("R2021"),
    FieldSpec::text("regulation_name", "Regulation Name").sample("Regulation 2021"),
    FieldSpec::boolean("is_active", "Active")
        .aliases(&["Status"])
        .sample("Yes"),
];

impl Entity for Regulations {
    fn name(&self) -> &'static str {
        "regulations"
    }

    fn title(&self) -> &'static str {
        "Regulations"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &REGULATION_FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &["regulation_code"]
    }

    fn display_field(&self) -> Option<&'static str> {
        Some("regulation_name")
    }
}

pub struct Courses;

static COURSE_FIELDS: [FieldSpec; 3] = [
    FieldSpec::text("course_code", "Course Code")
        .required()
        .sample("CS3401"),
    FieldSpec::text("course_name", "Course Name")
        .required()
        .sample("Algorithms"),
    FieldSpec::number("credit", "Credit").range(0.0, 30.0).sample("4"),
];

impl Entity for Courses {
    fn name(&self) -> &'static str {
        "courses"
    }

    fn title(&self) -> &'static str {
        "Courses"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &COURSE_FIELDS
    }

    fn natural_key(&self) -> &'static [&'static str] {
        &["course_code"]
    }

    fn display_field(&self) -> Option<&'static str> {
        Some("course_name")
    }
}
