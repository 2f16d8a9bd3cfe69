//! Per-entity import configuration.
//!
//! Every screen of the examination office (academic years, grades, attendance,
//! ...) runs the same import pipeline. What differs between them is captured
//! here: the field list with header aliases and coercion kinds, the natural
//! key used for upserts, the references that must resolve, and a handful of
//! business rules.

use crate::import::row::CanonicalRow;

mod academic_years;
mod course_mappings;
mod exam_attendance;
mod exam_registrations;
mod exam_sessions;
mod grade_systems;
mod grades;
mod masters;
mod students;

pub use academic_years::AcademicYears;
pub use course_mappings::CourseMappings;
pub use exam_attendance::ExamAttendance;
pub use exam_registrations::ExamRegistrations;
pub use exam_sessions::ExamSessions;
pub use grade_systems::GradeSystems;
pub use grades::Grades;
pub use masters::{Courses, Institutions, Regulations};
pub use students::Students;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Integer,
    Bool,
    /// ISO `YYYY-MM-DD` after mapping.
    Date,
    /// `HH:MM[:SS]` after mapping.
    Time,
}

impl FieldKind {
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Date | FieldKind::Time => "TEXT",
            FieldKind::Number => "REAL",
            FieldKind::Integer | FieldKind::Bool => "INTEGER",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Bool => "bool",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<&'static str>,
    /// Closed interval; an infinite upper bound means "min or greater".
    pub range: Option<(f64, f64)>,
    /// Extra accepted headers, tried right after `"<label> *"`.
    pub aliases: &'static [&'static str],
    pub sample: &'static str,
}

impl FieldSpec {
    const fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            required: false,
            default: None,
            range: None,
            aliases: &[],
            sample: "",
        }
    }

    pub const fn text(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Text)
    }

    pub const fn number(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Number)
    }

    pub const fn integer(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Integer)
    }

    pub const fn boolean(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Bool)
    }

    pub const fn date(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Date)
    }

    pub const fn time(key: &'static str, label: &'static str) -> Self {
        Self::new(key, label, FieldKind::Time)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub const fn at_least(mut self, min: f64) -> Self {
        self.range = Some((min, f64::INFINITY));
        self
    }

    pub const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub const fn sample(mut self, sample: &'static str) -> Self {
        self.sample = sample;
        self
    }

    /// Header written into generated templates.
    pub fn template_header(&self) -> String {
        if self.required {
            format!("{} *", self.label)
        } else {
            self.label.to_string()
        }
    }
}

/// A natural-key reference from one entity to another.
///
/// `fields` are the source row's fields, listed in the same order as the
/// target entity's natural key.
#[derive(Debug, Clone, Copy)]
pub struct RefSpec {
    pub target: &'static str,
    pub fields: &'static [&'static str],
    pub id_column: &'static str,
    pub noun: &'static str,
}

pub const INSTITUTION_REF: RefSpec = RefSpec {
    target: "institutions",
    fields: &["institution_code"],
    id_column: "institution_id",
    noun: "Institution",
};

pub const REGULATION_REF: RefSpec = RefSpec {
    target: "regulations",
    fields: &["regulation_code"],
    id_column: "regulation_id",
    noun: "Regulation",
};

pub const COURSE_REF: RefSpec = RefSpec {
    target: "courses",
    fields: &["course_code"],
    id_column: "course_id",
    noun: "Course",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExisting {
    Update,
    Skip(&'static str),
}

pub trait Entity: Sync {
    /// Table / resource name, e.g. `academic_years`.
    fn name(&self) -> &'static str;

    fn title(&self) -> &'static str;

    fn fields(&self) -> &'static [FieldSpec];

    fn natural_key(&self) -> &'static [&'static str];

    fn references(&self) -> &'static [RefSpec] {
        &[]
    }

    /// Field shown next to the code in reference sheets.
    fn display_field(&self) -> Option<&'static str> {
        None
    }

    /// `(start, end)` date fields where end must be strictly after start.
    fn date_order(&self) -> Option<(&'static str, &'static str)> {
        None
    }

    fn on_existing(&self) -> OnExisting {
        OnExisting::Update
    }

    fn default_batch_size(&self) -> usize {
        1
    }

    /// Array key used by the remote bulk endpoint.
    fn bulk_key(&self) -> &'static str {
        "records"
    }

    fn normalize(&self, _row: &mut CanonicalRow) {}

    fn check(&self, _row: &CanonicalRow, _errors: &mut Vec<String>) {}

    fn field(&self, key: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.key == key)
    }

    fn label(&self, key: &str) -> &'static str {
        self.field(key).map(|f| f.label).unwrap_or("Value")
    }
}

static ALL: [&'static dyn Entity; 11] = [
    &Institutions,
    &Regulations,
    &Courses,
    &ExamSessions,
    &AcademicYears,
    &Students,
    &ExamRegistrations,
    &Grades,
    &GradeSystems,
    &CourseMappings,
    &ExamAttendance,
];

pub fn all() -> &'static [&'static dyn Entity] {
    &ALL
}

pub fn lookup(name: &str) -> Option<&'static dyn Entity> {
    ALL.iter().copied().find(|e| e.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_reference_matches_target_natural_key() {
        for entity in all() {
            for r in entity.references() {
                let target = lookup(r.target).expect("reference target registered");
                assert_eq!(
                    r.fields.len(),
                    target.natural_key().len(),
                    "{} -> {}",
                    entity.name(),
                    r.target
                );
                for f in r.fields {
                    assert!(entity.field(f).is_some(), "{} lacks {}", entity.name(), f);
                }
            }
        }
    }

    #[test]
    fn natural_keys_are_required_fields() {
        for entity in all() {
            for k in entity.natural_key() {
                let f = entity.field(k).expect("natural key field");
                assert!(f.required, "{}.{} should be required", entity.name(), k);
            }
        }
    }

    #[test]
    fn template_header_marks_required() {
        let f = FieldSpec::text("institution_code", "Institution Code").required();
        assert_eq!(f.template_header(), "Institution Code *");
        let g = FieldSpec::text("remarks", "Remarks");
        assert_eq!(g.template_header(), "Remarks");
    }
}
