use super::mapper::{is_iso_date, is_time};
use super::reference::ReferenceIndex;
use super::row::{format_number, CanonicalRow, FieldValue};
use crate::entities::{Entity, FieldKind, FieldSpec};

/// Every problem with the row, in check order. Empty means valid.
pub fn validate_row(entity: &dyn Entity, row: &CanonicalRow, refs: &ReferenceIndex) -> Vec<String> {
    let mut errors = Vec::new();

    for f in entity.fields() {
        if f.required && is_missing(row.get(f.key)) {
            errors.push(format!("{} is required", f.label));
        }
    }

    for f in entity.fields() {
        if let Some(e) = format_error(f, row.get(f.key)) {
            errors.push(e);
        }
    }

    if let Some((start, end)) = entity.date_order() {
        if let (Some(s), Some(e)) = (iso_date(row, start), iso_date(row, end)) {
            // ISO dates order lexically.
            if e <= s {
                errors.push(format!(
                    "{} must be after {}",
                    entity.label(end),
                    entity.label(start)
                ));
            }
        }
    }

    for f in entity.fields() {
        if let (Some((min, max)), Some(n)) = (f.range, row.number(f.key)) {
            if n < min || n > max {
                errors.push(range_message(f, min, max));
            }
        }
    }

    for r in entity.references() {
        let parts: Vec<String> = r.fields.iter().map(|k| row.key_part(k)).collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            continue;
        }
        if refs.resolve(r, row).is_none() {
            let labels: Vec<&str> = r.fields.iter().map(|k| entity.label(k)).collect();
            errors.push(format!(
                "{} not found for {} \"{}\"",
                r.noun,
                labels.join(" / "),
                parts.join(" / ")
            ));
        }
    }

    entity.check(row, &mut errors);
    errors
}

fn is_missing(value: &FieldValue) -> bool {
    match value {
        FieldValue::Null => true,
        FieldValue::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn format_error(f: &FieldSpec, value: &FieldValue) -> Option<String> {
    match (f.kind, value) {
        (FieldKind::Number, FieldValue::Text(_)) => Some(format!("{} must be a number", f.label)),
        (FieldKind::Integer, FieldValue::Text(_)) => {
            Some(format!("{} must be a whole number", f.label))
        }
        (FieldKind::Integer, FieldValue::Number(n)) if n.fract() != 0.0 => {
            Some(format!("{} must be a whole number", f.label))
        }
        (FieldKind::Date, FieldValue::Text(s)) if !s.is_empty() && !is_iso_date(s) => {
            Some(format!("{} must be a valid date (YYYY-MM-DD)", f.label))
        }
        (FieldKind::Time, FieldValue::Text(s)) if !s.is_empty() && !is_time(s) => {
            Some(format!("{} must be a valid time (HH:MM[:SS])", f.label))
        }
        _ => None,
    }
}

fn iso_date<'r>(row: &'r CanonicalRow, key: &str) -> Option<&'r str> {
    row.text(key).filter(|s| is_iso_date(s))
}

fn range_message(f: &FieldSpec, min: f64, max: f64) -> String {
    if max.is_infinite() {
        format!("{} must be {} or greater", f.label, format_number(min))
    } else {
        format!(
            "{} must be between {} and {}",
            f.label,
            format_number(min),
            format_number(max)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{lookup, AcademicYears, Institutions};
    use crate::import::mapper::map_row;
    use crate::import::row::{Cell, RawRow};
    use serde_json::json;

    fn refs_with_jkkn() -> ReferenceIndex {
        let mut refs = ReferenceIndex::new();
        let rec = json!({"id": "i-1", "institution_code": "JKKN"});
        refs.load_records(&Institutions, &[rec.as_object().unwrap().clone()]);
        refs
    }

    fn year_row(start: &str, end: &str) -> CanonicalRow {
        let raw = RawRow::from_pairs([
            ("Institution Code *", Cell::Text("JKKN".into())),
            ("Academic Year *", Cell::Text("2025-2026".into())),
            ("Start Date *", Cell::Text(start.into())),
            ("End Date *", Cell::Text(end.into())),
        ]);
        map_row(&AcademicYears, &raw)
    }

    #[test]
    fn end_date_must_follow_start_date() {
        let refs = refs_with_jkkn();
        let errors = validate_row(&AcademicYears, &year_row("2025-06-01", "2025-06-01"), &refs);
        assert_eq!(errors, vec!["End Date must be after Start Date".to_string()]);
        let errors = validate_row(&AcademicYears, &year_row("01-06-2025", "31-05-2026"), &refs);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn unresolved_reference_names_the_code() {
        let refs = refs_with_jkkn();
        let raw = RawRow::from_pairs([
            ("Institution Code *", Cell::Text("ZZZZ".into())),
            ("Academic Year *", Cell::Text("2025-2026".into())),
            ("Start Date *", Cell::Text("2025-06-01".into())),
            ("End Date *", Cell::Text("2026-05-31".into())),
        ]);
        let errors = validate_row(&AcademicYears, &map_row(&AcademicYears, &raw), &refs);
        assert_eq!(
            errors,
            vec!["Institution not found for Institution Code \"ZZZZ\"".to_string()]
        );
    }

    #[test]
    fn all_checks_run_without_short_circuit() {
        let grades = lookup("grades").unwrap();
        let raw = RawRow::from_pairs([
            ("Grade Point", Cell::Number(11.0)),
            ("Order Index", Cell::Number(1.5)),
        ]);
        let row = map_row(grades, &raw);
        let errors = validate_row(grades, &row, &ReferenceIndex::new());
        assert_eq!(
            errors,
            vec![
                "Institution Code is required".to_string(),
                "Regulation Code is required".to_string(),
                "Grade is required".to_string(),
                "Description is required".to_string(),
                "Order Index must be a whole number".to_string(),
                "Grade Point must be between 0 and 10".to_string(),
            ]
        );
    }

    #[test]
    fn validation_is_idempotent() {
        let refs = refs_with_jkkn();
        let row = year_row("not a date", "2025-01-01");
        let first = validate_row(&AcademicYears, &row, &refs);
        let second = validate_row(&AcademicYears, &row, &refs);
        assert_eq!(first, second);
        assert_eq!(first, vec!["Start Date must be a valid date (YYYY-MM-DD)".to_string()]);
    }

    #[test]
    fn negative_order_index_uses_lower_bound_message() {
        let grades = lookup("grades").unwrap();
        let raw = RawRow::from_pairs([("Order Index", Cell::Number(-1.0))]);
        let errors = validate_row(grades, &map_row(grades, &raw), &ReferenceIndex::new());
        assert!(errors.contains(&"Order Index must be 0 or greater".to_string()));
    }
}
