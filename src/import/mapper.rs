//! Header-alias resolution and per-kind coercion of uploaded cells.

use chrono::{Duration, NaiveDate};

use super::row::{format_number, CanonicalRow, Cell, FieldValue, RawRow};
use crate::entities::{Entity, FieldKind, FieldSpec};

/// Headers tried for a field, highest priority first.
pub fn header_candidates(field: &FieldSpec) -> Vec<String> {
    let mut out = vec![format!("{} *", field.label)];
    out.extend(field.aliases.iter().map(|a| a.to_string()));
    out.push(format!("{}*", field.label));
    out.push(field.label.to_string());
    out.push(field.key.to_string());
    out
}

pub fn map_row(entity: &dyn Entity, raw: &RawRow) -> CanonicalRow {
    let mut row = CanonicalRow::new();
    for field in entity.fields() {
        let found = header_candidates(field)
            .iter()
            .filter_map(|h| raw.get(h))
            .find(|c| !c.is_blank())
            .cloned();
        let cell = match (found, field.default) {
            (Some(c), _) => c,
            (None, Some(d)) => Cell::Text(d.to_string()),
            (None, None) => Cell::Empty,
        };
        row.set(field.key, coerce(field.kind, &cell));
    }
    entity.normalize(&mut row);
    row
}

/// Builds a row from a JSON record as sent by `records.create`/`records.update`.
pub fn map_json(entity: &dyn Entity, obj: &serde_json::Map<String, serde_json::Value>) -> CanonicalRow {
    map_row(entity, &RawRow::from_json_object(obj))
}

pub fn coerce(kind: FieldKind, cell: &Cell) -> FieldValue {
    if cell.is_blank() {
        return match kind {
            FieldKind::Bool => FieldValue::Bool(false),
            _ => FieldValue::Null,
        };
    }
    match kind {
        FieldKind::Text => FieldValue::Text(cell.display().trim().to_string()),
        FieldKind::Number | FieldKind::Integer => match cell {
            Cell::Number(n) => FieldValue::Number(*n),
            other => {
                let text = other.display().trim().to_string();
                match text.parse::<f64>() {
                    Ok(n) if n.is_finite() => FieldValue::Number(n),
                    _ => FieldValue::Text(text),
                }
            }
        },
        FieldKind::Bool => match cell {
            Cell::Bool(b) => FieldValue::Bool(*b),
            other => FieldValue::Bool(parse_bool(&other.display())),
        },
        FieldKind::Date => match cell {
            Cell::Number(n) => serial_to_date(*n)
                .map(FieldValue::Text)
                .unwrap_or_else(|| FieldValue::Text(format_number(*n))),
            other => FieldValue::Text(normalize_date(other.display().trim())),
        },
        FieldKind::Time => match cell {
            Cell::Number(n) => FieldValue::Text(fraction_to_time(*n)),
            other => FieldValue::Text(normalize_time(other.display().trim())),
        },
    }
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "y" | "1" | "active" | "pass"
    )
}

/// Excel serial day (1 = 1899-12-31, with the 1900 leap bug folded into the epoch).
pub fn serial_to_date(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 1.0 || serial > 2_958_465.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(Duration::days(serial.floor() as i64))?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// `YYYY-MM-DD` passes through, serials and `DD-MM-YYYY` are rewritten,
/// anything else is returned unchanged for the validator to reject.
pub fn normalize_date(raw: &str) -> String {
    if is_iso_date(raw) {
        return raw.to_string();
    }
    if let Ok(serial) = raw.parse::<f64>() {
        if let Some(d) = serial_to_date(serial) {
            return d;
        }
    }
    let parts: Vec<&str> = raw.split(['-', '/', '.']).collect();
    if parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
        if parts[0].len() == 4 {
            return format!("{}-{:0>2}-{:0>2}", parts[0], parts[1], parts[2]);
        }
        if parts[2].len() == 4 && parts[0].len() <= 2 && parts[1].len() <= 2 {
            return format!("{}-{:0>2}-{:0>2}", parts[2], parts[1], parts[0]);
        }
    }
    raw.to_string()
}

pub fn is_iso_date(raw: &str) -> bool {
    raw.len() == 10
        && raw.as_bytes()[4] == b'-'
        && raw.as_bytes()[7] == b'-'
        && NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

pub fn fraction_to_time(fraction: f64) -> String {
    let day = fraction.fract().abs();
    let total = (day * 86_400.0).round() as u32 % 86_400;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

pub fn normalize_time(raw: &str) -> String {
    if is_time(raw) {
        return raw.to_string();
    }
    match raw.parse::<f64>() {
        Ok(f) if (0.0..1.0).contains(&f) => fraction_to_time(f),
        _ => raw.to_string(),
    }
}

/// `H:MM` or `H:MM:SS` with a valid clock reading.
pub fn is_time(raw: &str) -> bool {
    let parts: Vec<&str> = raw.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return false;
    }
    let digits = |s: &str, max_len: usize| {
        !s.is_empty() && s.len() <= max_len && s.chars().all(|c| c.is_ascii_digit())
    };
    if !digits(parts[0], 2) || parts[1..].iter().any(|p| p.len() != 2 || !digits(p, 2)) {
        return false;
    }
    let h: u32 = parts[0].parse().unwrap_or(99);
    let m: u32 = parts[1].parse().unwrap_or(99);
    let s: u32 = parts.get(2).and_then(|p| p.parse().ok()).unwrap_or(0);
    h < 24 && m < 60 && s < 60
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderReport {
    /// Source columns no field claims.
    pub ignored: Vec<String>,
    /// Required fields none of whose headers appear.
    pub missing: Vec<&'static str>,
}

impl HeaderReport {
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        for h in &self.ignored {
            out.push(format!("Column \"{}\" is not recognised and was ignored", h));
        }
        for label in &self.missing {
            out.push(format!("Required column \"{}\" is missing", label));
        }
        out
    }
}

pub fn analyze_headers(entity: &dyn Entity, headers: &[String]) -> HeaderReport {
    let candidates: Vec<(&FieldSpec, Vec<String>)> = entity
        .fields()
        .iter()
        .map(|f| (f, header_candidates(f)))
        .collect();
    let ignored = headers
        .iter()
        .filter(|h| !h.is_empty())
        .filter(|h| !candidates.iter().any(|(_, c)| c.iter().any(|x| x == *h)))
        .cloned()
        .collect();
    let missing = candidates
        .iter()
        .filter(|(f, _)| f.required && f.default.is_none())
        .filter(|(_, c)| !headers.iter().any(|h| c.contains(h)))
        .map(|(f, _)| f.label)
        .collect();
    HeaderReport { ignored, missing }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{lookup, AcademicYears};

    #[test]
    fn dates_normalize_from_serial_and_day_first() {
        assert_eq!(normalize_date("2025-06-01"), "2025-06-01");
        assert_eq!(normalize_date("1-6-2025"), "2025-06-01");
        assert_eq!(normalize_date("01/06/2025"), "2025-06-01");
        assert_eq!(normalize_date("45809"), "2025-06-01");
        assert_eq!(serial_to_date(45809.75).as_deref(), Some("2025-06-01"));
        assert_eq!(normalize_date("June 1st"), "June 1st");
    }

    #[test]
    fn date_normalization_is_idempotent() {
        for raw in ["2025-06-01", "1-6-2025", "45809", "garbage"] {
            let once = normalize_date(raw);
            assert_eq!(normalize_date(&once), once);
        }
    }

    #[test]
    fn times_accept_clock_and_day_fraction() {
        assert_eq!(normalize_time("9:45"), "9:45");
        assert_eq!(normalize_time("0.40625"), "09:45:00");
        assert_eq!(fraction_to_time(0.5), "12:00:00");
        assert!(!is_time("25:00"));
        assert!(!is_time("9:5"));
    }

    #[test]
    fn star_label_wins_over_plain_label() {
        let raw = RawRow::from_pairs([
            ("Institution Code", Cell::Text("LOSER".into())),
            ("Institution Code *", Cell::Text("JKKN".into())),
            ("Academic Year", Cell::Text("2025-2026".into())),
            ("Start Date * (DD-MM-YYYY)", Cell::Text("01-06-2025".into())),
            ("end_date", Cell::Number(46173.0)),
        ]);
        let row = map_row(&AcademicYears, &raw);
        assert_eq!(row.text("institution_code"), Some("JKKN"));
        assert_eq!(row.text("start_date"), Some("2025-06-01"));
        assert_eq!(row.text("end_date"), Some("2026-05-31"));
        assert_eq!(row.get("is_current"), &FieldValue::Bool(false));
        assert!(row.get("remarks").is_null());
    }

    #[test]
    fn blank_star_header_falls_through_to_next_alias() {
        let raw = RawRow::from_pairs([
            ("Institution Code *", Cell::Text("   ".into())),
            ("institution_code", Cell::Text("JKKN".into())),
        ]);
        let row = map_row(&AcademicYears, &raw);
        assert_eq!(row.text("institution_code"), Some("JKKN"));
    }

    #[test]
    fn numbers_keep_unparsable_text_and_render_integral_codes() {
        let grades = lookup("grades").unwrap();
        let raw = RawRow::from_pairs([
            ("Grade Point", Cell::Text("ten".into())),
            ("Regulation Code", Cell::Number(2021.0)),
            ("Qualify", Cell::Text("PASS".into())),
        ]);
        let row = map_row(grades, &raw);
        assert_eq!(row.get("grade_point"), &FieldValue::Text("ten".into()));
        assert_eq!(row.text("regulation_code"), Some("2021"));
        assert_eq!(row.get("qualify"), &FieldValue::Bool(true));
    }

    #[test]
    fn attendance_defaults_to_present() {
        let attendance = lookup("exam_attendance").unwrap();
        let row = map_row(attendance, &RawRow::new());
        assert_eq!(row.text("attendance_status"), Some("Present"));
        let raw = RawRow::from_pairs([("Status", Cell::Text("AB".into()))]);
        assert_eq!(map_row(attendance, &raw).text("attendance_status"), Some("Absent"));
    }

    #[test]
    fn header_analysis_reports_ignored_and_missing() {
        let headers = vec![
            "Institution Code *".to_string(),
            "Academic Year".to_string(),
            "Start Date".to_string(),
            "Colour".to_string(),
        ];
        let report = analyze_headers(&AcademicYears, &headers);
        assert_eq!(report.ignored, vec!["Colour".to_string()]);
        assert_eq!(report.missing, vec!["End Date"]);
    }
}
