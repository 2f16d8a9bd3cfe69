use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// A single uploaded cell before any coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn from_json(value: &serde_json::Value) -> Cell {
        match value {
            serde_json::Value::Null => Cell::Empty,
            serde_json::Value::Bool(b) => Cell::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            serde_json::Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// True for `Empty` and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Number(n) => format_number(*n),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// Column header to cell, in source column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, Cell)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Cell)>,
        K: Into<String>,
    {
        let mut row = RawRow::new();
        for (k, v) in pairs {
            row.push(k, v);
        }
        row
    }

    pub fn from_json_object(obj: &serde_json::Map<String, serde_json::Value>) -> Self {
        RawRow::from_pairs(obj.iter().map(|(k, v)| (k.clone(), Cell::from_json(v))))
    }

    /// Later duplicates of a header replace the earlier cell.
    pub fn push(&mut self, header: impl Into<String>, cell: Cell) {
        let header = header.into();
        if let Some(slot) = self.cells.iter_mut().find(|(h, _)| *h == header) {
            slot.1 = cell;
        } else {
            self.cells.push((header, cell));
        }
    }

    pub fn get(&self, header: &str) -> Option<&Cell> {
        self.cells.iter().find(|(h, _)| h == header).map(|(_, c)| c)
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(h, _)| h.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(h, c)| (h.as_str(), c))
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, c)| c.is_blank())
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (k, v) in &self.cells {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A coerced canonical value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Number(n) => number_to_json(*n),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => {
                n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null)
            }
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

static NULL: FieldValue = FieldValue::Null;

/// Every field the entity declares, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRow {
    values: Vec<(&'static str, FieldValue)>,
}

impl Serialize for CanonicalRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl CanonicalRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> &FieldValue {
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .unwrap_or(&NULL)
    }

    pub fn set(&mut self, key: &'static str, value: FieldValue) {
        if let Some(slot) = self.values.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.values.push((key, value));
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.iter().any(|(k, _)| *k == key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).as_text().filter(|s| !s.is_empty())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Textual form used for natural-key matching.
    pub fn key_part(&self, key: &str) -> String {
        match self.get(key) {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.clone(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

/// Integral values print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

pub(crate) fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_drops_integral_fraction() {
        assert_eq!(format_number(2024.0), "2024");
        assert_eq!(format_number(8.5), "8.5");
    }

    #[test]
    fn raw_row_keeps_column_order_and_blankness() {
        let row = RawRow::from_pairs([
            ("B", Cell::Text("  ".into())),
            ("A", Cell::Empty),
        ]);
        assert_eq!(row.headers().collect::<Vec<_>>(), vec!["B", "A"]);
        assert!(row.is_blank());
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"B":"  ","A":null}"#
        );
    }

    #[test]
    fn canonical_row_missing_field_reads_null() {
        let mut row = CanonicalRow::new();
        row.set("grade", FieldValue::Text("O".into()));
        assert_eq!(row.text("grade"), Some("O"));
        assert!(row.get("grade_point").is_null());
    }
}
