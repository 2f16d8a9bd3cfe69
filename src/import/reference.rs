use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use super::row::{format_number, CanonicalRow};
use crate::entities::{lookup, Entity, RefSpec};
use crate::store::{EntityStore, Record, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct RefEntry {
    pub id: String,
    /// Natural key as stored, parts joined with `" / "`.
    pub code: String,
    pub name: String,
}

/// Natural key to record id, per entity. Keys are trimmed and lower-cased.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    tables: HashMap<&'static str, HashMap<String, RefEntry>>,
}

pub fn normalize_key<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| p.as_ref().trim().to_lowercase())
        .collect::<Vec<_>>()
        .join("|")
}

fn value_text(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.as_f64().map(format_number).unwrap_or_default(),
        Some(other) => other.to_string(),
    }
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the entity's own records plus every reference target.
    pub fn build<S: EntityStore + ?Sized>(
        store: &S,
        entity: &dyn Entity,
    ) -> Result<Self, StoreError> {
        let mut index = ReferenceIndex::new();
        let mut targets: Vec<&'static dyn Entity> = Vec::new();
        if let Some(own) = lookup(entity.name()) {
            targets.push(own);
        }
        for r in entity.references() {
            if let Some(t) = lookup(r.target) {
                if !targets.iter().any(|x| x.name() == t.name()) {
                    targets.push(t);
                }
            }
        }
        for target in targets {
            let records = store.list(target, &Record::new())?;
            debug!(entity = target.name(), count = records.len(), "loaded reference records");
            index.load_records(target, &records);
        }
        Ok(index)
    }

    pub fn load_records(&mut self, entity: &'static dyn Entity, records: &[Record]) {
        let table = self.tables.entry(entity.name()).or_default();
        for rec in records {
            let Some(id) = rec.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            let parts: Vec<String> = entity
                .natural_key()
                .iter()
                .map(|k| value_text(rec.get(*k)))
                .collect();
            let name = entity
                .display_field()
                .map(|f| value_text(rec.get(f)))
                .unwrap_or_default();
            table.insert(
                normalize_key(&parts),
                RefEntry {
                    id: id.to_string(),
                    code: parts.join(" / "),
                    name,
                },
            );
        }
    }

    pub fn insert(&mut self, target: &'static str, key: String, entry: RefEntry) {
        self.tables.entry(target).or_default().insert(key, entry);
    }

    pub fn get(&self, target: &str, key: &str) -> Option<&RefEntry> {
        self.tables.get(target).and_then(|t| t.get(key))
    }

    /// Resolves `reference` using the row's source fields.
    pub fn resolve(&self, reference: &RefSpec, row: &CanonicalRow) -> Option<&RefEntry> {
        let parts: Vec<String> = reference.fields.iter().map(|f| row.key_part(f)).collect();
        self.get(reference.target, &normalize_key(&parts))
    }

    /// Entries of `target` sorted by code.
    pub fn entries(&self, target: &str) -> Vec<&RefEntry> {
        let mut out: Vec<&RefEntry> = self
            .tables
            .get(target)
            .map(|t| t.values().collect())
            .unwrap_or_default();
        out.sort_by(|a, b| a.code.cmp(&b.code));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Institutions, INSTITUTION_REF};
    use crate::import::row::FieldValue;
    use serde_json::json;

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let mut index = ReferenceIndex::new();
        let rec = json!({"id": "i-1", "institution_code": "JKKN", "institution_name": "JKKN College"});
        let rec = rec.as_object().unwrap().clone();
        index.load_records(&Institutions, &[rec]);

        let mut row = CanonicalRow::new();
        row.set("institution_code", FieldValue::Text("  jkkn ".into()));
        let hit = index.resolve(&INSTITUTION_REF, &row).unwrap();
        assert_eq!(hit.id, "i-1");
        assert_eq!(hit.name, "JKKN College");

        row.set("institution_code", FieldValue::Text("ZZZZ".into()));
        assert!(index.resolve(&INSTITUTION_REF, &row).is_none());
    }

    #[test]
    fn entries_are_sorted_by_code() {
        let mut index = ReferenceIndex::new();
        let recs: Vec<Record> = ["B", "A"]
            .iter()
            .enumerate()
            .map(|(i, c)| {
                json!({"id": format!("i-{i}"), "institution_code": c})
                    .as_object()
                    .unwrap()
                    .clone()
            })
            .collect();
        index.load_records(&Institutions, &recs);
        let entries = index.entries("institutions");
        let codes: Vec<&str> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B"]);
        assert!(index.entries("courses").is_empty());
    }
}
