use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use serde_json::Value;

use super::{EntityStore, Record, StoreError, Write};
use crate::entities::{Entity, FieldKind};
use crate::import::row::number_to_json;

/// Entity tables in the workspace database.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn fetch(&self, entity: &dyn Entity, id: &str) -> Result<Record, StoreError> {
        let mut filters = Record::new();
        filters.insert("id".into(), Value::String(id.to_string()));
        self.list(entity, &filters)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[derive(Clone, Copy)]
enum Column {
    Id,
    Field(FieldKind),
    Reference,
    Timestamp,
}

/// Column names and kinds of an entity table, in table order.
fn columns(entity: &dyn Entity) -> Vec<(&'static str, Column)> {
    let mut out = vec![("id", Column::Id)];
    out.extend(entity.fields().iter().map(|f| (f.key, Column::Field(f.kind))));
    out.extend(entity.references().iter().map(|r| (r.id_column, Column::Reference)));
    out.push(("created_at", Column::Timestamp));
    out.push(("updated_at", Column::Timestamp));
    out
}

/// Columns a caller may write; `id` and timestamps are managed here.
fn writable(entity: &dyn Entity) -> Vec<&'static str> {
    columns(entity)
        .into_iter()
        .filter(|(_, c)| matches!(c, Column::Field(_) | Column::Reference))
        .map(|(n, _)| n)
        .collect()
}

fn to_sql(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>, column: Column) -> Value {
    match (value, column) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), Column::Field(FieldKind::Bool)) => Value::Bool(i != 0),
        (ValueRef::Integer(i), _) => Value::from(i),
        (ValueRef::Real(f), _) => number_to_json(f),
        (ValueRef::Text(t), _) => Value::String(String::from_utf8_lossy(t).to_string()),
        (ValueRef::Blob(_), _) => Value::Null,
    }
}

fn map_write_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, _) = &e {
        if code.code == ErrorCode::ConstraintViolation {
            return match code.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => StoreError::Duplicate,
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    StoreError::Rejected("Referenced record does not exist".to_string())
                }
                _ => StoreError::Rejected(e.to_string()),
            };
        }
    }
    StoreError::Database(e)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl EntityStore for SqliteStore<'_> {
    fn list(&self, entity: &dyn Entity, filters: &Record) -> Result<Vec<Record>, StoreError> {
        let cols = columns(entity);
        let mut clauses = Vec::new();
        let mut args = Vec::new();
        for (k, v) in filters {
            if !cols.iter().any(|(n, _)| n == k) {
                return Err(StoreError::UnknownColumn(k.clone()));
            }
            args.push(to_sql(Some(v)));
            clauses.push(format!("{} = ?{}", k, args.len()));
        }
        let names: Vec<&str> = cols.iter().map(|(n, _)| *n).collect();
        let mut sql = format!("SELECT {} FROM {}", names.join(", "), entity.name());
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at, rowid");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (i, (name, column)) in cols.iter().enumerate() {
                record.insert(name.to_string(), from_sql(row.get_ref(i)?, *column));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn create(&self, entity: &dyn Entity, id: &str, record: &Record) -> Result<Record, StoreError> {
        let cols = writable(entity);
        let ts = now();
        let mut args: Vec<SqlValue> = vec![SqlValue::Text(id.to_string())];
        args.extend(cols.iter().map(|c| to_sql(record.get(*c))));
        args.push(SqlValue::Text(ts.clone()));
        args.push(SqlValue::Text(ts));

        let placeholders: Vec<String> = (1..=args.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {}(id, {}, created_at, updated_at) VALUES({})",
            entity.name(),
            cols.join(", "),
            placeholders.join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(args.iter()))
            .map_err(map_write_error)?;
        self.fetch(entity, id)
    }

    fn update(&self, entity: &dyn Entity, id: &str, record: &Record) -> Result<Record, StoreError> {
        let cols: Vec<&str> = writable(entity)
            .into_iter()
            .filter(|c| record.contains_key(*c))
            .collect();
        let mut args: Vec<SqlValue> = cols.iter().map(|c| to_sql(record.get(*c))).collect();
        args.push(SqlValue::Text(now()));
        args.push(SqlValue::Text(id.to_string()));

        let mut sets: Vec<String> = cols
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c, i + 1))
            .collect();
        sets.push(format!("updated_at = ?{}", cols.len() + 1));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            entity.name(),
            sets.join(", "),
            cols.len() + 2
        );
        let changed = self
            .conn
            .execute(&sql, params_from_iter(args.iter()))
            .map_err(map_write_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.fetch(entity, id)
    }

    fn delete(&self, entity: &dyn Entity, id: &str) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1", entity.name()), [id])
            .map_err(map_write_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn write_batch(
        &self,
        entity: &dyn Entity,
        writes: &[Write],
    ) -> Result<Vec<Result<Record, StoreError>>, StoreError> {
        // A failing statement only rolls back itself, so per-row results
        // survive inside the one transaction.
        let tx = self.conn.unchecked_transaction()?;
        let results = writes.iter().map(|w| self.apply(entity, w)).collect();
        tx.commit()?;
        Ok(results)
    }
}
