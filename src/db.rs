use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::entities::{self, Entity};

pub const DB_FILE: &str = "exam.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    migrate(&conn)?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_checkpoints(
            fingerprint TEXT PRIMARY KEY,
            entity TEXT NOT NULL,
            last_row INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    for entity in entities::all() {
        ensure_entity_table(conn, *entity)?;
    }
    Ok(())
}

/// Creates the entity table and its natural-key index; adds columns declared
/// since the workspace was created.
fn ensure_entity_table(conn: &Connection, entity: &dyn Entity) -> anyhow::Result<()> {
    let table = entity.name();
    let mut cols = vec!["id TEXT PRIMARY KEY".to_string()];
    for f in entity.fields() {
        cols.push(format!("{} {}", f.key, f.kind.sql_type()));
    }
    for r in entity.references() {
        cols.push(format!("{} TEXT REFERENCES {}(id)", r.id_column, r.target));
    }
    cols.push("created_at TEXT NOT NULL".to_string());
    cols.push("updated_at TEXT NOT NULL".to_string());
    conn.execute(
        &format!("CREATE TABLE IF NOT EXISTS {}(\n    {}\n)", table, cols.join(",\n    ")),
        [],
    )?;

    for f in entity.fields() {
        if !table_has_column(conn, table, f.key)? {
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN {} {}", table, f.key, f.kind.sql_type()),
                [],
            )?;
        }
    }
    for r in entity.references() {
        if !table_has_column(conn, table, r.id_column)? {
            conn.execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {} TEXT REFERENCES {}(id)",
                    table, r.id_column, r.target
                ),
                [],
            )?;
        }
    }

    let key_cols: Vec<String> = entity
        .natural_key()
        .iter()
        .map(|k| format!("{} COLLATE NOCASE", k))
        .collect();
    conn.execute(
        &format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_{}_natural_key ON {}({})",
            table,
            table,
            key_cols.join(", ")
        ),
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}

pub fn checkpoint_get(conn: &Connection, fingerprint: &str) -> anyhow::Result<Option<usize>> {
    let last: Option<i64> = conn
        .query_row(
            "SELECT last_row FROM import_checkpoints WHERE fingerprint = ?",
            [fingerprint],
            |row| row.get(0),
        )
        .optional()?;
    Ok(last.map(|n| n.max(0) as usize))
}

pub fn checkpoint_set(
    conn: &Connection,
    fingerprint: &str,
    entity: &str,
    last_row: usize,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO import_checkpoints(fingerprint, entity, last_row, updated_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(fingerprint) DO UPDATE SET
            last_row = excluded.last_row,
            updated_at = excluded.updated_at",
        (
            fingerprint,
            entity,
            last_row as i64,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

pub fn checkpoint_clear(conn: &Connection, fingerprint: &str) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM import_checkpoints WHERE fingerprint = ?",
        [fingerprint],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_repeatable_and_creates_entity_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        for entity in entities::all() {
            assert!(table_has_column(&conn, entity.name(), "id").unwrap());
            for r in entity.references() {
                assert!(table_has_column(&conn, entity.name(), r.id_column).unwrap());
            }
        }
    }

    #[test]
    fn settings_and_checkpoints_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert!(settings_get_json(&conn, "setup.import").unwrap().is_none());
        settings_set_json(&conn, "setup.import", &serde_json::json!({"batchSize": 5})).unwrap();
        let saved = settings_get_json(&conn, "setup.import").unwrap().unwrap();
        assert_eq!(saved["batchSize"], 5);

        checkpoint_set(&conn, "abc", "grades", 7).unwrap();
        checkpoint_set(&conn, "abc", "grades", 9).unwrap();
        assert_eq!(checkpoint_get(&conn, "abc").unwrap(), Some(9));
        checkpoint_clear(&conn, "abc").unwrap();
        assert_eq!(checkpoint_get(&conn, "abc").unwrap(), None);
    }
}
