//! SQLite-backed document store.
//!
//! Every collection shares one `documents` table; bodies are JSON text and
//! are queried through SQLite's JSON functions.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::{
    check_field_name, Document, DocumentStore, Fields, SortDirection, StoreError, StoreResult,
    SCHEMA,
};

/// Document store persisted in a SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_documents(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> StoreResult<Vec<Document>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, body) = row?;
            docs.push(Document {
                fields: parse_body(&body)?,
                id,
            });
        }
        Ok(docs)
    }
}

impl DocumentStore for SqliteStore {
    fn insert(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let body = serde_json::to_string(&fields)?;

        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
            params![collection, id, body],
        )?;
        Ok(id)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let conn = self.conn.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|body| -> StoreResult<Document> {
            Ok(Document {
                id: id.to_string(),
                fields: parse_body(&body)?,
            })
        })
        .transpose()
    }

    fn list_all(
        &self,
        collection: &str,
        order_field: &str,
        direction: SortDirection,
    ) -> StoreResult<Vec<Document>> {
        check_field_name(order_field)?;
        // NULLs (missing fields) sort first ascending and last descending,
        // matching the in-memory store.
        let sql = format!(
            r#"
            SELECT id, body
            FROM documents
            WHERE collection = ?1
            ORDER BY json_extract(body, '$.{}') {}
            "#,
            order_field,
            direction.as_sql()
        );
        self.query_documents(&sql, &[&collection])
    }

    fn list_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        check_field_name(field)?;
        let sql = format!(
            r#"
            SELECT id, body
            FROM documents
            WHERE collection = ?1 AND json_extract(body, '$.{}') = ?2
            "#,
            field
        );
        let value = to_sql_value(value);
        self.query_documents(&sql, &[&collection, &value])
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        let patch = serde_json::to_string(&fields)?;

        let conn = self.conn.lock()?;
        // json_patch merges top-level keys and drops keys patched to null.
        let rows_affected = conn.execute(
            r#"
            UPDATE documents SET body = json_patch(body, ?3)
            WHERE collection = ?1 AND id = ?2
            "#,
            params![collection, id, patch],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock()?;
        let rows_affected = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn parse_body(body: &str) -> StoreResult<Fields> {
    match serde_json::from_str(body)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Malformed(format!(
            "document body is not an object: {}",
            other
        ))),
    }
}

/// Map a JSON scalar onto what `json_extract` yields for it.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_schema_initialized() {
        let store = setup_store();
        let conn = store.conn.lock().unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"documents".to_string()));
    }

    #[test]
    fn test_insert_and_get() {
        let store = setup_store();
        let id = store
            .insert("patients", fields(json!({"name": "Alice", "age": 30})))
            .unwrap();

        let doc = store.get("patients", &id).unwrap().unwrap();
        assert_eq!(doc.fields["name"], json!("Alice"));
        assert_eq!(doc.fields["age"], json!(30));
        assert!(store.get("visitNotes", &id).unwrap().is_none());
    }

    #[test]
    fn test_list_all_descending() {
        let store = setup_store();
        for ts in ["2024-01-02", "2024-01-03", "2024-01-01"] {
            store.insert("c", fields(json!({"createdAt": ts}))).unwrap();
        }

        let order: Vec<_> = store
            .list_all("c", "createdAt", SortDirection::Descending)
            .unwrap()
            .into_iter()
            .map(|d| d.fields["createdAt"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["2024-01-03", "2024-01-02", "2024-01-01"]);
    }

    #[test]
    fn test_list_where_matches_strings_and_numbers() {
        let store = setup_store();
        store.insert("c", fields(json!({"patientId": "a", "n": 1}))).unwrap();
        store.insert("c", fields(json!({"patientId": "b", "n": 2}))).unwrap();

        assert_eq!(store.list_where("c", "patientId", &json!("a")).unwrap().len(), 1);
        assert_eq!(store.list_where("c", "n", &json!(2)).unwrap().len(), 1);
        assert!(store.list_where("c", "patientId", &json!("z")).unwrap().is_empty());
    }

    #[test]
    fn test_update_merges_and_null_removes() {
        let store = setup_store();
        let id = store
            .insert("c", fields(json!({"a": 1, "b": "x", "c": true})))
            .unwrap();

        store.update("c", &id, fields(json!({"b": "y", "c": null}))).unwrap();

        let doc = store.get("c", &id).unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"a": 1, "b": "y"})));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = setup_store();
        let result = store.update("c", "missing", fields(json!({"a": 1})));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_delete() {
        let store = setup_store();
        let id = store.insert("c", Fields::new()).unwrap();

        assert!(store.delete("c", &id).unwrap());
        assert!(!store.delete("c", &id).unwrap());
        assert!(store.get("c", &id).unwrap().is_none());
    }

    #[test]
    fn test_rejects_unsafe_field_names() {
        let store = setup_store();
        let result = store.list_all("c", "x') --", SortDirection::Ascending);
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }
}
