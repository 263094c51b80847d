//! In-process document store.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use super::{
    compare_values, Document, DocumentStore, Fields, SortDirection, StoreError, StoreResult,
};

/// Document store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Fields>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        let collections = self.collections.read()?;
        Ok(collections.get(collection).map_or(0, HashMap::len))
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut collections = self.collections.write()?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let collections = self.collections.read()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    fn list_all(
        &self,
        collection: &str,
        order_field: &str,
        direction: SortDirection,
    ) -> StoreResult<Vec<Document>> {
        let mut docs = self.list_where_inner(collection, |_| true)?;
        docs.sort_by(|a, b| {
            let ord = compare_values(a.fields.get(order_field), b.fields.get(order_field));
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
        Ok(docs)
    }

    fn list_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        self.list_where_inner(collection, |fields| fields.get(field) == Some(value))
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        let mut collections = self.collections.write()?;
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in fields {
            if value.is_null() {
                existing.remove(&key);
            } else {
                existing.insert(key, value);
            }
        }
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut collections = self.collections.write()?;
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }
}

impl MemoryStore {
    fn list_where_inner<F>(&self, collection: &str, predicate: F) -> StoreResult<Vec<Document>>
    where
        F: Fn(&Fields) -> bool,
    {
        let collections = self.collections.read()?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| predicate(fields))
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let store = MemoryStore::new();
        let id = store.insert("patients", fields(json!({"name": "Alice"}))).unwrap();

        let doc = store.get("patients", &id).unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.fields["name"], json!("Alice"));
        assert!(store.get("patients", "missing").unwrap().is_none());
        assert!(store.get("other", &id).unwrap().is_none());
    }

    #[test]
    fn test_list_all_ordering() {
        let store = MemoryStore::new();
        for n in [2, 3, 1] {
            store.insert("c", fields(json!({"n": n}))).unwrap();
        }

        let desc: Vec<_> = store
            .list_all("c", "n", SortDirection::Descending)
            .unwrap()
            .into_iter()
            .map(|d| d.fields["n"].as_i64().unwrap())
            .collect();
        assert_eq!(desc, vec![3, 2, 1]);

        let asc: Vec<_> = store
            .list_all("c", "n", SortDirection::Ascending)
            .unwrap()
            .into_iter()
            .map(|d| d.fields["n"].as_i64().unwrap())
            .collect();
        assert_eq!(asc, vec![1, 2, 3]);
    }

    #[test]
    fn test_list_where() {
        let store = MemoryStore::new();
        store.insert("notes", fields(json!({"patientId": "a"}))).unwrap();
        store.insert("notes", fields(json!({"patientId": "a"}))).unwrap();
        store.insert("notes", fields(json!({"patientId": "b"}))).unwrap();

        assert_eq!(store.list_where("notes", "patientId", &json!("a")).unwrap().len(), 2);
        assert_eq!(store.list_where("notes", "patientId", &json!("z")).unwrap().len(), 0);
        assert!(store.list_where("empty", "patientId", &json!("a")).unwrap().is_empty());
    }

    #[test]
    fn test_update_merges_and_null_removes() {
        let store = MemoryStore::new();
        let id = store
            .insert("c", fields(json!({"a": 1, "b": 2, "c": 3})))
            .unwrap();

        store.update("c", &id, fields(json!({"b": 20, "c": null}))).unwrap();

        let doc = store.get("c", &id).unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"a": 1, "b": 20})));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let result = store.update("c", "nope", Fields::new());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        let id = store.insert("c", Fields::new()).unwrap();

        assert!(store.delete("c", &id).unwrap());
        assert!(!store.delete("c", &id).unwrap());
        assert_eq!(store.count("c").unwrap(), 0);
    }
}
