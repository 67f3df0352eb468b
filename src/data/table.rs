//! Typed CRUD handle over one store table.
//!
//! A [`Table<T>`] is composed from plain data (name, definition, transform)
//! and an explicit store handle; every table shares the CRUD code below.
//! The transform is the single place a raw [`Record`] becomes a `T`.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use mindless::data::{CreateOptions, KeySchema, MemoryStore, Table, TableDefinition, TableStore};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct User { id: String, name: String }
//!
//! # async fn demo() -> mindless::Result<()> {
//! let store: Arc<dyn TableStore> = Arc::new(MemoryStore::new());
//! let users: Table<User> =
//!     Table::serde("users", TableDefinition::new(KeySchema::string("id")), store.clone())?;
//! # store.create_tables().await.ok();
//!
//! let alice = users.create(json!({ "id": "1", "name": "alice" }), CreateOptions::default()).await?;
//! assert_eq!(alice.name, "alice");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::error;

use super::definition::TableDefinition;
use super::store::{CreateOptions, DeleteOptions, Key, Record, StoreError, TableStore, UpdateOptions};
use crate::error::{Error, Result};

const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// Turns a raw record into the table's model type.
pub type Transform<T> = Arc<dyn Fn(Record) -> Result<T> + Send + Sync>;

pub struct Table<T> {
    name: String,
    definition: TableDefinition,
    store: Arc<dyn TableStore>,
    transform: Transform<T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            definition: self.definition.clone(),
            store: Arc::clone(&self.store),
            transform: Arc::clone(&self.transform),
        }
    }
}

impl<T> Table<T> {
    /// Registers `definition` under `name` with `store` and returns the
    /// handle. Registration happens here, before any item call can be made.
    pub fn new<F>(
        name: impl Into<String>,
        definition: TableDefinition,
        store: Arc<dyn TableStore>,
        transform: F,
    ) -> Result<Self>
    where
        F: Fn(Record) -> Result<T> + Send + Sync + 'static,
    {
        let name = name.into();
        store
            .define(&name, &definition)
            .map_err(|source| Error::StoreWrite { table: name.clone(), source })?;

        Ok(Self { name, definition, store, transform: Arc::new(transform) })
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn definition(&self) -> &TableDefinition { &self.definition }

    /// Writes a new record and returns it as a model.
    pub async fn create(&self, data: impl Serialize, options: CreateOptions) -> Result<T> {
        let mut record = self.to_record(data)?;
        if self.definition.timestamps {
            record.insert(CREATED_AT.to_owned(), now());
        }

        let created = self
            .store
            .put(&self.name, record, &options)
            .await
            .map_err(|e| self.write_error("create", e))?;
        (self.transform)(created)
    }

    /// Point read by primary key.
    pub async fn get(&self, hash: impl Into<Value>, range: Option<Value>) -> Result<Option<T>> {
        let key = Key::new(hash, range);
        let found = self
            .store
            .get(&self.name, &key)
            .await
            .map_err(|e| self.read_error("get", e))?;
        found.map(|record| (self.transform)(record)).transpose()
    }

    /// Scans the whole table and transforms every record.
    pub async fn get_all(&self) -> Result<Vec<T>> {
        self.get_all_raw()
            .await?
            .into_iter()
            .map(|record| (self.transform)(record))
            .collect()
    }

    /// Scans the whole table, returning records untransformed.
    pub async fn get_all_raw(&self) -> Result<Vec<Record>> {
        self.store
            .scan(&self.name)
            .await
            .map_err(|e| self.read_error("scan", e))
    }

    /// Updates the record addressed by the key attributes in `data`.
    pub async fn update(&self, data: impl Serialize, options: UpdateOptions) -> Result<T> {
        let mut record = self.to_record(data)?;
        if self.definition.timestamps {
            record.insert(UPDATED_AT.to_owned(), now());
        }

        let updated = self
            .store
            .update(&self.name, record, &options)
            .await
            .map_err(|e| self.write_error("update", e))?;
        (self.transform)(updated)
    }

    /// Deletes by primary key. Pass `range` only for composite keys.
    ///
    /// Returns the deleted record, or `None` if nothing was stored under
    /// the key.
    pub async fn delete(
        &self,
        hash: impl Into<Value>,
        range: Option<Value>,
        options: DeleteOptions,
    ) -> Result<Option<T>> {
        let key = Key::new(hash, range);
        let deleted = self
            .store
            .delete(&self.name, &key, &options)
            .await
            .map_err(|e| self.write_error("delete", e))?;
        deleted.map(|record| (self.transform)(record)).transpose()
    }

    fn to_record(&self, data: impl Serialize) -> Result<Record> {
        match serde_json::to_value(data)? {
            Value::Object(record) => Ok(record),
            _ => Err(self.write_error("serialize", StoreError::NotAnObject)),
        }
    }

    fn read_error(&self, op: &'static str, source: StoreError) -> Error {
        error!(table = %self.name, op, error = %source, "store read failed");
        Error::StoreRead { table: self.name.clone(), source }
    }

    fn write_error(&self, op: &'static str, source: StoreError) -> Error {
        error!(table = %self.name, op, error = %source, "store write failed");
        Error::StoreWrite { table: self.name.clone(), source }
    }
}

impl<T: DeserializeOwned + 'static> Table<T> {
    /// A table whose transform deserializes records with serde.
    pub fn serde(
        name: impl Into<String>,
        definition: TableDefinition,
        store: Arc<dyn TableStore>,
    ) -> Result<Self> {
        let name = name.into();
        let table = name.clone();
        Self::new(name, definition, store, move |record| {
            serde_json::from_value(Value::Object(record))
                .map_err(|e| Error::Transform { table: table.clone(), reason: e.to_string() })
        })
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::data::{KeySchema, MemoryStore};

    /// A store whose every item call fails.
    struct Unreachable;

    fn down() -> StoreError {
        StoreError::Driver("connection refused".into())
    }

    #[async_trait]
    impl TableStore for Unreachable {
        fn define(&self, _: &str, _: &TableDefinition) -> std::result::Result<(), StoreError> { Ok(()) }
        async fn create_tables(&self) -> std::result::Result<(), StoreError> { Ok(()) }
        async fn put(&self, _: &str, _: Record, _: &CreateOptions) -> std::result::Result<Record, StoreError> { Err(down()) }
        async fn get(&self, _: &str, _: &Key) -> std::result::Result<Option<Record>, StoreError> { Err(down()) }
        async fn scan(&self, _: &str) -> std::result::Result<Vec<Record>, StoreError> { Err(down()) }
        async fn update(&self, _: &str, _: Record, _: &UpdateOptions) -> std::result::Result<Record, StoreError> { Err(down()) }
        async fn delete(&self, _: &str, _: &Key, _: &DeleteOptions) -> std::result::Result<Option<Record>, StoreError> { Err(down()) }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Post {
        id: String,
        title: String,
    }

    fn counting(store: Arc<dyn TableStore>, calls: Arc<AtomicUsize>) -> Table<Post> {
        Table::new("posts", TableDefinition::new(KeySchema::string("id")), store, move |record| {
            calls.fetch_add(1, Ordering::SeqCst);
            serde_json::from_value(Value::Object(record)).map_err(Error::from)
        })
        .unwrap()
    }

    async fn memory() -> Arc<dyn TableStore> {
        let store = Arc::new(MemoryStore::new());
        store.define("posts", &TableDefinition::new(KeySchema::string("id"))).unwrap();
        store.create_tables().await.unwrap();
        store
    }

    #[tokio::test]
    async fn failures_surface_without_transforming() {
        let calls = Arc::new(AtomicUsize::new(0));
        let table = counting(Arc::new(Unreachable), calls.clone());
        let post = json!({ "id": "1", "title": "t" });

        assert!(matches!(
            table.create(&post, CreateOptions::default()).await,
            Err(Error::StoreWrite { ref table, source: StoreError::Driver(_) }) if table == "posts"
        ));
        assert!(matches!(table.update(&post, UpdateOptions::default()).await, Err(Error::StoreWrite { .. })));
        assert!(matches!(table.delete("1", None, DeleteOptions::default()).await, Err(Error::StoreWrite { .. })));
        assert!(matches!(table.get_all().await, Err(Error::StoreRead { .. })));
        assert!(matches!(table.get_all_raw().await, Err(Error::StoreRead { .. })));
        assert!(matches!(table.get("1", None).await, Err(Error::StoreRead { .. })));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_transforms_once_per_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let table = counting(memory().await, calls.clone());

        let created = table.create(json!({ "id": "1", "title": "first" }), CreateOptions::default()).await.unwrap();
        assert_eq!(created, Post { id: "1".into(), title: "first".into() });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        table.create(json!({ "id": "2", "title": "second" }), CreateOptions::default()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let all = table.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let raw = table.get_all_raw().await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let updated = table.update(json!({ "id": "1", "title": "renamed" }), UpdateOptions::default()).await.unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let deleted = table.delete("2", None, DeleteOptions::default()).await.unwrap();
        assert_eq!(deleted.map(|p| p.id), Some("2".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 6);

        assert!(table.delete("2", None, DeleteOptions::default()).await.unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn timestamps_are_stamped() {
        let store: Arc<dyn TableStore> = Arc::new(MemoryStore::new());
        let def = TableDefinition::new(KeySchema::string("id")).timestamps(true);
        let table = Table::new("events", def, store.clone(), Ok).unwrap();
        store.create_tables().await.unwrap();

        let created = table.create(json!({ "id": "e" }), CreateOptions::default()).await.unwrap();
        assert!(created.get("createdAt").is_some_and(Value::is_string));
        assert!(created.get("updatedAt").is_none());

        let updated = table.update(json!({ "id": "e", "n": 1 }), UpdateOptions::default()).await.unwrap();
        assert!(updated.get("createdAt").is_some());
        assert!(updated.get("updatedAt").is_some_and(Value::is_string));
    }

    #[tokio::test]
    async fn composite_keys_address_single_items() {
        let store: Arc<dyn TableStore> = Arc::new(MemoryStore::new());
        let def = TableDefinition::new(KeySchema::string("author")).range_key(KeySchema::number("seq"));
        let table = Table::new("entries", def, store.clone(), Ok).unwrap();
        store.create_tables().await.unwrap();

        table.create(json!({ "author": "ann", "seq": 1, "body": "one" }), CreateOptions::default()).await.unwrap();
        table.create(json!({ "author": "ann", "seq": 2, "body": "two" }), CreateOptions::default()).await.unwrap();

        let first = table.get("ann", Some(json!(1))).await.unwrap().unwrap();
        assert_eq!(first["body"], "one");

        let removed = table.delete("ann", Some(json!(1)), DeleteOptions::default()).await.unwrap();
        assert_eq!(removed.map(|r| r["body"].clone()), Some(json!("one")));
        assert!(table.get("ann", Some(json!(1))).await.unwrap().is_none());

        let rest = table.get_all_raw().await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["seq"], 2);

        assert!(matches!(
            table.delete("ann", None, DeleteOptions::default()).await,
            Err(Error::StoreWrite { source: StoreError::MissingKey { ref attribute }, .. }) if attribute == "seq"
        ));
        assert_eq!(table.get_all_raw().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn serde_transform_reports_shape_mismatch() {
        let table: Table<Post> =
            Table::serde("posts", TableDefinition::new(KeySchema::string("id")), memory().await).unwrap();

        let err = table.create(json!({ "id": "1" }), CreateOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::Transform { ref table, .. } if table == "posts"));
    }

    #[tokio::test]
    async fn non_object_data_is_rejected() {
        let table: Table<Post> =
            Table::serde("posts", TableDefinition::new(KeySchema::string("id")), memory().await).unwrap();
        assert!(matches!(
            table.create(json!([1, 2]), CreateOptions::default()).await,
            Err(Error::StoreWrite { source: StoreError::NotAnObject, .. })
        ));
    }
}
