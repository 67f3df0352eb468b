//! The table-store driver seam.
//!
//! Every [`Table`](super::Table) holds an explicit `Arc<dyn TableStore>`
//! handed to it at construction; there is no process-wide driver. A store is
//! configured once at startup and shared read-only afterward.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::definition::TableDefinition;

/// A raw store item.
pub type Record = Map<String, Value>;

/// Errors raised by a [`TableStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("table '{0}' has not been defined")]
    UnknownTable(String),

    #[error("table '{0}' does not exist in the store")]
    TableNotFound(String),

    #[error("record is missing key attribute '{attribute}'")]
    MissingKey { attribute: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("record must be a JSON object")]
    NotAnObject,

    #[error("conditional check failed")]
    ConditionFailed,

    #[error("store driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Primary key of one item: the hash value and, for composite keys, the
/// range value.
#[derive(Clone, Debug, PartialEq)]
pub struct Key {
    pub hash: Value,
    pub range: Option<Value>,
}

impl Key {
    pub fn new(hash: impl Into<Value>, range: Option<Value>) -> Self {
        Self { hash: hash.into(), range }
    }
}

#[derive(Clone, Debug)]
pub struct CreateOptions {
    /// Replace an item already stored under the same key. When `false`,
    /// such a write fails with [`StoreError::ConditionFailed`].
    pub overwrite: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    /// Fail with [`StoreError::ConditionFailed`] instead of creating the
    /// item when nothing is stored under the key.
    pub expect_exists: bool,
}

#[derive(Clone, Debug, Default)]
pub struct DeleteOptions {
    /// Fail with [`StoreError::ConditionFailed`] when nothing is stored
    /// under the key.
    pub expect_exists: bool,
}

/// A hosted key-value table store.
///
/// Tables must be [`define`](TableStore::define)d before any item call.
/// Creating the tables themselves is the separate administrative
/// [`create_tables`](TableStore::create_tables) action; item calls never
/// create tables implicitly.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Registers (or replaces) a table schema.
    fn define(&self, table: &str, definition: &TableDefinition) -> Result<(), StoreError>;

    /// Creates every defined table that does not exist yet.
    async fn create_tables(&self) -> Result<(), StoreError>;

    /// Writes a new item and returns it as stored.
    async fn put(&self, table: &str, record: Record, options: &CreateOptions) -> Result<Record, StoreError>;

    async fn get(&self, table: &str, key: &Key) -> Result<Option<Record>, StoreError>;

    /// Loads every item in the table, following pagination to the end.
    async fn scan(&self, table: &str) -> Result<Vec<Record>, StoreError>;

    /// Updates the item addressed by the key attributes in `record`.
    ///
    /// Non-key attributes are merged into the stored item; a JSON `null`
    /// removes the attribute. Returns the item after the update.
    async fn update(&self, table: &str, record: Record, options: &UpdateOptions) -> Result<Record, StoreError>;

    /// Deletes by key and returns the removed item, if there was one.
    async fn delete(&self, table: &str, key: &Key, options: &DeleteOptions) -> Result<Option<Record>, StoreError>;
}
