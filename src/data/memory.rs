//! In-process table store.
//!
//! Behaves like the hosted store for everything the framework relies on:
//! tables must be defined and then created, keys are validated against the
//! schema, conditional writes fail the same way. Useful for tests and for
//! running the local server without a database.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use super::definition::TableDefinition;
use super::store::{CreateOptions, DeleteOptions, Key, Record, StoreError, TableStore, UpdateOptions};

/// Items keyed by the canonical text of their (hash, range) key, so scans come
/// back in a stable order.
type Items = BTreeMap<(String, Option<String>), Record>;

#[derive(Default)]
struct State {
    definitions: HashMap<String, TableDefinition>,
    tables: HashMap<String, Items>,
}

impl State {
    fn definition(&self, table: &str) -> Result<&TableDefinition, StoreError> {
        self.definitions.get(table).ok_or_else(|| StoreError::UnknownTable(table.to_owned()))
    }

    /// Definition and item map of a defined, created table.
    fn table_mut(&mut self, table: &str) -> Result<(&TableDefinition, &mut Items), StoreError> {
        let definition = self
            .definitions
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_owned()))?;
        let items = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_owned()))?;
        Ok((definition, items))
    }
}

fn slot(key: &Key) -> (String, Option<String>) {
    (canonical(&key.hash), key.range.as_ref().map(canonical))
}

/// Key text with numbers compared by value, so `1`, `1.0` and `1e0` share a
/// slot the way the hosted store's `N` keys do.
fn canonical(value: &Value) -> String {
    let Value::Number(n) = value else {
        return value.to_string();
    };
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `table` has been defined, created or not.
    pub fn is_defined(&self, table: &str) -> bool {
        self.state.lock().definition(table).is_ok()
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    fn define(&self, table: &str, definition: &TableDefinition) -> Result<(), StoreError> {
        self.state.lock().definitions.insert(table.to_owned(), definition.clone());
        debug!(table, "table defined");
        Ok(())
    }

    async fn create_tables(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let missing: Vec<String> = state
            .definitions
            .keys()
            .filter(|name| !state.tables.contains_key(*name))
            .cloned()
            .collect();
        for name in missing {
            info!(table = %name, "creating table");
            state.tables.insert(name, Items::new());
        }
        Ok(())
    }

    async fn put(&self, table: &str, record: Record, options: &CreateOptions) -> Result<Record, StoreError> {
        let mut state = self.state.lock();
        let (definition, items) = state.table_mut(table)?;
        let key = definition.key_of(&record)?;
        let id = slot(&key);

        if !options.overwrite && items.contains_key(&id) {
            return Err(StoreError::ConditionFailed);
        }
        items.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, table: &str, key: &Key) -> Result<Option<Record>, StoreError> {
        let mut state = self.state.lock();
        let (definition, items) = state.table_mut(table)?;
        definition.check_key(key)?;
        Ok(items.get(&slot(key)).cloned())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let mut state = self.state.lock();
        let (_, items) = state.table_mut(table)?;
        Ok(items.values().cloned().collect())
    }

    async fn update(&self, table: &str, record: Record, options: &UpdateOptions) -> Result<Record, StoreError> {
        let mut state = self.state.lock();
        let (definition, items) = state.table_mut(table)?;
        let key = definition.key_of(&record)?;

        let stored = match items.get(&slot(&key)) {
            Some(existing) => existing.clone(),
            None if options.expect_exists => return Err(StoreError::ConditionFailed),
            None => definition.key_record(&key),
        };

        let mut updated = stored;
        for (name, value) in record {
            if value.is_null() {
                updated.remove(&name);
            } else {
                updated.insert(name, value);
            }
        }
        items.insert(slot(&key), updated.clone());
        Ok(updated)
    }

    async fn delete(&self, table: &str, key: &Key, options: &DeleteOptions) -> Result<Option<Record>, StoreError> {
        let mut state = self.state.lock();
        let (definition, items) = state.table_mut(table)?;
        definition.check_key(key)?;

        let removed = items.remove(&slot(key));
        if removed.is_none() && options.expect_exists {
            return Err(StoreError::ConditionFailed);
        }
        Ok(removed)
    }
}
