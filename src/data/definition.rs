//! Table schema definitions.
//!
//! A [`TableDefinition`] is what a table registers with its store: the
//! primary key, optional secondary indexes, and whether writes are stamped
//! with `createdAt` / `updatedAt`.

use serde_json::Value;

use super::store::{Key, Record, StoreError};

/// Scalar types a key attribute may hold.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    /// Base64 text on the JSON side.
    Binary,
}

impl AttributeType {
    fn admits(self, value: &Value) -> bool {
        match self {
            Self::String | Self::Binary => value.is_string(),
            Self::Number => value.is_number(),
        }
    }
}

/// One key attribute: its name and scalar type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeySchema {
    pub name: String,
    pub kind: AttributeType,
}

impl KeySchema {
    pub fn new(name: impl Into<String>, kind: AttributeType) -> Self {
        Self { name: name.into(), kind }
    }

    pub fn string(name: impl Into<String>) -> Self { Self::new(name, AttributeType::String) }
    pub fn number(name: impl Into<String>) -> Self { Self::new(name, AttributeType::Number) }

    fn check(&self, value: &Value) -> Result<(), StoreError> {
        if self.kind.admits(value) {
            Ok(())
        } else {
            Err(StoreError::InvalidKey(format!(
                "attribute '{}' must be {:?}, got {value}",
                self.name, self.kind
            )))
        }
    }

    fn extract(&self, record: &Record) -> Result<Value, StoreError> {
        let value = record
            .get(&self.name)
            .ok_or_else(|| StoreError::MissingKey { attribute: self.name.clone() })?;
        self.check(value)?;
        Ok(value.clone())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexKind {
    Global,
    Local,
}

/// A secondary index. Local indexes share the table's hash key.
#[derive(Clone, Debug)]
pub struct SecondaryIndex {
    pub name: String,
    pub kind: IndexKind,
    pub hash_key: KeySchema,
    pub range_key: Option<KeySchema>,
}

/// Schema a table registers with its store.
///
/// ```rust
/// use mindless::data::{IndexKind, KeySchema, SecondaryIndex, TableDefinition};
///
/// let def = TableDefinition::new(KeySchema::string("userId"))
///     .range_key(KeySchema::number("postedAt"))
///     .index(SecondaryIndex {
///         name: "byTopic".into(),
///         kind: IndexKind::Global,
///         hash_key: KeySchema::string("topic"),
///         range_key: None,
///     })
///     .timestamps(true);
/// ```
#[derive(Clone, Debug)]
pub struct TableDefinition {
    pub hash_key: KeySchema,
    pub range_key: Option<KeySchema>,
    pub indexes: Vec<SecondaryIndex>,
    pub timestamps: bool,
}

impl TableDefinition {
    pub fn new(hash_key: KeySchema) -> Self {
        Self { hash_key, range_key: None, indexes: Vec::new(), timestamps: false }
    }

    pub fn range_key(mut self, key: KeySchema) -> Self {
        self.range_key = Some(key);
        self
    }

    pub fn index(mut self, index: SecondaryIndex) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.hash_key.name == name || self.range_key.as_ref().is_some_and(|k| k.name == name)
    }

    /// Pulls the primary key out of a record.
    pub fn key_of(&self, record: &Record) -> Result<Key, StoreError> {
        let hash = self.hash_key.extract(record)?;
        let range = self.range_key.as_ref().map(|k| k.extract(record)).transpose()?;
        Ok(Key { hash, range })
    }

    /// Checks a caller-supplied key against this schema: types must match,
    /// and a range value is required exactly when the table has a range key.
    pub fn check_key(&self, key: &Key) -> Result<(), StoreError> {
        self.hash_key.check(&key.hash)?;
        match (&self.range_key, &key.range) {
            (Some(schema), Some(value)) => schema.check(value),
            (Some(schema), None) => Err(StoreError::MissingKey { attribute: schema.name.clone() }),
            (None, Some(_)) => Err(StoreError::InvalidKey("table has no range key".into())),
            (None, None) => Ok(()),
        }
    }

    /// Renders a key back into record form.
    pub fn key_record(&self, key: &Key) -> Record {
        let mut record = Record::new();
        record.insert(self.hash_key.name.clone(), key.hash.clone());
        if let (Some(schema), Some(value)) = (&self.range_key, &key.range) {
            record.insert(schema.name.clone(), value.clone());
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn extracts_composite_key() {
        let def = TableDefinition::new(KeySchema::string("id")).range_key(KeySchema::number("at"));
        let key = def.key_of(&record(json!({ "id": "a", "at": 3, "x": true }))).unwrap();
        assert_eq!(key, Key::new("a", Some(json!(3))));
        assert!(def.is_key_attribute("at"));
        assert!(!def.is_key_attribute("x"));
    }

    #[test]
    fn rejects_missing_or_mistyped_keys() {
        let def = TableDefinition::new(KeySchema::string("id"));
        assert!(matches!(
            def.key_of(&record(json!({ "name": "x" }))),
            Err(StoreError::MissingKey { attribute }) if attribute == "id"
        ));
        assert!(matches!(def.key_of(&record(json!({ "id": 5 }))), Err(StoreError::InvalidKey(_))));
        assert!(matches!(def.check_key(&Key::new("a", Some(json!(1)))), Err(StoreError::InvalidKey(_))));
    }
}
