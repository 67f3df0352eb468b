//! Data access over a hosted key-value table store.
//!
//! - [`TableStore`] is the driver seam. [`MemoryStore`] runs in-process;
//!   `DynamoStore` (cargo feature `dynamodb`) talks to DynamoDB or any
//!   endpoint that speaks its API.
//! - [`Table<T>`] is the typed CRUD handle controllers use.
//!
//! Stores are built once at startup and handed to each table explicitly:
//!
//! ```rust,ignore
//! let store: Arc<dyn TableStore> = Arc::new(DynamoStore::from_config(&config.store));
//! let users = Table::<User>::serde("users", users_definition(), store.clone())?;
//! store.create_tables().await?; // administrative, run once per environment
//! ```

mod definition;
mod memory;
mod store;
mod table;

#[cfg(feature = "dynamodb")]
mod dynamo;

pub use definition::{AttributeType, IndexKind, KeySchema, SecondaryIndex, TableDefinition};
pub use memory::MemoryStore;
pub use store::{CreateOptions, DeleteOptions, Key, Record, StoreError, TableStore, UpdateOptions};
pub use table::{Table, Transform};

#[cfg(feature = "dynamodb")]
pub use dynamo::DynamoStore;
