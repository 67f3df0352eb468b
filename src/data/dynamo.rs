//! DynamoDB table store (cargo feature `dynamodb`).
//!
//! Records cross the wire through `serde_dynamo`; the schema registered via
//! [`TableStore::define`] supplies key names for key-addressed calls and the
//! key schema / indexes for [`TableStore::create_tables`].

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    LocalSecondaryIndex, Projection, ProjectionType, ReturnValue, ScalarAttributeType,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use super::definition::{AttributeType, IndexKind, KeySchema, TableDefinition};
use super::store::{CreateOptions, DeleteOptions, Key, Record, StoreError, TableStore, UpdateOptions};
use crate::config::StoreConfig;

type Item = HashMap<String, AttributeValue>;

pub struct DynamoStore {
    client: Client,
    definitions: RwLock<HashMap<String, TableDefinition>>,
}

impl DynamoStore {
    /// Builds a client from the configured region, credential pair and
    /// optional endpoint (DynamoDB Local, LocalStack, …).
    pub fn from_config(config: &StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "mindless-config",
        );
        let mut builder = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }
        info!(region = %config.region, endpoint = ?config.endpoint, "dynamodb client configured");
        Self::with_client(Client::from_conf(builder.build()))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client, definitions: RwLock::new(HashMap::new()) }
    }

    fn definition(&self, table: &str) -> Result<TableDefinition, StoreError> {
        self.definitions
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTable(table.to_owned()))
    }

    fn key_item(definition: &TableDefinition, key: &Key) -> Result<Item, StoreError> {
        definition.check_key(key)?;
        to_item(&definition.key_record(key))
    }
}

#[async_trait]
impl TableStore for DynamoStore {
    fn define(&self, table: &str, definition: &TableDefinition) -> Result<(), StoreError> {
        self.definitions.write().insert(table.to_owned(), definition.clone());
        debug!(table, "table defined");
        Ok(())
    }

    async fn create_tables(&self) -> Result<(), StoreError> {
        let definitions: Vec<(String, TableDefinition)> = self
            .definitions
            .read()
            .iter()
            .map(|(name, def)| (name.clone(), def.clone()))
            .collect();

        for (name, definition) in definitions {
            let request = self
                .client
                .create_table()
                .table_name(&name)
                .set_key_schema(Some(key_schema(&definition.hash_key, definition.range_key.as_ref())?))
                .set_attribute_definitions(Some(attribute_definitions(&definition)?))
                .billing_mode(BillingMode::PayPerRequest);

            let mut global = Vec::new();
            let mut local = Vec::new();
            for index in &definition.indexes {
                let schema = key_schema(&index.hash_key, index.range_key.as_ref())?;
                let projection = Projection::builder().projection_type(ProjectionType::All).build();
                match index.kind {
                    IndexKind::Global => global.push(
                        GlobalSecondaryIndex::builder()
                            .index_name(&index.name)
                            .set_key_schema(Some(schema))
                            .projection(projection)
                            .build()
                            .map_err(driver)?,
                    ),
                    IndexKind::Local => local.push(
                        LocalSecondaryIndex::builder()
                            .index_name(&index.name)
                            .set_key_schema(Some(schema))
                            .projection(projection)
                            .build()
                            .map_err(driver)?,
                    ),
                }
            }
            let request = request
                .set_global_secondary_indexes((!global.is_empty()).then_some(global))
                .set_local_secondary_indexes((!local.is_empty()).then_some(local));

            match request.send().await {
                Ok(_) => info!(table = %name, "table created"),
                Err(e) if e.code() == Some("ResourceInUseException") => {
                    debug!(table = %name, "table already exists");
                }
                Err(e) => return Err(classify(&name, e)),
            }
        }
        Ok(())
    }

    async fn put(&self, table: &str, record: Record, options: &CreateOptions) -> Result<Record, StoreError> {
        let definition = self.definition(table)?;
        definition.key_of(&record)?;

        let mut request = self.client.put_item().table_name(table).set_item(Some(to_item(&record)?));
        if !options.overwrite {
            request = request
                .condition_expression("attribute_not_exists(#hk)")
                .expression_attribute_names("#hk", &definition.hash_key.name);
        }
        request.send().await.map_err(|e| classify(table, e))?;
        Ok(record)
    }

    async fn get(&self, table: &str, key: &Key) -> Result<Option<Record>, StoreError> {
        let definition = self.definition(table)?;
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(Self::key_item(&definition, key)?))
            .send()
            .await
            .map_err(|e| classify(table, e))?;
        output.item().cloned().map(from_item).transpose()
    }

    async fn scan(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        self.definition(table)?;

        let mut pages = self.client.scan().table_name(table).into_paginator().items().send();
        let mut records = Vec::new();
        while let Some(item) = pages.next().await {
            records.push(from_item(item.map_err(|e| classify(table, e))?)?);
        }
        Ok(records)
    }

    async fn update(&self, table: &str, record: Record, options: &UpdateOptions) -> Result<Record, StoreError> {
        let definition = self.definition(table)?;
        let key = definition.key_of(&record)?;

        let mut request = self
            .client
            .update_item()
            .table_name(table)
            .set_key(Some(Self::key_item(&definition, &key)?))
            .return_values(ReturnValue::AllNew);

        let mut sets = Vec::new();
        let mut removes = Vec::new();
        let attributes = record.iter().filter(|(name, _)| !definition.is_key_attribute(name));
        for (i, (name, value)) in attributes.enumerate() {
            request = request.expression_attribute_names(format!("#a{i}"), name);
            if value.is_null() {
                removes.push(format!("#a{i}"));
            } else {
                request = request.expression_attribute_values(format!(":v{i}"), to_attribute(value)?);
                sets.push(format!("#a{i} = :v{i}"));
            }
        }

        let mut expression = Vec::new();
        if !sets.is_empty() {
            expression.push(format!("SET {}", sets.join(", ")));
        }
        if !removes.is_empty() {
            expression.push(format!("REMOVE {}", removes.join(", ")));
        }
        if !expression.is_empty() {
            request = request.update_expression(expression.join(" "));
        }
        if options.expect_exists {
            request = request
                .condition_expression("attribute_exists(#hk)")
                .expression_attribute_names("#hk", &definition.hash_key.name);
        }

        let output = request.send().await.map_err(|e| classify(table, e))?;
        match output.attributes() {
            Some(item) => from_item(item.clone()),
            None => Ok(definition.key_record(&key)),
        }
    }

    async fn delete(&self, table: &str, key: &Key, options: &DeleteOptions) -> Result<Option<Record>, StoreError> {
        let definition = self.definition(table)?;

        let mut request = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(Self::key_item(&definition, key)?))
            .return_values(ReturnValue::AllOld);
        if options.expect_exists {
            request = request
                .condition_expression("attribute_exists(#hk)")
                .expression_attribute_names("#hk", &definition.hash_key.name);
        }

        let output = request.send().await.map_err(|e| classify(table, e))?;
        output.attributes().cloned().map(from_item).transpose()
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

fn to_item(record: &Record) -> Result<Item, StoreError> {
    serde_dynamo::to_item(record).map_err(driver)
}

fn from_item(item: Item) -> Result<Record, StoreError> {
    serde_dynamo::from_item(item).map_err(driver)
}

fn to_attribute(value: &Value) -> Result<AttributeValue, StoreError> {
    serde_dynamo::to_attribute_value(value).map_err(driver)
}

fn scalar(kind: AttributeType) -> ScalarAttributeType {
    match kind {
        AttributeType::String => ScalarAttributeType::S,
        AttributeType::Number => ScalarAttributeType::N,
        AttributeType::Binary => ScalarAttributeType::B,
    }
}

fn key_schema(hash: &KeySchema, range: Option<&KeySchema>) -> Result<Vec<KeySchemaElement>, StoreError> {
    let mut elements = vec![
        KeySchemaElement::builder()
            .attribute_name(&hash.name)
            .key_type(KeyType::Hash)
            .build()
            .map_err(driver)?,
    ];
    if let Some(range) = range {
        elements.push(
            KeySchemaElement::builder()
                .attribute_name(&range.name)
                .key_type(KeyType::Range)
                .build()
                .map_err(driver)?,
        );
    }
    Ok(elements)
}

/// Every attribute used by the primary key or an index, declared once.
fn attribute_definitions(definition: &TableDefinition) -> Result<Vec<AttributeDefinition>, StoreError> {
    let keys = std::iter::once(&definition.hash_key)
        .chain(definition.range_key.as_ref())
        .chain(definition.indexes.iter().flat_map(|i| std::iter::once(&i.hash_key).chain(i.range_key.as_ref())));

    let mut declared: Vec<AttributeDefinition> = Vec::new();
    for key in keys {
        if declared.iter().any(|d| d.attribute_name() == key.name) {
            continue;
        }
        declared.push(
            AttributeDefinition::builder()
                .attribute_name(&key.name)
                .attribute_type(scalar(key.kind))
                .build()
                .map_err(driver)?,
        );
    }
    Ok(declared)
}

fn driver(e: impl std::error::Error + Send + Sync + 'static) -> StoreError {
    StoreError::Driver(Box::new(e))
}

fn classify<E>(table: &str, err: SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err.code() {
        Some("ConditionalCheckFailedException") => StoreError::ConditionFailed,
        Some("ResourceNotFoundException") => StoreError::TableNotFound(table.to_owned()),
        _ => driver(err),
    }
}
