//! Per-document key-value store populated by the analysis pipeline.
//!
//! Keys are namespaced by document id: `id:{document_id}:{property}`. The
//! pipeline writes `id:{document_id}:_properties` once it has finished (or
//! partially finished) a document; that entry lists every property name
//! currently available for it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Name of the reserved completion marker property.
pub const PROPERTIES_KEY: &str = "_properties";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found in property store: {0}")]
    MissingKey(String),
    #[error("invalid property name: {0:?}")]
    InvalidName(String),
    #[error("malformed property list at {key}: {reason}")]
    MalformedProperties { key: String, reason: String },
    #[error("property store connection error: {0}")]
    Connection(String),
    #[error("property store query error: {0}")]
    Query(String),
}

/// Connection parameters for a property store backend.
#[derive(Debug, Clone)]
pub struct PropertyStoreConfig {
    pub uri: Option<String>,
    pub table: String,
    pub pool_size: u32,
    pub acquire_timeout: Duration,
}

/// A property name as written by the pipeline. Non-empty and free of `:`,
/// so it cannot address another document's namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyName(String);

impl PropertyName {
    pub fn new(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        if name.is_empty() || name.contains(':') {
            return Err(StoreError::InvalidName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of properties the pipeline reports as available for a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet(BTreeSet<PropertyName>);

impl PropertySet {
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.as_str() == name)
    }

    /// True when every name in `required` is present.
    pub fn satisfies(&self, required: &[&str]) -> bool {
        required.iter().all(|name| self.contains(name))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parse the `_properties` payload: a JSON array of strings. Names that
    /// cannot be addressed as a key of this document are skipped.
    fn from_value(key: &str, value: Value) -> Result<Self, StoreError> {
        let malformed = |reason: &str| StoreError::MalformedProperties {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        let Value::Array(items) = value else {
            return Err(malformed("expected an array of property names"));
        };
        let mut set = BTreeSet::new();
        for item in items {
            let Value::String(name) = item else {
                return Err(malformed("property names must be strings"));
            };
            match PropertyName::new(name) {
                Ok(name) => {
                    set.insert(name);
                }
                Err(e) => warn!(key, "skipping property: {e}"),
            }
        }
        Ok(Self(set))
    }
}

impl FromIterator<PropertyName> for PropertySet {
    fn from_iter<T: IntoIterator<Item = PropertyName>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Store key for one property of one document.
pub fn property_key(document_id: i64, property: &str) -> String {
    format!("id:{document_id}:{property}")
}

/// Backend able to hand out short-lived read connections.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Open a connection for the duration of one request.
    async fn open(&self) -> Result<Box<dyn PropertyConnection>, StoreError>;

    /// Create backing tables, if any.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Return the provider name for logs.
    fn provider_name(&self) -> &str;
}

/// One open connection performing point lookups.
#[async_trait]
pub trait PropertyConnection: Send {
    /// Fetch a raw value by its full key. `None` when the key is absent.
    async fn fetch(&mut self, key: &str) -> Result<Option<Value>, StoreError>;
}

/// Document-scoped lookups over a single open connection.
pub struct PropertyGateway {
    conn: Box<dyn PropertyConnection>,
}

impl PropertyGateway {
    pub async fn open(store: &dyn PropertyStore) -> Result<Self, StoreError> {
        Ok(Self {
            conn: store.open().await?,
        })
    }

    /// Properties available for a document, or `None` when the pipeline has
    /// not written the completion marker yet. An empty set is a valid,
    /// distinct answer.
    pub async fn get_properties(
        &mut self,
        document_id: i64,
    ) -> Result<Option<PropertySet>, StoreError> {
        let key = property_key(document_id, PROPERTIES_KEY);
        match self.conn.fetch(&key).await? {
            Some(value) => PropertySet::from_value(&key, value).map(Some),
            None => Ok(None),
        }
    }

    /// Fetch a property already confirmed present. A missing key is an error.
    pub async fn get(&mut self, document_id: i64, property: &str) -> Result<Value, StoreError> {
        self.get_optional(document_id, property)
            .await?
            .ok_or_else(|| StoreError::MissingKey(property_key(document_id, property)))
    }

    pub async fn get_optional(
        &mut self,
        document_id: i64,
        property: &str,
    ) -> Result<Option<Value>, StoreError> {
        let name = PropertyName::new(property)?;
        self.conn
            .fetch(&property_key(document_id, name.as_str()))
            .await
    }
}
