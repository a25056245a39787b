use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};

use super::{PropertyConnection, PropertyStore, PropertyStoreConfig, StoreError};

/// Property store kept in a PostgreSQL `key TEXT / value JSONB` table.
pub struct PostgresPropertyStore {
    pool: PgPool,
    table: String,
}

impl PostgresPropertyStore {
    pub async fn new(config: &PropertyStoreConfig) -> Result<Self, StoreError> {
        let uri = config
            .uri
            .as_deref()
            .ok_or_else(|| StoreError::Connection("no uri configured".to_string()))?;
        if !is_identifier(&config.table) {
            return Err(StoreError::Connection(format!(
                "invalid table name: {:?}",
                config.table
            )));
        }

        let clean_uri = uri.replace("postgresql+asyncpg://", "postgresql://");
        // Connections are opened per request, so none are kept warm.
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .min_connections(0)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&clean_uri)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(
            "Property store configured (table={}, pool_size={})",
            config.table, config.pool_size
        );
        Ok(Self {
            pool,
            table: config.table.clone(),
        })
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

struct PostgresConnection {
    conn: PoolConnection<Postgres>,
    select: String,
}

#[async_trait]
impl PropertyConnection for PostgresConnection {
    async fn fetch(&mut self, key: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query(&self.select)
            .bind(key)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        debug!(key, found = row.is_some(), "property lookup");
        Ok(row.map(|r| r.get::<Value, _>("value")))
    }
}

#[async_trait]
impl PropertyStore for PostgresPropertyStore {
    async fn open(&self) -> Result<Box<dyn PropertyConnection>, StoreError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Box::new(PostgresConnection {
            conn,
            select: format!("SELECT value FROM {} WHERE key = $1", self.table),
        }))
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                key TEXT PRIMARY KEY,
                value JSONB NOT NULL
            )",
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        info!("Property store table {} initialized", self.table);
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "postgres"
    }
}
