use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use super::{Database, MAX_SLUG_ATTEMPTS};
use crate::models::document::{BlobRef, Corpus, Document, NewCorpus, NewDocument, slug_candidate};

/// PostgreSQL database for corpus and document records.
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub async fn new(uri: &str, pool_size: u32) -> anyhow::Result<Self> {
        let clean_uri = uri.replace("postgresql+asyncpg://", "postgresql://");
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(&clean_uri)
            .await?;

        info!("Connected to PostgreSQL (pool_size={pool_size})");
        Ok(Self { pool })
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, slug, owner, blob_id, blob_key, filename, size, created_at";
const CORPUS_COLUMNS: &str =
    "id, name, slug, description, owner, created_at, last_modified";

fn document_from_row(r: &PgRow) -> Document {
    Document {
        id: r.get("id"),
        slug: r.get("slug"),
        owner: r.get("owner"),
        blob: BlobRef {
            blob_id: r.get("blob_id"),
            key: r.get("blob_key"),
            filename: r.get("filename"),
            size: r.get("size"),
        },
        created_at: r.get("created_at"),
    }
}

fn corpus_from_row(r: &PgRow) -> Corpus {
    Corpus {
        id: r.get("id"),
        name: r.get("name"),
        slug: r.get("slug"),
        description: r.get("description"),
        owner: r.get("owner"),
        created_at: r.get("created_at"),
        last_modified: r.get("last_modified"),
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS corpora (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                slug VARCHAR(255) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                owner VARCHAR(255) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
                last_modified TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (owner, slug)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id BIGSERIAL PRIMARY KEY,
                slug VARCHAR(1024) NOT NULL,
                owner VARCHAR(255) NOT NULL,
                blob_id VARCHAR(255) NOT NULL,
                blob_key VARCHAR(2048) NOT NULL,
                filename VARCHAR(1024) NOT NULL,
                size BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (owner, slug)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS corpus_documents (
                corpus_id BIGINT NOT NULL REFERENCES corpora(id) ON DELETE CASCADE,
                document_id BIGINT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                PRIMARY KEY (corpus_id, document_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner)")
            .execute(&self.pool)
            .await?;

        info!("Database tables initialized");
        Ok(())
    }

    async fn create_corpus(&self, corpus: &NewCorpus) -> anyhow::Result<Option<Corpus>> {
        let row = sqlx::query(&format!(
            "INSERT INTO corpora (name, slug, description, owner)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (owner, slug) DO NOTHING
             RETURNING {CORPUS_COLUMNS}"
        ))
        .bind(&corpus.name)
        .bind(&corpus.slug)
        .bind(&corpus.description)
        .bind(&corpus.owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(corpus_from_row))
    }

    async fn list_corpora(&self, owner: &str) -> anyhow::Result<Vec<Corpus>> {
        let rows = sqlx::query(&format!(
            "SELECT {CORPUS_COLUMNS} FROM corpora
             WHERE owner = $1
             ORDER BY last_modified DESC, id DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(corpus_from_row).collect())
    }

    async fn get_corpus(&self, owner: &str, slug: &str) -> anyhow::Result<Option<Corpus>> {
        let row = sqlx::query(&format!(
            "SELECT {CORPUS_COLUMNS} FROM corpora WHERE owner = $1 AND slug = $2"
        ))
        .bind(owner)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(corpus_from_row))
    }

    async fn create_document(&self, document: &NewDocument) -> anyhow::Result<Document> {
        let insert = format!(
            "INSERT INTO documents (slug, owner, blob_id, blob_key, filename, size)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (owner, slug) DO NOTHING
             RETURNING {DOCUMENT_COLUMNS}"
        );
        for n in 1..=MAX_SLUG_ATTEMPTS {
            let slug = slug_candidate(&document.slug, n);
            let row = sqlx::query(&insert)
                .bind(&slug)
                .bind(&document.owner)
                .bind(&document.blob.blob_id)
                .bind(&document.blob.key)
                .bind(&document.blob.filename)
                .bind(document.blob.size)
                .fetch_optional(&self.pool)
                .await?;

            match row {
                Some(r) => return Ok(document_from_row(&r)),
                None => debug!("document slug {slug} taken, trying next"),
            }
        }
        anyhow::bail!("no free slug for {}", document.slug)
    }

    async fn get_document(&self, owner: &str, slug: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner = $1 AND slug = $2"
        ))
        .bind(owner)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(document_from_row))
    }

    async fn list_documents(&self, owner: &str) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE owner = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn add_document_to_corpus(
        &self,
        corpus_id: i64,
        document_id: i64,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO corpus_documents (corpus_id, document_id)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(corpus_id)
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE corpora SET last_modified = CURRENT_TIMESTAMP
             WHERE id IN (SELECT corpus_id FROM corpus_documents WHERE document_id = $1)",
        )
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_corpus_documents(&self, corpus_id: i64) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT d.id, d.slug, d.owner, d.blob_id, d.blob_key, d.filename, d.size, d.created_at
             FROM documents d
             JOIN corpus_documents cd ON cd.document_id = d.id
             WHERE cd.corpus_id = $1
             ORDER BY d.created_at DESC, d.id DESC",
        )
        .bind(corpus_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }
}
