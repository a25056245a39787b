pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::document::{Corpus, Document, NewCorpus, NewDocument};

/// How many numbered variants of a slug are tried before giving up.
pub const MAX_SLUG_ATTEMPTS: u32 = 1000;

/// Abstract database interface for corpus and document records.
#[async_trait]
pub trait Database: Send + Sync {
    /// Create a corpus. Returns `None` when the owner already has one with
    /// the same slug.
    async fn create_corpus(&self, corpus: &NewCorpus) -> anyhow::Result<Option<Corpus>>;

    /// List an owner's corpora, most recently modified first.
    async fn list_corpora(&self, owner: &str) -> anyhow::Result<Vec<Corpus>>;

    /// Get a corpus by slug, scoped to its owner.
    async fn get_corpus(&self, owner: &str, slug: &str) -> anyhow::Result<Option<Corpus>>;

    /// Insert a document, picking the first free slug variant for the owner.
    async fn create_document(&self, document: &NewDocument) -> anyhow::Result<Document>;

    /// Get a document by slug, scoped to its owner.
    async fn get_document(&self, owner: &str, slug: &str) -> anyhow::Result<Option<Document>>;

    /// List an owner's documents, newest first.
    async fn list_documents(&self, owner: &str) -> anyhow::Result<Vec<Document>>;

    /// Link a document to a corpus and bump `last_modified` on every corpus
    /// the document belongs to.
    async fn add_document_to_corpus(&self, corpus_id: i64, document_id: i64)
    -> anyhow::Result<()>;

    /// Documents in a corpus, newest first.
    async fn list_corpus_documents(&self, corpus_id: i64) -> anyhow::Result<Vec<Document>>;

    /// Initialize database tables.
    async fn initialize(&self) -> anyhow::Result<()>;
}
