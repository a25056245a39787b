use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use tokio::sync::RwLock;

use super::{Database, MAX_SLUG_ATTEMPTS};
use crate::models::document::{Corpus, Document, NewCorpus, NewDocument, slug_candidate};

/// In-process database for local development and tests.
#[derive(Default)]
pub struct MemoryDatabase {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    corpora: Vec<Corpus>,
    documents: Vec<Document>,
    /// (corpus_id, document_id)
    memberships: BTreeSet<(i64, i64)>,
    next_corpus_id: i64,
    next_document_id: i64,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn create_corpus(&self, corpus: &NewCorpus) -> anyhow::Result<Option<Corpus>> {
        let mut tables = self.inner.write().await;
        if tables
            .corpora
            .iter()
            .any(|c| c.owner == corpus.owner && c.slug == corpus.slug)
        {
            return Ok(None);
        }
        tables.next_corpus_id += 1;
        let now = Utc::now();
        let created = Corpus {
            id: tables.next_corpus_id,
            name: corpus.name.clone(),
            slug: corpus.slug.clone(),
            description: corpus.description.clone(),
            owner: corpus.owner.clone(),
            created_at: now,
            last_modified: now,
        };
        tables.corpora.push(created.clone());
        Ok(Some(created))
    }

    async fn list_corpora(&self, owner: &str) -> anyhow::Result<Vec<Corpus>> {
        let tables = self.inner.read().await;
        let mut corpora: Vec<Corpus> = tables
            .corpora
            .iter()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        corpora.sort_by(|a, b| b.last_modified.cmp(&a.last_modified).then(b.id.cmp(&a.id)));
        Ok(corpora)
    }

    async fn get_corpus(&self, owner: &str, slug: &str) -> anyhow::Result<Option<Corpus>> {
        let tables = self.inner.read().await;
        Ok(tables
            .corpora
            .iter()
            .find(|c| c.owner == owner && c.slug == slug)
            .cloned())
    }

    async fn create_document(&self, document: &NewDocument) -> anyhow::Result<Document> {
        let mut tables = self.inner.write().await;
        let slug = (1..=MAX_SLUG_ATTEMPTS)
            .map(|n| slug_candidate(&document.slug, n))
            .find(|candidate| {
                !tables
                    .documents
                    .iter()
                    .any(|d| d.owner == document.owner && &d.slug == candidate)
            })
            .ok_or_else(|| anyhow::anyhow!("no free slug for {}", document.slug))?;

        tables.next_document_id += 1;
        let created = Document {
            id: tables.next_document_id,
            slug,
            owner: document.owner.clone(),
            blob: document.blob.clone(),
            created_at: Utc::now(),
        };
        tables.documents.push(created.clone());
        Ok(created)
    }

    async fn get_document(&self, owner: &str, slug: &str) -> anyhow::Result<Option<Document>> {
        let tables = self.inner.read().await;
        Ok(tables
            .documents
            .iter()
            .find(|d| d.owner == owner && d.slug == slug)
            .cloned())
    }

    async fn list_documents(&self, owner: &str) -> anyhow::Result<Vec<Document>> {
        let tables = self.inner.read().await;
        Ok(tables
            .documents
            .iter()
            .rev()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect())
    }

    async fn add_document_to_corpus(
        &self,
        corpus_id: i64,
        document_id: i64,
    ) -> anyhow::Result<()> {
        let mut tables = self.inner.write().await;
        tables.memberships.insert((corpus_id, document_id));

        let linked: Vec<i64> = tables
            .memberships
            .iter()
            .filter(|(_, d)| *d == document_id)
            .map(|(c, _)| *c)
            .collect();
        let now = Utc::now();
        for corpus in tables.corpora.iter_mut().filter(|c| linked.contains(&c.id)) {
            corpus.last_modified = now;
        }
        Ok(())
    }

    async fn list_corpus_documents(&self, corpus_id: i64) -> anyhow::Result<Vec<Document>> {
        let tables = self.inner.read().await;
        Ok(tables
            .documents
            .iter()
            .rev()
            .filter(|d| tables.memberships.contains(&(corpus_id, d.id)))
            .cloned()
            .collect())
    }

    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
