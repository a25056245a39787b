//! Page templates for the corpus and document screens.

use askama::Template;

use crate::models::api::FormErrors;
use crate::models::document::{Corpus, Document};

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate;

/// Inline messages for the corpus creation form.
#[derive(Default)]
pub struct CorpusFormErrors {
    pub general: Vec<String>,
    pub name: Vec<String>,
    pub description: Vec<String>,
}

impl From<&FormErrors> for CorpusFormErrors {
    fn from(errors: &FormErrors) -> Self {
        let collect = |field: &str| -> Vec<String> {
            errors
                .for_field(field)
                .into_iter()
                .map(str::to_string)
                .collect()
        };
        Self {
            general: collect("__all__"),
            name: collect("name"),
            description: collect("description"),
        }
    }
}

#[derive(Template)]
#[template(path = "corpora.html")]
pub struct CorporaTemplate {
    pub corpora: Vec<Corpus>,
    pub name: String,
    pub description: String,
    pub errors: CorpusFormErrors,
}

#[derive(Template)]
#[template(path = "corpus.html")]
pub struct CorpusTemplate {
    pub corpus: Corpus,
    pub documents: Vec<Document>,
    pub blob_errors: Vec<String>,
    pub uploaded: usize,
}

#[derive(Template)]
#[template(path = "documents.html")]
pub struct DocumentsTemplate {
    pub documents: Vec<Document>,
}

pub struct MetadataEntry {
    pub name: String,
    pub value: String,
}

pub struct VisualizationLink {
    pub key: &'static str,
    pub label: &'static str,
    /// Non-HTML formats offered as downloads.
    pub downloads: Vec<&'static str>,
}

#[derive(Template)]
#[template(path = "document.html")]
pub struct DocumentTemplate {
    pub document: Document,
    pub corpora: Vec<Corpus>,
    pub metadata: Vec<MetadataEntry>,
    pub visualizations: Vec<VisualizationLink>,
}
