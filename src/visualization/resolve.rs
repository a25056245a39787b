use thiserror::Error;

use super::registry::{self, Context, VisualizationDescriptor};
use super::transforms::TransformError;
use crate::database::Database;
use crate::models::document::Document;
use crate::properties::{PropertyGateway, PropertyStore, StoreError};
use crate::templates::RenderError;
use crate::templates::visualization::VisualizationTemplate;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Missing document, properties, visualization or format. The message is
    /// deliberately coarse: "not ready" and "no such visualization" look the
    /// same to the client.
    #[error("{0}")]
    NotFound(&'static str),
    #[error("property store: {0}")]
    Store(#[from] StoreError),
    #[error("transform: {0}")]
    Transform(#[from] TransformError),
    #[error("render: {0}")]
    Render(#[from] RenderError),
    #[error("database: {0}")]
    Database(anyhow::Error),
}

pub struct VisualizationRequest<'a> {
    pub owner: &'a str,
    pub document_slug: &'a str,
    pub key: &'a str,
    pub format: &'a str,
}

/// Split a `{visualization_key}.{format}` path segment.
pub fn parse_visualization_file(file: &str) -> Option<(&str, &str)> {
    let (key, format) = file.rsplit_once('.')?;
    let valid_format = !format.is_empty()
        && format
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if key.is_empty() || !valid_format {
        return None;
    }
    Some((key, format))
}

#[derive(Debug)]
pub struct Rendered {
    pub body: String,
    pub format: String,
    pub template: &'static str,
    pub document: Document,
    pub visualization: &'static str,
}

impl Rendered {
    pub fn is_html(&self) -> bool {
        self.format == "html"
    }

    pub fn content_type(&self) -> String {
        if self.is_html() {
            "text/html; charset=utf-8".to_string()
        } else {
            format!("text/{}; charset=utf-8", self.format)
        }
    }

    /// Attachment header forcing a download for non-HTML formats.
    pub fn content_disposition(&self) -> Option<String> {
        (!self.is_html()).then(|| {
            format!(
                "attachment; filename=\"{}-{}.{}\"",
                self.document.slug, self.visualization, self.format
            )
        })
    }
}

/// Check availability and build the template context for one visualization.
pub async fn resolve_context(
    gateway: &mut PropertyGateway,
    document: &Document,
    key: &str,
) -> Result<(&'static VisualizationDescriptor, Context), ResolveError> {
    let properties = gateway
        .get_properties(document.id)
        .await?
        .ok_or(ResolveError::NotFound("Visualization not found"))?;

    let descriptor = registry::lookup(key)
        .filter(|v| v.is_available(&properties))
        .ok_or(ResolveError::NotFound("Visualization not found"))?;

    let mut context = Context::new();
    for property in descriptor.requires {
        let value = gateway.get(document.id, property).await?;
        context.insert((*property).to_string(), value);
    }

    let context = match descriptor.transform {
        Some(transform) => transform(context)?,
        None => context,
    };
    Ok((descriptor, context))
}

/// Resolve and render one visualization of an owner's document.
pub async fn resolve(
    db: &dyn Database,
    store: &dyn PropertyStore,
    request: &VisualizationRequest<'_>,
) -> Result<Rendered, ResolveError> {
    let document = db
        .get_document(request.owner, request.document_slug)
        .await
        .map_err(ResolveError::Database)?
        .ok_or(ResolveError::NotFound("Document not found"))?;

    let (descriptor, context) = {
        let mut gateway = PropertyGateway::open(store).await?;
        resolve_context(&mut gateway, &document, request.key).await?
    };

    let template = VisualizationTemplate::lookup(descriptor.key, request.format).ok_or(
        ResolveError::NotFound("Visualization is not available in this format."),
    )?;

    let body = template.render(&context, &document)?;

    Ok(Rendered {
        body,
        format: request.format.to_string(),
        template: template.name(),
        document,
        visualization: descriptor.key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryDatabase;
    use crate::models::document::{BlobRef, NewDocument};
    use crate::properties::memory::MemoryPropertyStore;
    use crate::properties::{PROPERTIES_KEY, property_key};
    use serde_json::{Value, json};

    async fn seed_document(db: &MemoryDatabase, owner: &str, filename: &str) -> Document {
        db.create_document(&NewDocument {
            owner: owner.to_string(),
            slug: filename.to_string(),
            blob: BlobRef {
                blob_id: format!("blob-{filename}"),
                key: format!("{owner}/blob/{filename}"),
                filename: filename.to_string(),
                size: 19,
            },
        })
        .await
        .unwrap()
    }

    async fn seed_word_cloud(store: &MemoryPropertyStore, id: i64, words: Value) {
        store.put(property_key(id, "freqdist"), words).await;
        store.put(property_key(id, "language"), json!("en")).await;
        store
            .put(property_key(id, PROPERTIES_KEY), json!(["freqdist", "language"]))
            .await;
    }

    fn request<'a>(slug: &'a str, key: &'a str, format: &'a str) -> VisualizationRequest<'a> {
        VisualizationRequest {
            owner: "admin",
            document_slug: slug,
            key,
            format,
        }
    }

    #[test]
    fn test_parse_visualization_file() {
        assert_eq!(parse_visualization_file("word-cloud.csv"), Some(("word-cloud", "csv")));
        assert_eq!(parse_visualization_file("word-cloud.html"), Some(("word-cloud", "html")));
        assert_eq!(parse_visualization_file("word-cloud"), None);
        assert_eq!(parse_visualization_file(".csv"), None);
        assert_eq!(parse_visualization_file("word-cloud."), None);
        assert_eq!(parse_visualization_file("word-cloud.c/sv"), None);
        assert_eq!(parse_visualization_file("word-cloud.CSV"), None);
    }

    #[tokio::test]
    async fn test_word_cloud_csv_headers() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let doc = seed_document(&db, "admin", "document.txt").await;
        seed_word_cloud(&store, doc.id, json!([["this", 1]])).await;

        let rendered = resolve(&db, &store, &request("document.txt", "word-cloud", "csv"))
            .await
            .unwrap();
        assert_eq!(rendered.template, "visualizations/word-cloud.csv");
        assert_eq!(rendered.content_type(), "text/csv; charset=utf-8");
        assert_eq!(
            rendered.content_disposition().as_deref(),
            Some("attachment; filename=\"document.txt-word-cloud.csv\"")
        );
        assert!(rendered.body.contains("this,1"));
        assert_eq!(store.connections_opened(), 1);
    }

    #[tokio::test]
    async fn test_html_has_no_attachment() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let doc = seed_document(&db, "admin", "document.txt").await;
        seed_word_cloud(&store, doc.id, json!([["this", 1]])).await;

        let rendered = resolve(&db, &store, &request("document.txt", "word-cloud", "html"))
            .await
            .unwrap();
        assert!(rendered.is_html());
        assert_eq!(rendered.content_disposition(), None);
        assert!(!rendered.body.contains("{{"));
        assert!(!rendered.body.contains("{%"));
    }

    #[tokio::test]
    async fn test_missing_marker_is_not_found() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let doc = seed_document(&db, "admin", "document.txt").await;
        store.put(property_key(doc.id, "freqdist"), json!([["a", 1]])).await;
        store.put(property_key(doc.id, "language"), json!("en")).await;

        for format in ["html", "csv"] {
            let result = resolve(&db, &store, &request("document.txt", "word-cloud", format)).await;
            assert!(matches!(result, Err(ResolveError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_unmet_requirements_and_unknown_key_are_not_found() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let doc = seed_document(&db, "admin", "document.txt").await;
        seed_word_cloud(&store, doc.id, json!([["this", 1]])).await;

        for (key, format) in [
            ("pos-highlighter", "html"),
            ("pos-highlighter", "csv"),
            ("statistics", "csv"),
            ("no-such-thing", "html"),
        ] {
            let result = resolve(&db, &store, &request("document.txt", key, format)).await;
            assert!(matches!(result, Err(ResolveError::NotFound(_))), "{key}.{format}");
        }
    }

    #[tokio::test]
    async fn test_unsupported_format_is_not_found() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let doc = seed_document(&db, "admin", "document.txt").await;
        seed_word_cloud(&store, doc.id, json!([["this", 1]])).await;

        let result = resolve(&db, &store, &request("document.txt", "word-cloud", "pdf")).await;
        assert!(matches!(result, Err(ResolveError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_document_of_other_owner_is_not_found() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let doc = seed_document(&db, "someone-else", "document.txt").await;
        seed_word_cloud(&store, doc.id, json!([["this", 1]])).await;

        let result = resolve(&db, &store, &request("document.txt", "word-cloud", "csv")).await;
        assert!(matches!(result, Err(ResolveError::NotFound("Document not found"))));
        assert_eq!(store.connections_opened(), 0);
    }

    #[tokio::test]
    async fn test_marker_lists_property_the_store_lacks() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let doc = seed_document(&db, "admin", "document.txt").await;
        store.put(property_key(doc.id, "language"), json!("en")).await;
        store
            .put(property_key(doc.id, PROPERTIES_KEY), json!(["freqdist", "language"]))
            .await;

        let result = resolve(&db, &store, &request("document.txt", "word-cloud", "csv")).await;
        assert!(matches!(result, Err(ResolveError::Store(StoreError::MissingKey(_)))));
    }

    #[tokio::test]
    async fn test_same_filename_documents_resolve_independently() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let first = seed_document(&db, "admin", "document.txt").await;
        let second = seed_document(&db, "admin", "document.txt").await;
        seed_word_cloud(&store, first.id, json!([["first", 1]])).await;
        seed_word_cloud(&store, second.id, json!([["second", 2]])).await;

        let a = resolve(&db, &store, &request(&first.slug, "word-cloud", "csv"))
            .await
            .unwrap();
        let b = resolve(&db, &store, &request(&second.slug, "word-cloud", "csv"))
            .await
            .unwrap();

        assert_eq!(a.document, first);
        assert_eq!(b.document, second);
        assert!(a.body.contains("first,1") && !a.body.contains("second"));
        assert!(b.body.contains("second,2") && !b.body.contains("first"));
        assert_eq!(
            b.content_disposition().as_deref(),
            Some("attachment; filename=\"document-2.txt-word-cloud.csv\"")
        );
    }

    #[tokio::test]
    async fn test_transform_runs_before_render() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let doc = seed_document(&db, "admin", "document.txt").await;
        store
            .put(property_key(doc.id, "pos"), json!([["Dogs", "NNS", 0], ["bark", "VBP", 5]]))
            .await;
        store.put(property_key(doc.id, "tokens"), json!(["Dogs", "bark"])).await;
        store
            .put(property_key(doc.id, PROPERTIES_KEY), json!(["pos", "tokens"]))
            .await;

        let rendered = resolve(&db, &store, &request("document.txt", "pos-highlighter", "csv"))
            .await
            .unwrap();
        assert_eq!(
            rendered.body.trim_end(),
            "token,tag,category\nDogs,NNS,noun\nbark,VBP,verb"
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_is_transform_error() {
        let db = MemoryDatabase::new();
        let store = MemoryPropertyStore::new();
        let doc = seed_document(&db, "admin", "document.txt").await;
        store.put(property_key(doc.id, "pos"), json!("not a list")).await;
        store.put(property_key(doc.id, "tokens"), json!([])).await;
        store
            .put(property_key(doc.id, PROPERTIES_KEY), json!(["pos", "tokens"]))
            .await;

        let result = resolve(&db, &store, &request("document.txt", "pos-highlighter", "html")).await;
        assert!(matches!(result, Err(ResolveError::Transform(_))));
    }
}
