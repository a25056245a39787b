use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::require_login;
use crate::error::WebError;
use crate::models::api::{CorpusForm, FormErrors};
use crate::models::document::{
    BlobRef, Corpus, Document, NewCorpus, NewDocument, document_slug, slugify,
};
use crate::pipeline::PipelineMessage;
use crate::storage::blob_key;
use crate::templates::pages::{CorporaTemplate, CorpusTemplate};
use crate::templates::render;

const MAX_CORPUS_NAME_CHARS: usize = 100;
const UPLOAD_FIELD: &str = "blob";

/// Corpus listing, creation and upload routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/corpora", get(list_corpora).post(create_corpus))
        .route("/corpora/{corpus_slug}", get(corpus_page).post(upload_documents))
}

/// GET /corpora
async fn list_corpora(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, WebError> {
    let auth = require_login(&headers, &uri, &state.settings)?;
    let corpora = state.database.list_corpora(&auth.user_id).await?;
    Ok(render(CorporaTemplate {
        corpora,
        name: String::new(),
        description: String::new(),
        errors: Default::default(),
    }))
}

fn validate_corpus_form(form: &CorpusForm) -> FormErrors {
    let mut errors = FormErrors::default();
    let name = form.name.trim();
    if name.is_empty() {
        errors.add("name", "This field is required.");
    } else if name.chars().count() > MAX_CORPUS_NAME_CHARS {
        errors.add(
            "name",
            format!("Ensure this value has at most {MAX_CORPUS_NAME_CHARS} characters."),
        );
    } else if slugify(name).is_empty() {
        errors.add("name", "Enter a name containing letters or numbers.");
    }
    errors
}

/// POST /corpora
async fn create_corpus(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<CorpusForm>,
) -> Result<Response, WebError> {
    let auth = require_login(&headers, &uri, &state.settings)?;

    let mut errors = validate_corpus_form(&form);
    if errors.is_empty() {
        let name = form.name.trim();
        let new_corpus = NewCorpus {
            owner: auth.user_id.clone(),
            name: name.to_string(),
            slug: slugify(name),
            description: form.description.trim().to_string(),
        };
        match state.database.create_corpus(&new_corpus).await? {
            Some(corpus) => {
                info!(owner = %auth.user_id, corpus = %corpus.slug, "created corpus");
                return Ok(redirect(&format!("/corpora/{}", corpus.slug)));
            }
            None => errors.add("name", "You already have a corpus with this name."),
        }
    }

    let corpora = state.database.list_corpora(&auth.user_id).await?;
    Ok(render(CorporaTemplate {
        corpora,
        name: form.name,
        description: form.description,
        errors: (&errors).into(),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct CorpusPageParams {
    #[serde(default)]
    uploaded: usize,
}

async fn load_corpus(state: &AppState, owner: &str, slug: &str) -> Result<Corpus, WebError> {
    state
        .database
        .get_corpus(owner, slug)
        .await?
        .ok_or_else(|| WebError::not_found("Corpus not found"))
}

/// GET /corpora/{corpus_slug}
async fn corpus_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Path(corpus_slug): Path<String>,
    Query(params): Query<CorpusPageParams>,
) -> Result<Response, WebError> {
    let auth = require_login(&headers, &uri, &state.settings)?;
    let corpus = load_corpus(&state, &auth.user_id, &corpus_slug).await?;
    let documents = state.database.list_corpus_documents(corpus.id).await?;
    Ok(render(CorpusTemplate {
        corpus,
        documents,
        blob_errors: Vec::new(),
        uploaded: params.uploaded,
    }))
}

struct UploadedFile {
    filename: String,
    data: Bytes,
}

/// Collect the `blob` parts of an upload form. Parts without a filename and
/// content are what browsers send for an empty file input.
async fn read_upload_form(
    multipart: &mut Multipart,
) -> Result<(Vec<UploadedFile>, Vec<String>), WebError> {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::BadRequest(format!("Invalid upload form: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| WebError::BadRequest(format!("Invalid upload form: {e}")))?;

        match (filename.is_empty(), data.is_empty()) {
            (true, true) => {}
            (true, false) => {
                errors.push("No filename. Check the encoding type on the form.".to_string())
            }
            (false, true) => errors.push(format!("The submitted file \"{filename}\" is empty.")),
            (false, false) => files.push(UploadedFile { filename, data }),
        }
    }
    if files.is_empty() && errors.is_empty() {
        errors.push("This field is required.".to_string());
    }
    Ok((files, errors))
}

/// POST /corpora/{corpus_slug}
async fn upload_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Path(corpus_slug): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, WebError> {
    let auth = require_login(&headers, &uri, &state.settings)?;
    let corpus = load_corpus(&state, &auth.user_id, &corpus_slug).await?;

    let (files, blob_errors) = read_upload_form(&mut multipart).await?;
    if !blob_errors.is_empty() {
        warn!(corpus = %corpus.slug, "rejected upload: {}", blob_errors.join("; "));
        let documents = state.database.list_corpus_documents(corpus.id).await?;
        return Ok(render(CorpusTemplate {
            corpus,
            documents,
            blob_errors,
            uploaded: 0,
        }));
    }

    let mut stored: Vec<i64> = Vec::with_capacity(files.len());
    for file in &files {
        let document = match store_upload(&state, &auth.user_id, &corpus, file).await {
            Ok(document) => document,
            Err(e) => {
                error!(
                    corpus = %corpus.slug,
                    filename = %file.filename,
                    stored = ?stored,
                    skipped = files.len() - stored.len() - 1,
                    "upload aborted; stored documents stay linked and dispatched"
                );
                return Err(e);
            }
        };
        stored.push(document.id);
    }

    Ok(redirect(&format!(
        "/corpora/{}?uploaded={}",
        corpus.slug,
        files.len()
    )))
}

/// Write one file's blob, create its document, link it to the corpus and
/// hand it to the pipeline. Only fully linked documents are dispatched.
async fn store_upload(
    state: &AppState,
    owner: &str,
    corpus: &Corpus,
    file: &UploadedFile,
) -> Result<Document, WebError> {
    let blob_id = Uuid::new_v4().to_string();
    let key = blob_key(owner, &blob_id, &file.filename);
    state.storage.upload_bytes(&file.data, &key).await?;

    let document = state
        .database
        .create_document(&NewDocument {
            owner: owner.to_string(),
            slug: document_slug(&file.filename),
            blob: BlobRef {
                blob_id: blob_id.clone(),
                key: key.clone(),
                filename: file.filename.clone(),
                size: file.data.len() as i64,
            },
        })
        .await
        .inspect_err(|e| error!(blob = %key, "blob stored without a document: {e}"))?;

    state
        .database
        .add_document_to_corpus(corpus.id, document.id)
        .await
        .inspect_err(|e| {
            error!(
                document_id = document.id,
                corpus = %corpus.slug,
                "document created but not linked to corpus: {e}"
            )
        })?;
    info!(
        document_id = document.id,
        document = %document.slug,
        corpus = %corpus.slug,
        size = file.data.len(),
        "stored upload"
    );

    state.dispatcher.dispatch(PipelineMessage {
        blob_id,
        id: document.id,
    });
    Ok(document)
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::database::Database;
    use crate::database::memory::MemoryDatabase;
    use crate::models::document::{Corpus, Document, NewCorpus, NewDocument};
    use crate::routes::testing::{TestApp, body_string, get_as, session_cookie};
    use crate::storage::Storage;

    const BOUNDARY: &str = "plnweb-test-boundary";

    fn form_post(user: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, session_cookie(user))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_post(user: &str, uri: &str, files: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (filename, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"blob\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, session_cookie(user))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn seed_corpus(app: &TestApp, owner: &str, name: &str) {
        app.database
            .create_corpus(&NewCorpus {
                owner: owner.to_string(),
                name: name.to_string(),
                slug: crate::models::document::slugify(name),
                description: String::new(),
            })
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_corpora_requires_login() {
        let app = TestApp::new();
        let response = app
            .router
            .oneshot(Request::builder().uri("/corpora").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/accounts/login/?next=%2Fcorpora"
        );
    }

    #[tokio::test]
    async fn test_create_corpus_redirects() {
        let app = TestApp::new();
        let response = app
            .router
            .clone()
            .oneshot(form_post("alice", "/corpora", "name=My+Corpus&description=News"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/corpora/my-corpus");

        let corpora = app.database.list_corpora("alice").await.unwrap();
        assert_eq!(corpora.len(), 1);
        assert_eq!(corpora[0].description, "News");
    }

    #[tokio::test]
    async fn test_create_corpus_empty_name_rerenders() {
        let app = TestApp::new();
        let response = app
            .router
            .clone()
            .oneshot(form_post("alice", "/corpora", "name=&description=kept"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("This field is required."));
        assert!(body.contains("kept"));
        assert!(app.database.list_corpora("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_duplicate_corpus_rerenders() {
        let app = TestApp::new();
        seed_corpus(&app, "alice", "News").await;
        let response = app
            .router
            .oneshot(form_post("alice", "/corpora", "name=news"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("already have a corpus"));
    }

    #[tokio::test]
    async fn test_other_owner_corpus_not_found() {
        let app = TestApp::new();
        seed_corpus(&app, "bob", "News").await;
        let response = app
            .router
            .oneshot(get_as("alice", "/corpora/news"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_without_file_rerenders() {
        let app = TestApp::new();
        seed_corpus(&app, "alice", "News").await;
        let response = app
            .router
            .clone()
            .oneshot(multipart_post("alice", "/corpora/news", &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("This field is required."));
        assert!(app.dispatcher.sent().is_empty());
        assert!(app.database.list_documents("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_empty_file_rerenders() {
        let app = TestApp::new();
        seed_corpus(&app, "alice", "News").await;
        let response = app
            .router
            .clone()
            .oneshot(multipart_post("alice", "/corpora/news", &[("empty.txt", "")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("is empty"));
        assert!(app.dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_upload_creates_documents_and_dispatches() {
        let app = TestApp::new();
        seed_corpus(&app, "alice", "News").await;
        let response = app
            .router
            .clone()
            .oneshot(multipart_post(
                "alice",
                "/corpora/news",
                &[("document.txt", "This is a text."), ("document.txt", "Another one.")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/corpora/news?uploaded=2"
        );

        let corpus = app.database.get_corpus("alice", "news").await.unwrap().unwrap();
        let mut documents = app.database.list_corpus_documents(corpus.id).await.unwrap();
        documents.sort_by_key(|d| d.id);
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].slug, "document.txt");
        assert_eq!(documents[1].slug, "document-2.txt");
        assert_ne!(documents[0].blob.blob_id, documents[1].blob.blob_id);

        let stored = app.storage.download_file(&documents[0].blob.key).await.unwrap();
        assert_eq!(stored, b"This is a text.");

        let sent = app.dispatcher.sent();
        assert_eq!(sent.len(), 2);
        for (message, document) in sent.iter().zip(&documents) {
            assert_eq!(message.id, document.id);
            assert_eq!(message.blob_id, document.blob.blob_id);
        }

        let page = app
            .router
            .oneshot(get_as("alice", "/corpora/news?uploaded=2"))
            .await
            .unwrap();
        let body = body_string(page).await;
        assert!(body.contains("2 documents uploaded successfully!"));
        assert!(body.contains("/documents/document-2.txt"));
    }

    /// Memory database whose corpus links fail after `links_allowed` successes.
    struct FlakyLinks {
        inner: Arc<MemoryDatabase>,
        links_allowed: AtomicUsize,
    }

    #[async_trait]
    impl Database for FlakyLinks {
        async fn create_corpus(&self, corpus: &NewCorpus) -> anyhow::Result<Option<Corpus>> {
            self.inner.create_corpus(corpus).await
        }
        async fn list_corpora(&self, owner: &str) -> anyhow::Result<Vec<Corpus>> {
            self.inner.list_corpora(owner).await
        }
        async fn get_corpus(&self, owner: &str, slug: &str) -> anyhow::Result<Option<Corpus>> {
            self.inner.get_corpus(owner, slug).await
        }
        async fn create_document(&self, document: &NewDocument) -> anyhow::Result<Document> {
            self.inner.create_document(document).await
        }
        async fn get_document(&self, owner: &str, slug: &str) -> anyhow::Result<Option<Document>> {
            self.inner.get_document(owner, slug).await
        }
        async fn list_documents(&self, owner: &str) -> anyhow::Result<Vec<Document>> {
            self.inner.list_documents(owner).await
        }
        async fn add_document_to_corpus(
            &self,
            corpus_id: i64,
            document_id: i64,
        ) -> anyhow::Result<()> {
            let allowed = self
                .links_allowed
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if allowed.is_err() {
                anyhow::bail!("connection reset");
            }
            self.inner.add_document_to_corpus(corpus_id, document_id).await
        }
        async fn list_corpus_documents(&self, corpus_id: i64) -> anyhow::Result<Vec<Document>> {
            self.inner.list_corpus_documents(corpus_id).await
        }
        async fn initialize(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_link_dispatches_only_linked_documents() {
        let app = TestApp::with_database(|inner| {
            Arc::new(FlakyLinks {
                inner,
                links_allowed: AtomicUsize::new(1),
            }) as Arc<dyn Database>
        });
        seed_corpus(&app, "alice", "News").await;

        let response = app
            .router
            .clone()
            .oneshot(multipart_post(
                "alice",
                "/corpora/news",
                &[("first.txt", "one"), ("second.txt", "two"), ("third.txt", "three")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let corpus = app.database.get_corpus("alice", "news").await.unwrap().unwrap();
        let linked = app.database.list_corpus_documents(corpus.id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].slug, "first.txt");

        let sent = app.dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, linked[0].id);

        // The second document exists but was neither linked nor dispatched;
        // the third was never attempted.
        let documents = app.database.list_documents("alice").await.unwrap();
        assert_eq!(documents.len(), 2);
        assert!(documents.iter().all(|d| d.slug != "third.txt"));
    }
}
