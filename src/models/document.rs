use chrono::{DateTime, Utc};
use serde::Serialize;

/// Reference to an uploaded file held by the blob storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobRef {
    /// Opaque id handed to the pipeline as `_id`.
    pub blob_id: String,
    /// Storage key, `{owner}/{blob_id}/{filename}`.
    pub key: String,
    pub filename: String,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: i64,
    pub slug: String,
    pub owner: String,
    pub blob: BlobRef,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner: String,
    /// Preferred slug; the database appends a counter when it is taken.
    pub slug: String,
    pub blob: BlobRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Corpus {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCorpus {
    pub owner: String,
    pub name: String,
    pub slug: String,
    pub description: String,
}

/// Slug for corpus names: lowercase ASCII alphanumerics joined by hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    slug
}

/// Slug for uploaded files. Keeps the extension so `Document.txt` stays
/// recognisable as `document.txt`.
pub fn document_slug(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let mut slug = String::with_capacity(base.len());
    for c in base.trim().chars() {
        match c {
            c if c.is_ascii_alphanumeric() => slug.push(c.to_ascii_lowercase()),
            '.' | '-' | '_' => slug.push(c),
            c if c.is_whitespace() => slug.push('-'),
            _ => {}
        }
    }
    let slug = slug.trim_matches(['.', '-']).to_string();
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug
    }
}

/// The `n`-th candidate for a slug that is already taken by the same owner.
/// `n <= 1` returns the slug unchanged; `report.txt` becomes `report-2.txt`.
pub fn slug_candidate(slug: &str, n: u32) -> String {
    if n <= 1 {
        return slug.to_string();
    }
    match slug.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{n}.{ext}"),
        _ => format!("{slug}-{n}"),
    }
}
