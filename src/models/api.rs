use serde::{Deserialize, Serialize};

// ──────────────────────────── Auth ────────────────────────────

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

// ──────────────────────────── Health ────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    pub version: String,
}

// ──────────────────────────── Forms ────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CorpusForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Field-keyed validation messages rendered inline next to a form.
#[derive(Debug, Default, Clone)]
pub struct FormErrors {
    pub errors: Vec<(String, String)>,
}

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push((field.to_string(), message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn for_field(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|(f, _)| f == field)
            .map(|(_, m)| m.as_str())
            .collect()
    }
}
