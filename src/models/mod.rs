pub mod api;
pub mod document;
pub mod language;
