use serde_json::{Map, Value};

use super::transforms::{self, TransformError};
use crate::properties::PropertySet;

/// Property map fetched from the store, and the template context built from it.
pub type Context = Map<String, Value>;

/// Pure post-fetch step turning fetched properties into a template context.
pub type Transform = fn(Context) -> Result<Context, TransformError>;

#[derive(Debug)]
pub struct VisualizationDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub requires: &'static [&'static str],
    pub transform: Option<Transform>,
}

impl VisualizationDescriptor {
    pub fn is_available(&self, properties: &PropertySet) -> bool {
        properties.satisfies(self.requires)
    }
}

pub static VISUALIZATIONS: &[VisualizationDescriptor] = &[
    VisualizationDescriptor {
        key: "plain-text",
        label: "Plain text",
        requires: &["text"],
        transform: None,
    },
    VisualizationDescriptor {
        key: "word-cloud",
        label: "Word cloud",
        requires: &["freqdist", "language"],
        transform: None,
    },
    VisualizationDescriptor {
        key: "pos-highlighter",
        label: "Part-of-speech",
        requires: &["pos", "tokens"],
        transform: Some(transforms::pos_highlighter),
    },
    VisualizationDescriptor {
        key: "statistics",
        label: "Statistics",
        requires: &["freqdist", "sentences", "tokens"],
        transform: Some(transforms::statistics),
    },
];

pub fn lookup(key: &str) -> Option<&'static VisualizationDescriptor> {
    VISUALIZATIONS.iter().find(|v| v.key == key)
}

/// Visualizations whose requirements are all met, in registry order.
pub fn available_for(properties: &PropertySet) -> Vec<&'static VisualizationDescriptor> {
    VISUALIZATIONS
        .iter()
        .filter(|v| v.is_available(properties))
        .collect()
}
