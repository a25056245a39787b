pub mod broadcast;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Message announcing a freshly uploaded document to the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMessage {
    /// Blob storage id of the uploaded file.
    #[serde(rename = "_id")]
    pub blob_id: String,
    /// Document id; the pipeline writes results under `id:{id}:*`.
    pub id: i64,
}

/// Fire-and-forget publisher. Implementations must not block the caller
/// waiting for the pipeline.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, message: PipelineMessage);
}

/// Used when no pipeline is configured.
pub struct DisabledDispatcher;

impl Dispatcher for DisabledDispatcher {
    fn dispatch(&self, message: PipelineMessage) {
        debug!(document_id = message.id, "pipeline disabled, not dispatching");
    }
}
