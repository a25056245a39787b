use std::time::Duration;
use tracing::{info, warn};

use super::{Dispatcher, PipelineMessage};

/// Publishes upload messages as JSON to the pipeline router's broadcast
/// endpoint. Each publish runs on its own task; the upload request never
/// waits for it.
pub struct BroadcastDispatcher {
    url: String,
    http_client: reqwest::Client,
}

impl BroadcastDispatcher {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn publish(
        client: reqwest::Client,
        url: String,
        message: PipelineMessage,
    ) -> anyhow::Result<()> {
        let resp = client.post(&url).json(&message).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Pipeline broadcast error ({status}): {body}");
        }
        Ok(())
    }
}

impl Dispatcher for BroadcastDispatcher {
    fn dispatch(&self, message: PipelineMessage) {
        let client = self.http_client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            let document_id = message.id;
            match Self::publish(client, url, message).await {
                Ok(()) => info!(document_id, "dispatched document to pipeline"),
                Err(e) => warn!(document_id, "pipeline dispatch failed: {e}"),
            }
        });
    }
}
