//! Push worker

use super::config::PipelineConfig;
use super::stats::PushTally;
use super::{SharedReceiver, next_item, with_retries};
use crate::common::RegistryClient;
use crate::image::RenamedImage;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct PushWorker {
    pub id: usize,
    pub client: Arc<dyn RegistryClient>,
    pub auth: Arc<str>,
    pub config: PipelineConfig,
    pub images: SharedReceiver<RenamedImage>,
    pub done: mpsc::Sender<PushTally>,
}

impl PushWorker {
    pub async fn run(self) {
        tracing::debug!(worker = self.id, "pusher initializing");
        let mut tally = PushTally::default();

        while let Some(image) = next_item(&self.images).await {
            let reference = image.target_reference.to_string();
            match with_retries(&self.config, || self.client.push(&reference, &self.auth)).await {
                Ok(()) => {
                    tally.pushed += 1;
                    tracing::info!(image = %reference, "pushed");
                }
                Err(e) => {
                    tally.push_failures += 1;
                    tracing::error!(
                        repository = %image.repository,
                        tag = %image.target_reference.tag,
                        operation = "push",
                        image = %reference,
                        error = %e,
                        "image push failed"
                    );
                }
            }
        }

        if self.done.send(tally).await.is_err() {
            tracing::warn!(worker = self.id, "push coordinator gone before completion signal");
        }
        tracing::debug!(worker = self.id, "pusher terminated");
    }
}
