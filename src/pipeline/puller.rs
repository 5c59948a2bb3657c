//! Pull worker: pull, re-tag, hand over to the push queue

use super::config::PipelineConfig;
use super::stats::PullTally;
use super::{SharedReceiver, next_item, with_retries};
use crate::common::RegistryClient;
use crate::image::{PullJob, RenamedImage, TargetMap};
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct PullWorker {
    pub id: usize,
    pub client: Arc<dyn RegistryClient>,
    pub auth: Arc<str>,
    pub targets: Arc<TargetMap>,
    pub config: PipelineConfig,
    pub jobs: SharedReceiver<PullJob>,
    pub renamed: mpsc::Sender<RenamedImage>,
    pub done: mpsc::Sender<PullTally>,
}

impl PullWorker {
    /// Consume jobs until the pull queue is closed and drained, then signal
    /// completion exactly once.
    pub async fn run(self) {
        tracing::debug!(worker = self.id, "puller initializing");
        let mut tally = PullTally::default();

        while let Some(job) = next_item(&self.jobs).await {
            self.process(job, &mut tally).await;
        }

        // The push-queue sender has to be gone before the coordinator hears
        // from us, otherwise the queue would outlive the coordinator's close.
        drop(self.renamed);
        if self.done.send(tally).await.is_err() {
            tracing::warn!(worker = self.id, "pull coordinator gone before completion signal");
        }
        tracing::debug!(worker = self.id, "puller terminated");
    }

    async fn process(&self, job: PullJob, tally: &mut PullTally) {
        let repository = &job.repository;
        let Some(target) = self.targets.get(&repository.name) else {
            tracing::warn!(
                repository = %repository.name,
                tags = job.tags.len(),
                "no target repository mapped, skipping"
            );
            tally.skipped += job.tags.len();
            return;
        };

        for tag in &job.tags {
            let from = repository.source_reference(tag).to_string();
            let to = target.reference(tag);
            let to_string = to.to_string();

            if let Err(e) = with_retries(&self.config, || self.client.pull(&from, &self.auth)).await {
                tracing::error!(
                    repository = %repository.name,
                    tag = %tag,
                    operation = "pull",
                    error = %e,
                    "image pull failed"
                );
                tally.pull_failures += 1;
                continue;
            }
            tally.pulled += 1;
            tracing::info!(repository = %repository.name, tag = %tag, "pulled");

            if let Err(e) = with_retries(&self.config, || self.client.tag_local(&from, &to_string)).await {
                tracing::error!(
                    repository = %repository.name,
                    tag = %tag,
                    operation = "rename",
                    from = %from,
                    to = %to_string,
                    error = %e,
                    "image rename failed"
                );
                tally.rename_failures += 1;
                continue;
            }
            tally.renamed += 1;
            tracing::info!(from = %from, to = %to_string, "renamed");

            let image = RenamedImage {
                target_reference: to,
                repository: repository.name.clone(),
            };
            if self.renamed.send(image).await.is_err() {
                tracing::error!(
                    repository = %repository.name,
                    tag = %tag,
                    operation = "enqueue",
                    "push queue closed, image dropped"
                );
            }
        }
    }
}
