//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use registry_migrator::common::{MetadataSource, RegistryClient, TargetResolver};
use registry_migrator::error::{ClientError, MigrateError, Result};
use registry_migrator::image::{MigrationBatch, RepositoryMetadata, TargetMap, TargetRepository};
use registry_migrator::pipeline::PipelineConfig;
use registry_migrator::registry::Credential;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const SOURCE_HOST: &str = "111.dkr.ecr.us-east-1.amazonaws.com";
pub const TARGET_HOST: &str = "222.dkr.ecr.us-east-1.amazonaws.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Pull { reference: String, auth: String },
    Tag { from: String, to: String },
    Push { reference: String, auth: String },
}

/// Records every successful call in completion order and fails the calls it
/// was told to fail.
#[derive(Default)]
pub struct MockRegistry {
    events: Mutex<Vec<Event>>,
    attempts: Mutex<HashMap<String, usize>>,
    failing_pulls: HashSet<String>,
    failing_tags: HashSet<String>,
    failing_pushes: HashSet<String>,
    panicking_pulls: HashSet<String>,
    panicking_pushes: HashSet<String>,
    transient_pulls: Mutex<HashMap<String, usize>>,
    gates: HashMap<String, Arc<Notify>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_pull(mut self, reference: &str) -> Self {
        self.failing_pulls.insert(reference.to_string());
        self
    }

    pub fn fail_tag(mut self, from: &str) -> Self {
        self.failing_tags.insert(from.to_string());
        self
    }

    pub fn fail_push(mut self, reference: &str) -> Self {
        self.failing_pushes.insert(reference.to_string());
        self
    }

    /// Panic inside the pull of `reference`, taking its worker down
    pub fn panic_on_pull(mut self, reference: &str) -> Self {
        self.panicking_pulls.insert(reference.to_string());
        self
    }

    /// Panic inside the push of `reference`, taking its worker down
    pub fn panic_on_push(mut self, reference: &str) -> Self {
        self.panicking_pushes.insert(reference.to_string());
        self
    }

    /// Fail the first `times` pulls of `reference` with a transient error
    pub fn flaky_pull(self, reference: &str, times: usize) -> Self {
        self.transient_pulls
            .lock()
            .unwrap()
            .insert(reference.to_string(), times);
        self
    }

    /// Hold the pull of `reference` until the returned handle is notified
    pub fn gate_pull(mut self, reference: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gates.insert(reference.to_string(), Arc::clone(&gate));
        (self, gate)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Pull { reference, .. } => Some(reference),
                _ => None,
            })
            .collect()
    }

    pub fn tags(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Tag { from, to } => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Push { reference, .. } => Some(reference),
                _ => None,
            })
            .collect()
    }

    pub fn attempts(&self, reference: &str) -> usize {
        self.attempts.lock().unwrap().get(reference).copied().unwrap_or(0)
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn not_found(operation: &'static str, reference: &str) -> ClientError {
        ClientError::Status {
            operation,
            status: 404,
            message: format!("{} not found", reference),
        }
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    async fn pull(&self, reference: &str, auth_token: &str) -> std::result::Result<(), ClientError> {
        *self.attempts.lock().unwrap().entry(reference.to_string()).or_default() += 1;

        if self.panicking_pulls.contains(reference) {
            panic!("daemon client crashed pulling {}", reference);
        }

        if let Some(gate) = self.gates.get(reference) {
            gate.notified().await;
        }

        {
            let mut transient = self.transient_pulls.lock().unwrap();
            if let Some(remaining) = transient.get_mut(reference) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ClientError::Stream("unexpected EOF".to_string()));
                }
            }
        }

        if self.failing_pulls.contains(reference) {
            return Err(Self::not_found("pull", reference));
        }

        self.record(Event::Pull {
            reference: reference.to_string(),
            auth: auth_token.to_string(),
        });
        Ok(())
    }

    async fn tag_local(&self, from: &str, to: &str) -> std::result::Result<(), ClientError> {
        if self.failing_tags.contains(from) {
            return Err(Self::not_found("tag", from));
        }
        self.record(Event::Tag {
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    async fn push(&self, reference: &str, auth_token: &str) -> std::result::Result<(), ClientError> {
        // Let other workers interleave
        tokio::task::yield_now().await;
        if self.panicking_pushes.contains(reference) {
            panic!("daemon client crashed pushing {}", reference);
        }
        if self.failing_pushes.contains(reference) {
            return Err(Self::not_found("push", reference));
        }
        self.record(Event::Push {
            reference: reference.to_string(),
            auth: auth_token.to_string(),
        });
        Ok(())
    }
}

/// Metadata source serving a fixed batch
pub struct StaticSource {
    pub batch: MigrationBatch,
}

#[async_trait]
impl MetadataSource for StaticSource {
    async fn fetch(&self, repository_names: &[String]) -> Result<MigrationBatch> {
        let repositories = self
            .batch
            .repositories
            .iter()
            .filter(|repo| repository_names.contains(&repo.name))
            .cloned()
            .collect();
        Ok(MigrationBatch::new(self.batch.auth.clone(), repositories))
    }
}

/// Metadata source that always fails
pub struct BrokenSource;

#[async_trait]
impl MetadataSource for BrokenSource {
    async fn fetch(&self, _: &[String]) -> Result<MigrationBatch> {
        Err(MigrateError::Metadata("DescribeRepositories failed: access denied".to_string()))
    }
}

/// Target resolver mapping every repository it is asked about, minus the
/// ones listed in `unmapped`
pub struct StaticTarget {
    pub token: String,
    pub unmapped: Vec<String>,
}

#[async_trait]
impl TargetResolver for StaticTarget {
    async fn prepare(&self, batch: &MigrationBatch) -> Result<(String, TargetMap)> {
        let names: Vec<&str> = batch
            .repositories
            .iter()
            .map(|repo| repo.name.as_str())
            .filter(|name| !self.unmapped.iter().any(|u| u == name))
            .collect();
        Ok((self.token.clone(), targets(&names)))
    }
}

pub fn source_credential() -> Credential {
    Credential::new("AWS", "source-secret")
}

pub fn batch(repositories: &[(&str, &[&str])]) -> MigrationBatch {
    let repositories = repositories
        .iter()
        .map(|(name, tags)| {
            RepositoryMetadata::new(*name, format!("{}/{}", SOURCE_HOST, name)).with_tags(tags.iter().copied())
        })
        .collect();
    MigrationBatch::new(source_credential(), repositories)
}

pub fn targets(names: &[&str]) -> TargetMap {
    names
        .iter()
        .map(|name| {
            (
                name.to_string(),
                TargetRepository::new(format!("{}/{}", TARGET_HOST, name)),
            )
        })
        .collect()
}

pub fn source_ref(name: &str, tag: &str) -> String {
    format!("{}/{}:{}", SOURCE_HOST, name, tag)
}

pub fn target_ref(name: &str, tag: &str) -> String {
    format!("{}/{}:{}", TARGET_HOST, name, tag)
}

pub fn config(pullers: usize, pushers: usize) -> PipelineConfig {
    PipelineConfig::default()
        .with_pullers(pullers)
        .with_pushers(pushers)
        .with_retry_delay(Duration::from_millis(1))
}
