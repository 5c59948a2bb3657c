//! Source repository metadata and target coordinates

use crate::image::ImageReference;
use crate::registry::Credential;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One source repository and the tags to migrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub name: String,
    pub source_uri: String,
    /// Repository policy document, copied to the target when it is created
    pub policy: Option<String>,
    pub tags: Vec<String>,
}

impl RepositoryMetadata {
    pub fn new(name: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_uri: source_uri.into(),
            policy: None,
            tags: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: Option<String>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn source_reference(&self, tag: &str) -> ImageReference {
        ImageReference::new(self.source_uri.clone(), tag)
    }
}

/// The complete unit of work for one pipeline run.
#[derive(Debug, Clone)]
pub struct MigrationBatch {
    pub auth: Credential,
    pub repositories: Vec<RepositoryMetadata>,
    /// Sum of all tags across all repositories; sizes the push queue
    pub total_image_count: usize,
}

impl MigrationBatch {
    /// Build a batch, computing the image count from the tag lists.
    pub fn new(auth: Credential, repositories: Vec<RepositoryMetadata>) -> Self {
        let total_image_count = repositories.iter().map(|r| r.tags.len()).sum();
        Self {
            auth,
            repositories,
            total_image_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn repository_names(&self) -> Vec<String> {
        self.repositories.iter().map(|r| r.name.clone()).collect()
    }
}

/// Where a source repository lands in the target registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRepository {
    pub target_uri: String,
}

impl TargetRepository {
    pub fn new(target_uri: impl Into<String>) -> Self {
        Self {
            target_uri: target_uri.into(),
        }
    }

    pub fn reference(&self, tag: &str) -> ImageReference {
        ImageReference::new(self.target_uri.clone(), tag)
    }
}

/// Repository name to target repository. Built once, then only read.
pub type TargetMap = HashMap<String, TargetRepository>;

/// A unit of work on the pull queue: one repository and some of its tags.
#[derive(Debug, Clone)]
pub struct PullJob {
    pub repository: Arc<RepositoryMetadata>,
    pub tags: Vec<String>,
}

impl PullJob {
    /// One job carrying every tag of the repository.
    pub fn per_repository(repository: Arc<RepositoryMetadata>) -> Vec<PullJob> {
        let tags = repository.tags.clone();
        vec![PullJob { repository, tags }]
    }

    /// One job per tag, for finer load balancing across pull workers.
    pub fn per_tag(repository: Arc<RepositoryMetadata>) -> Vec<PullJob> {
        repository
            .tags
            .iter()
            .map(|tag| PullJob {
                repository: Arc::clone(&repository),
                tags: vec![tag.clone()],
            })
            .collect()
    }
}

/// An image pulled and re-tagged to its target coordinates, ready to push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedImage {
    pub target_reference: ImageReference,
    /// Source repository name, kept for log context
    pub repository: String,
}
