//! Amazon ECR as metadata source and migration target
//!
//! Source side: describe the requested repositories, read their policies,
//! list their tags and fetch a pull credential. Target side: create missing
//! repositories (copying the source policy), map each source name to its
//! target URI and fetch a push credential.

use crate::common::{MetadataSource, TargetResolver};
use crate::error::{MigrateError, Result};
use crate::image::{MigrationBatch, RepositoryMetadata, TargetMap, TargetRepository};
use crate::registry::auth::{Authorizer, Credential};
use async_trait::async_trait;
use aws_sdk_ecr::Client;
use aws_sdk_ecr::config::Region;
use aws_sdk_ecr::error::DisplayErrorContext;
use std::collections::HashMap;

/// DescribeRepositories accepts at most this many names per call
const DESCRIBE_BATCH: usize = 100;

fn sdk_message<E: std::error::Error>(err: &E) -> String {
    DisplayErrorContext(err).to_string()
}

#[derive(Debug, Clone)]
pub struct EcrRegistry {
    client: Client,
}

impl EcrRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Load shared AWS configuration for `profile` in `region`.
    pub async fn connect(profile: &str, region: &str) -> Self {
        let config = aws_config::from_env()
            .profile_name(profile)
            .region(Region::new(region.to_string()))
            .load()
            .await;

        tracing::debug!(profile, region, "loaded AWS configuration");
        Self::new(Client::new(&config))
    }

    /// Fetch a registry credential from GetAuthorizationToken.
    pub async fn authenticate(&self) -> Result<Credential> {
        let output = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| MigrateError::Auth(format!("GetAuthorizationToken failed: {}", sdk_message(&e))))?;

        let token = output
            .authorization_data()
            .first()
            .and_then(|data| data.authorization_token())
            .ok_or_else(|| MigrateError::Auth("no authorizationData found in the response".to_string()))?;

        Credential::from_basic_token(token)
    }

    async fn describe_uris(&self, names: &[String]) -> std::result::Result<Vec<(String, String)>, String> {
        let mut found = Vec::with_capacity(names.len());

        // An empty name list would describe every repository in the account
        for chunk in names.chunks(DESCRIBE_BATCH) {
            let output = self
                .client
                .describe_repositories()
                .set_repository_names(Some(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| sdk_message(&e))?;

            for repository in output.repositories() {
                if let (Some(name), Some(uri)) = (repository.repository_name(), repository.repository_uri()) {
                    found.push((name.to_string(), uri.to_string()));
                }
            }
        }

        Ok(found)
    }

    /// Describe repositories, including their pull policy. Tags are not
    /// filled in.
    pub async fn describe(&self, names: &[String]) -> Result<Vec<RepositoryMetadata>> {
        let described = self
            .describe_uris(names)
            .await
            .map_err(|e| MigrateError::Metadata(format!("DescribeRepositories failed: {}", e)))?;

        let mut repositories = Vec::with_capacity(described.len());
        for (name, uri) in described {
            let policy = self.pull_policy(&name).await;
            repositories.push(RepositoryMetadata::new(name, uri).with_policy(policy));
        }
        Ok(repositories)
    }

    /// Repository policy text, or `None` when there is none or it cannot be
    /// read.
    pub async fn pull_policy(&self, name: &str) -> Option<String> {
        match self.client.get_repository_policy().repository_name(name).send().await {
            Ok(output) => output.policy_text().map(str::to_string),
            Err(err) => {
                let err = err.into_service_error();
                if !err.is_repository_policy_not_found_exception() {
                    tracing::error!(repository = name, error = %sdk_message(&err), "failed to read repository policy");
                }
                None
            }
        }
    }

    /// Every tag in the repository, following pagination. Untagged images
    /// are skipped.
    pub async fn list_tags(&self, name: &str) -> Result<Vec<String>> {
        let mut tags = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_images()
                .repository_name(name)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| MigrateError::Metadata(format!("ListImages for {} failed: {}", name, sdk_message(&e))))?;

            for image in output.image_ids() {
                if let Some(tag) = image.image_tag().filter(|t| !t.is_empty()) {
                    tracing::debug!(repository = name, tag, "listed image");
                    tags.push(tag.to_string());
                }
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(tags)
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        match self.client.describe_repositories().repository_names(name).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_repository_not_found_exception() {
                    Ok(false)
                } else {
                    Err(MigrateError::Target(format!(
                        "DescribeRepositories for {} failed: {}",
                        name,
                        sdk_message(&err)
                    )))
                }
            }
        }
    }

    /// Create a repository and apply `policy` when one is given.
    pub async fn create(&self, name: &str, policy: Option<&str>) -> Result<()> {
        self.client
            .create_repository()
            .repository_name(name)
            .send()
            .await
            .map_err(|e| MigrateError::Target(format!("CreateRepository {} failed: {}", name, sdk_message(&e))))?;

        tracing::info!(repository = name, "created target repository");
        self.set_policy(name, policy).await
    }

    pub async fn set_policy(&self, name: &str, policy: Option<&str>) -> Result<()> {
        let Some(policy) = policy.filter(|p| !p.is_empty()) else {
            return Ok(());
        };

        self.client
            .set_repository_policy()
            .repository_name(name)
            .policy_text(policy)
            .send()
            .await
            .map_err(|e| MigrateError::Target(format!("SetRepositoryPolicy {} failed: {}", name, sdk_message(&e))))?;
        Ok(())
    }

    /// Make sure `name` exists. Returns `true` when it had to be created.
    pub async fn ensure(&self, name: &str, policy: Option<&str>) -> Result<bool> {
        if self.exists(name).await? {
            tracing::info!(repository = name, "target repository already exists");
            return Ok(false);
        }
        self.create(name, policy).await?;
        Ok(true)
    }
}

#[async_trait]
impl MetadataSource for EcrRegistry {
    async fn fetch(&self, repository_names: &[String]) -> Result<MigrationBatch> {
        let mut described: HashMap<String, RepositoryMetadata> = self
            .describe(repository_names)
            .await?
            .into_iter()
            .map(|repo| (repo.name.clone(), repo))
            .collect();

        let auth = self.authenticate().await?;

        let mut repositories = Vec::with_capacity(described.len());
        for name in repository_names {
            let Some(metadata) = described.remove(name) else {
                tracing::warn!(repository = %name, "repository not returned by DescribeRepositories");
                continue;
            };

            match self.list_tags(name).await {
                Ok(tags) => repositories.push(metadata.with_tags(tags)),
                Err(e) => tracing::error!(repository = %name, error = %e, "listing images failed, repository skipped"),
            }
        }

        Ok(MigrationBatch::new(auth, repositories))
    }
}

#[async_trait]
impl TargetResolver for EcrRegistry {
    async fn prepare(&self, batch: &MigrationBatch) -> Result<(String, TargetMap)> {
        let mut resolved = Vec::with_capacity(batch.repositories.len());
        for repository in &batch.repositories {
            match self.ensure(&repository.name, repository.policy.as_deref()).await {
                Ok(_) => resolved.push(repository.name.clone()),
                Err(e) => {
                    tracing::error!(repository = %repository.name, error = %e, "target repository unavailable, repository skipped")
                }
            }
        }

        let targets: TargetMap = self
            .describe_uris(&resolved)
            .await
            .map_err(|e| MigrateError::Target(format!("DescribeRepositories failed: {}", e)))?
            .into_iter()
            .map(|(name, uri)| (name, TargetRepository::new(uri)))
            .collect();

        let credential = self.authenticate().await?;
        let token = Authorizer::encode(&credential)?;
        Ok((token, targets))
    }
}
