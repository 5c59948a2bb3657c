//! Seams between the migration pipeline and the outside world
//!
//! The pipeline only ever talks to these traits. Production implementations
//! live in [`crate::registry`]; tests substitute recording fakes.

use crate::error::{ClientError, Result};
use crate::image::{MigrationBatch, TargetMap};
use async_trait::async_trait;

/// Supplies source repository metadata and the source registry credential
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Load metadata for the named repositories. Any error is fatal.
    async fn fetch(&self, repository_names: &[String]) -> Result<MigrationBatch>;
}

/// Prepares the target registry before migration starts
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// Ensure every target repository exists and return the target auth
    /// token together with the source-name to target-URI map.
    async fn prepare(&self, batch: &MigrationBatch) -> Result<(String, TargetMap)>;
}

/// Per-image operations against a container engine.
///
/// Implementations must be safe for concurrent use; the pipeline shares one
/// instance across every worker without extra locking.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Pull `reference` (`repository:tag`), draining any progress output.
    async fn pull(&self, reference: &str, auth_token: &str) -> std::result::Result<(), ClientError>;

    /// Alias a locally present image under a new reference.
    async fn tag_local(&self, from: &str, to: &str) -> std::result::Result<(), ClientError>;

    /// Push `reference` (`repository:tag`), draining any progress output.
    async fn push(&self, reference: &str, auth_token: &str) -> std::result::Result<(), ClientError>;
}
