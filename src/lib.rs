//! Registry Migrator Library
//!
//! Copies every tagged image of a list of repositories from one container
//! registry to another through a local Docker daemon. Source metadata is
//! loaded up front, target repositories are created as needed, and a
//! concurrent pull/push pipeline moves each image exactly once.

pub mod cli;
pub mod common;
pub mod error;
pub mod image;
pub mod logging;
pub mod pipeline;
pub mod registry;

pub use common::{MetadataSource, RegistryClient, TargetResolver};
pub use error::{ClientError, MigrateError, Result};
pub use logging::Logger;
pub use pipeline::{MigrationPipeline, MigrationReport, PipelineConfig, QueueGranularity};
pub use registry::{Authorizer, Credential};
