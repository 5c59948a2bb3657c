//! Registry module for the collaborators around the migration pipeline
//!
//! [`auth`] turns credentials into `X-Registry-Auth` tokens, [`client`]
//! drives a Docker daemon for pull/tag/push, and [`ecr`] reads source
//! metadata from and prepares target repositories in Amazon ECR.

pub mod auth;
pub mod client;
pub mod ecr;

pub use auth::{Authorizer, Credential};
pub use client::{DockerEndpoint, DockerEngineClient, DockerEngineClientBuilder};
pub use ecr::EcrRegistry;
