//! Command line interface module
//!
//! Argument parsing, the layered run configuration and the runner that
//! drives one migration from the repository list to the final summary.

pub mod args;
pub mod config;
pub mod runner;

pub use args::Args;
pub use config::{AppConfig, DockerConfig, RegistryEndpoint, RepositoryList, SettingsFile};
pub use runner::Runner;
