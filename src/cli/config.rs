//! Configuration management module

use crate::cli::args::Args;
use crate::error::{MigrateError, Result};
use crate::pipeline::PipelineConfig;
use crate::registry::client::DEFAULT_DOCKER_HOST;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The repository list file: a YAML document with a `repositories` key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryList {
    #[serde(default)]
    pub repositories: Vec<String>,
}

impl RepositoryList {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("Cannot read repository list {}: {}", path.display(), e))
        })?;
        let list: RepositoryList = serde_yaml::from_str(&content)?;
        Ok(list.deduplicated())
    }

    /// Drop blank entries and repeated names, keeping the first occurrence
    pub fn deduplicated(self) -> Self {
        let mut seen = HashSet::new();
        let repositories = self
            .repositories
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .filter(|name| {
                let fresh = seen.insert(name.clone());
                if !fresh {
                    tracing::warn!(repository = %name, "repository listed twice, ignoring repeat");
                }
                fresh
            })
            .collect();
        Self { repositories }
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

/// One side of the migration: which credentials profile and region to use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEndpoint {
    pub profile: String,
    pub region: String,
}

impl RegistryEndpoint {
    pub fn new(profile: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            region: region.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.profile.is_empty() {
            return Err(MigrateError::Config("Profile cannot be empty".to_string()));
        }
        if self.region.is_empty() {
            return Err(MigrateError::Config("Region cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Docker daemon connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub host: String,
    /// Seconds allowed for a single pull or push
    pub timeout: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DOCKER_HOST.to_string(),
            timeout: 7200,
        }
    }
}

/// Optional settings file, layered under the command line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub pipeline: PipelineConfig,
    pub docker: Option<DockerConfig>,
}

impl SettingsFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MigrateError::Config(format!("Cannot read settings {}: {}", path.display(), e)))?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Application configuration, fixed for the whole run
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub repository_file: PathBuf,
    pub source: RegistryEndpoint,
    pub target: RegistryEndpoint,
    pub docker: DockerConfig,
    pub pipeline: PipelineConfig,
    pub dry_run: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl AppConfig {
    /// Build the run configuration. Command-line values win over the
    /// settings file, which wins over defaults.
    pub fn from_args(args: &Args) -> Result<Self> {
        args.validate()?;

        let settings = match &args.settings {
            Some(path) => SettingsFile::load(path)?,
            None => SettingsFile::default(),
        };

        let mut pipeline = settings.pipeline;
        if let Some(pullers) = args.pullers {
            pipeline = pipeline.with_pullers(pullers);
        }
        if let Some(pushers) = args.pushers {
            pipeline = pipeline.with_pushers(pushers);
        }
        if let Some(granularity) = &args.granularity {
            pipeline = pipeline.with_granularity(granularity.parse()?);
        }
        if let Some(retries) = args.retries {
            pipeline = pipeline.with_retries(retries);
        }

        let mut docker = settings.docker.unwrap_or_default();
        if let Some(host) = &args.docker_host {
            docker.host = host.clone();
        }
        if let Some(timeout) = args.timeout {
            docker.timeout = timeout;
        }

        let config = Self {
            repository_file: PathBuf::from(&args.config_file),
            source: RegistryEndpoint::new(&args.from, &args.from_region),
            target: RegistryEndpoint::new(&args.to, &args.to_region),
            docker,
            pipeline,
            dry_run: args.dry_run,
            verbose: args.verbose,
            quiet: args.quiet,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.target.validate()?;
        if self.source == self.target {
            return Err(MigrateError::Config(
                "Source and target registries must differ".to_string(),
            ));
        }
        if self.docker.host.is_empty() {
            return Err(MigrateError::Config("Docker host cannot be empty".to_string()));
        }
        if self.docker.timeout == 0 {
            return Err(MigrateError::Config("Timeout must be greater than 0".to_string()));
        }
        self.pipeline.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::QueueGranularity;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("registry-migrator").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn loads_repository_list() {
        let file = yaml_file("repositories:\n  - app/web\n  - app/worker\n");
        let list = RepositoryList::load(file.path()).unwrap();
        assert_eq!(list.repositories, vec!["app/web", "app/worker"]);
    }

    #[test]
    fn drops_repeated_and_blank_names() {
        let file = yaml_file("repositories:\n  - a\n  - ''\n  - b\n  - a\n");
        let list = RepositoryList::load(file.path()).unwrap();
        assert_eq!(list.repositories, vec!["a", "b"]);
    }

    #[test]
    fn empty_document_is_an_empty_list() {
        let file = yaml_file("repositories: []\n");
        assert!(RepositoryList::load(file.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_list_is_a_config_error() {
        let err = RepositoryList::load("/nonexistent/list.yaml").unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn malformed_list_is_rejected() {
        let file = yaml_file("repositories: {not: [a list\n");
        assert!(RepositoryList::load(file.path()).is_err());
    }

    #[test]
    fn command_line_wins_over_settings_file() {
        let settings = yaml_file("pipeline:\n  pullers: 8\n  pushers: 2\n  granularity: tag\ndocker:\n  host: tcp://docker:2375\n");
        let path = settings.path().to_str().unwrap();
        let config = AppConfig::from_args(&args(&["--settings", path, "--pullers", "4"])).unwrap();

        assert_eq!(config.pipeline.pullers, 4);
        assert_eq!(config.pipeline.pushers, 2);
        assert_eq!(config.pipeline.granularity, QueueGranularity::Tag);
        assert_eq!(config.docker.host, "tcp://docker:2375");
        assert_eq!(config.docker.timeout, 7200);
    }

    #[test]
    fn defaults_without_settings() {
        let config = AppConfig::from_args(&args(&[])).unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.source, RegistryEndpoint::new("default", "us-east-1"));
        assert_eq!(config.target, RegistryEndpoint::new("HOME-LAB", "us-east-1"));
        assert_eq!(config.repository_file, PathBuf::from("list.yaml"));
    }

    #[test]
    fn settings_cannot_sneak_in_empty_pools() {
        let settings = yaml_file("pipeline:\n  pushers: 0\n");
        let path = settings.path().to_str().unwrap();
        assert!(AppConfig::from_args(&args(&["--settings", path])).is_err());
    }
}
