//! Command-line argument parsing

use crate::error::{MigrateError, Result};
use crate::pipeline::QueueGranularity;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "registry-migrator")]
#[command(about = "Migrate container images between two ECR registries through a Docker daemon")]
#[command(version)]
pub struct Args {
    /// YAML file listing the repositories to migrate
    #[arg(
        long = "config-file",
        short = 'f',
        default_value = "list.yaml",
        help = "YAML file with a `repositories:` list"
    )]
    pub config_file: String,

    /// Source region
    #[arg(long = "from-region", default_value = "us-east-1", help = "Region of the source registry")]
    pub from_region: String,

    /// Target region
    #[arg(long = "to-region", default_value = "us-east-1", help = "Region of the target registry")]
    pub to_region: String,

    /// Source AWS profile
    #[arg(long = "from", default_value = "default", help = "AWS profile for the source registry")]
    pub from: String,

    /// Target AWS profile
    #[arg(long = "to", default_value = "HOME-LAB", help = "AWS profile for the target registry")]
    pub to: String,

    /// Number of pull workers
    #[arg(long = "pullers", help = "Number of concurrent pull workers [default: 3]")]
    pub pullers: Option<usize>,

    /// Number of push workers
    #[arg(long = "pushers", help = "Number of concurrent push workers [default: 3]")]
    pub pushers: Option<usize>,

    /// Queue granularity
    #[arg(
        long = "granularity",
        help = "Unit of work on the pull queue: repository or tag [default: repository]"
    )]
    pub granularity: Option<String>,

    /// Retry attempts for transient failures
    #[arg(long = "retries", help = "Extra attempts per pull, tag or push on transient errors [default: 0]")]
    pub retries: Option<usize>,

    /// Docker daemon address
    #[arg(
        long = "docker-host",
        short = 'H',
        help = "Docker daemon address, e.g. tcp://127.0.0.1:2375 [default: $DOCKER_HOST]"
    )]
    pub docker_host: Option<String>,

    /// Timeout in seconds for a single daemon request
    #[arg(long = "timeout", short = 't', help = "Timeout for a single pull or push in seconds [default: 7200]")]
    pub timeout: Option<u64>,

    /// Optional settings file
    #[arg(long = "settings", help = "YAML settings file for pipeline and daemon options")]
    pub settings: Option<String>,

    /// Dry run mode
    #[arg(long = "dry-run", short = 'n', help = "List what would be migrated without touching the target")]
    pub dry_run: bool,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet output
    #[arg(long = "quiet", short = 'q', help = "Only print errors")]
    pub quiet: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<()> {
        if self.pullers == Some(0) {
            return Err(MigrateError::Config("Pullers must be greater than 0".to_string()));
        }

        if self.pushers == Some(0) {
            return Err(MigrateError::Config("Pushers must be greater than 0".to_string()));
        }

        if self.timeout == Some(0) {
            return Err(MigrateError::Config("Timeout must be greater than 0".to_string()));
        }

        if let Some(granularity) = &self.granularity {
            granularity.parse::<QueueGranularity>()?;
        }

        if self.from == self.to && self.from_region == self.to_region {
            return Err(MigrateError::Config(format!(
                "Source and target are both profile {} in {}",
                self.from, self.from_region
            )));
        }

        if self.verbose && self.quiet {
            return Err(MigrateError::Config("--verbose and --quiet are mutually exclusive".to_string()));
        }

        Ok(())
    }

    /// Fill unset options from environment variables
    pub fn from_env(mut self) -> Self {
        if self.docker_host.is_none() {
            self.docker_host = std::env::var("MIGRATOR_DOCKER_HOST")
                .or_else(|_| std::env::var("DOCKER_HOST"))
                .ok();
        }

        if self.pullers.is_none() {
            self.pullers = std::env::var("MIGRATOR_PULLERS").ok().and_then(|v| v.parse().ok());
        }

        if self.pushers.is_none() {
            self.pushers = std::env::var("MIGRATOR_PUSHERS").ok().and_then(|v| v.parse().ok());
        }

        if self.settings.is_none() {
            self.settings = std::env::var("MIGRATOR_SETTINGS").ok();
        }

        if std::env::var("MIGRATOR_VERBOSE").is_ok() && !self.quiet {
            self.verbose = true;
        }

        self
    }
}
