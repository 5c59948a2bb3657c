//! Pipeline sizing and retry settings

use crate::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PULLERS: usize = 3;
pub const DEFAULT_PUSHERS: usize = 3;

/// What one item on the pull queue carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueGranularity {
    /// A whole repository; the worker walks its tags in order
    #[default]
    Repository,
    /// A single tag, which spreads repositories with many tags across
    /// workers
    Tag,
}

impl fmt::Display for QueueGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueGranularity::Repository => write!(f, "repository"),
            QueueGranularity::Tag => write!(f, "tag"),
        }
    }
}

impl FromStr for QueueGranularity {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "repository" | "repo" => Ok(QueueGranularity::Repository),
            "tag" => Ok(QueueGranularity::Tag),
            other => Err(MigrateError::Config(format!(
                "Unknown queue granularity {:?}, expected repository or tag",
                other
            ))),
        }
    }
}

/// Worker pool configuration for one migration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pullers: usize,
    pub pushers: usize,
    pub granularity: QueueGranularity,
    /// Extra attempts for a transiently failing pull, tag or push
    pub retries: usize,
    /// Pause before the first retry, doubled for each further one
    #[serde(with = "millis")]
    pub retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pullers: DEFAULT_PULLERS,
            pushers: DEFAULT_PUSHERS,
            granularity: QueueGranularity::Repository,
            retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl PipelineConfig {
    pub fn with_pullers(mut self, pullers: usize) -> Self {
        self.pullers = pullers;
        self
    }

    pub fn with_pushers(mut self, pushers: usize) -> Self {
        self.pushers = pushers;
        self
    }

    pub fn with_granularity(mut self, granularity: QueueGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.pullers == 0 {
            return Err(MigrateError::Config("pullers must be greater than 0".to_string()));
        }
        if self.pushers == 0 {
            return Err(MigrateError::Config("pushers must be greater than 0".to_string()));
        }
        if self.retries > 10 {
            return Err(MigrateError::Config("retries cannot exceed 10".to_string()));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(6);
        self.retry_delay * factor
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
