//! `repository:tag` image references

use crate::error::ClientError;
use std::fmt;
use std::str::FromStr;

/// A repository plus tag, printed as `repository:tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

impl FromStr for ImageReference {
    type Err = ClientError;

    /// The tag separator is the last `:` after the last `/`, so a registry
    /// port (`host:5000/app`) is never mistaken for a tag. A reference
    /// without a tag is rejected rather than defaulted to `latest`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name_start = s.rfind('/').map(|pos| pos + 1).unwrap_or(0);
        let (repository, tag) = match s[name_start..].rfind(':') {
            Some(pos) => s.split_at(name_start + pos),
            None => return Err(ClientError::InvalidReference(s.to_string())),
        };
        let tag = &tag[1..];

        if repository.is_empty() || tag.is_empty() {
            return Err(ClientError::InvalidReference(s.to_string()));
        }

        Ok(Self::new(repository, tag))
    }
}
