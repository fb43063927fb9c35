//! Store locators: `<scheme>://<path>/<cache>`

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use super::local::META_PARTITION;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("Cannot parse cache locator: {0}")]
    Unparsable(String),

    #[error("No cache name in locator: {0}")]
    MissingCache(String),

    #[error("Invalid cache name '{0}', expected [A-Za-z0-9_-]")]
    InvalidCache(String),

    #[error("Cache name '{0}' is reserved")]
    ReservedCache(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Store backends reachable through a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Local fjall keyspace
    Fjall,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Fjall => "fjall",
        }
    }
}

/// Parsed target-store locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub scheme: Scheme,
    /// Backend location (keyspace directory for fjall)
    pub path: PathBuf,
    /// Named cache inside the store
    pub cache: String,
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| LocatorError::Unparsable(s.to_string()))?;

        let scheme = match scheme {
            "fjall" => Scheme::Fjall,
            "" => return Err(LocatorError::Unparsable(s.to_string())),
            other => return Err(LocatorError::UnsupportedScheme(other.to_string())),
        };

        let rest = rest.trim_end_matches('/');
        let (path, cache) = match rest.rsplit_once('/') {
            Some((path, cache)) => (path, cache),
            None => return Err(LocatorError::MissingCache(s.to_string())),
        };

        if cache.is_empty() {
            return Err(LocatorError::MissingCache(s.to_string()));
        }
        if !cache
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(LocatorError::InvalidCache(cache.to_string()));
        }
        if scheme == Scheme::Fjall && cache == META_PARTITION {
            return Err(LocatorError::ReservedCache(cache.to_string()));
        }

        // `fjall:///data/people` keeps its absolute root
        let path = if path.is_empty() && rest.starts_with('/') {
            "/"
        } else if path.is_empty() {
            return Err(LocatorError::Unparsable(s.to_string()));
        } else {
            path
        };

        Ok(Self {
            scheme,
            path: PathBuf::from(path),
            cache: cache.to_string(),
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}",
            self.scheme.as_str(),
            self.path.display(),
            self.cache
        )
    }
}
