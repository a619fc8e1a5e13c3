//! Grid Configuration
//!
//! Tunables for the registries, loadable from YAML.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Configuration for the node and group registries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridConfig {
    /// Number of shards for the DashMaps (0 = auto)
    pub shard_count: usize,
    /// Refuse to add a node to a group while another group owns it
    pub exclusive_membership: bool,
    /// Catch listener panics during dispatch
    pub catch_listener_panics: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            shard_count: 0, // Auto
            exclusive_membership: false,
            catch_listener_panics: true,
        }
    }
}

impl GridConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: GridConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Check the configuration for values the registries cannot use
    pub fn validate(&self) -> Result<()> {
        // DashMap needs a power of two greater than one
        if self.shard_count != 0 && (self.shard_count < 2 || !self.shard_count.is_power_of_two()) {
            return Err(Error::Configuration(format!(
                "shardCount must be 0 or a power of two >= 2, got {}",
                self.shard_count
            )));
        }
        Ok(())
    }

    /// Shard amount to build the DashMaps with, `None` for the DashMap default.
    ///
    /// A count that [`GridConfig::validate`] would reject is rounded up to the
    /// next power of two, at least 2.
    pub fn shard_amount(&self) -> Option<usize> {
        match self.shard_count {
            0 => None,
            n if n >= 2 && n.is_power_of_two() => Some(n),
            n => {
                let rounded = n.next_power_of_two().max(2);
                warn!("shardCount {} is not a power of two >= 2, using {}", n, rounded);
                Some(rounded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GridConfig::default();
        assert_eq!(config.shard_count, 0);
        assert!(!config.exclusive_membership);
        assert!(config.catch_listener_panics);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = GridConfig::from_yaml_str("exclusiveMembership: true\n").unwrap();
        assert!(config.exclusive_membership);
        assert!(config.catch_listener_panics);
    }

    #[test]
    fn test_shard_amount_rounds_unusable_counts() {
        let with = |shard_count| GridConfig {
            shard_count,
            ..Default::default()
        };
        assert_eq!(with(0).shard_amount(), None);
        assert_eq!(with(1).shard_amount(), Some(2));
        assert_eq!(with(3).shard_amount(), Some(4));
        assert_eq!(with(12).shard_amount(), Some(16));
        assert_eq!(with(64).shard_amount(), Some(64));
    }

    #[test]
    fn test_invalid_shard_count() {
        assert_matches!(
            GridConfig::from_yaml_str("shardCount: 12\n"),
            Err(Error::Configuration(_))
        );
        assert_matches!(
            GridConfig::from_yaml_str("shardCount: 1\n"),
            Err(Error::Configuration(_))
        );
        assert!(GridConfig::from_yaml_str("shardCount: 64\n").is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "shardCount: 16").unwrap();
        writeln!(file, "catchListenerPanics: false").unwrap();

        let config = GridConfig::from_file(file.path()).unwrap();
        assert_eq!(config.shard_count, 16);
        assert!(!config.catch_listener_panics);
    }

    #[test]
    fn test_malformed_yaml() {
        assert_matches!(
            GridConfig::from_yaml_str("shardCount: [oops"),
            Err(Error::YamlParse(_))
        );
    }
}
