//! YAML configuration

use crate::normalize::DEFAULT_ASSET_ANNOTATION;
use crate::query::{QueryLimits, DEFAULT_LIMIT, MAX_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Default database location under the user's data directory.
pub fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("assetgraph").join("assetgraph.db")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Annotation key read for the `asset` attribute
    pub asset_annotation: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            asset_annotation: DEFAULT_ASSET_ANNOTATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl From<&QueryConfig> for QueryLimits {
    fn from(config: &QueryConfig) -> Self {
        QueryLimits {
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }
}

/// Service configuration. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub database: PathBuf,
    /// Cluster name used when the caller does not give one
    pub cluster: String,
    pub normalizer: NormalizerConfig,
    pub query: QueryConfig,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            database: default_db_path(),
            cluster: "default".to_string(),
            normalizer: NormalizerConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl AssetConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AssetConfig = if content.trim().is_empty() {
            AssetConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.max_limit == 0 {
            return Err(ConfigError::Invalid("query.max_limit must be positive".into()));
        }
        if self.normalizer.asset_annotation.is_empty() {
            return Err(ConfigError::Invalid(
                "normalizer.asset_annotation must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn query_limits(&self) -> QueryLimits {
        QueryLimits::from(&self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
database: /var/lib/assetgraph/assets.db
cluster: prod-eu
normalizer:
  asset_annotation: inventory/asset
query:
  max_limit: 200
"#;
        let config = AssetConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.database, PathBuf::from("/var/lib/assetgraph/assets.db"));
        assert_eq!(config.cluster, "prod-eu");
        assert_eq!(config.normalizer.asset_annotation, "inventory/asset");
        assert_eq!(config.query.default_limit, DEFAULT_LIMIT);
        assert_eq!(config.query_limits().max_limit, 200);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = AssetConfig::from_yaml("").unwrap();
        assert_eq!(config, AssetConfig::default());
        assert_eq!(config.normalizer.asset_annotation, "assetId");
    }

    #[test]
    fn rejects_zero_max_limit() {
        let err = AssetConfig::from_yaml("query:\n  max_limit: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn from_file_reports_missing_path() {
        let err = AssetConfig::from_file("/nonexistent/assetgraph.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn from_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assetgraph.yaml");
        std::fs::write(&path, "cluster: lab\n").unwrap();
        assert_eq!(AssetConfig::from_file(&path).unwrap().cluster, "lab");
    }
}
