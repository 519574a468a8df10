//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files, interpolating environment
//! variables (so credentials never live in the file itself), and validating
//! the result before anything touches the warehouse.

use regex::Regex;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::env;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{
    ConfigError, EnvInterpolationSnafu, InvalidStorageUriSnafu, MissingValueSnafu, ReadFileSnafu,
    YamlParseSnafu,
};

/// Main configuration structure for the ETL tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
}

/// Warehouse connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Cluster endpoint host name.
    pub host: String,

    /// Cluster port (default: 5439).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    pub dbname: String,

    /// Login user.
    pub user: String,

    /// Login password. Use `${VAR}` interpolation to keep it out of the file.
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    5439
}

/// Object storage locations and the access role the warehouse assumes
/// when bulk-loading from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Prefix holding newline-delimited JSON event-log files.
    pub log_data_uri: String,

    /// Prefix holding JSON song-metadata files (one object per file).
    pub song_data_uri: String,

    /// Optional JSON-path mapping document for the event-log load.
    /// When absent, fields are matched to columns by name.
    #[serde(default)]
    pub log_jsonpath: Option<String>,

    /// IAM role ARN the warehouse assumes to read the bucket.
    pub iam_role: String,

    /// Region the bucket lives in.
    pub region: String,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a YAML file with optional environment
    /// variable interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;

        let content = if interpolate_env {
            interpolate(&content)
                .map_err(|errors| EnvInterpolationSnafu {
                    message: errors.join("\n"),
                }
                .build())?
        } else {
            content
        };

        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.database.host.is_empty(),
            MissingValueSnafu {
                field: "database.host"
            }
        );
        ensure!(
            !self.database.dbname.is_empty(),
            MissingValueSnafu {
                field: "database.dbname"
            }
        );
        ensure!(
            !self.database.user.is_empty(),
            MissingValueSnafu {
                field: "database.user"
            }
        );
        ensure!(
            !self.storage.iam_role.is_empty(),
            MissingValueSnafu {
                field: "storage.iam_role"
            }
        );
        ensure!(
            !self.storage.region.is_empty(),
            MissingValueSnafu {
                field: "storage.region"
            }
        );

        for (field, uri) in [
            ("storage.log_data_uri", self.storage.log_data_uri.as_str()),
            ("storage.song_data_uri", self.storage.song_data_uri.as_str()),
        ] {
            ensure!(!uri.is_empty(), MissingValueSnafu { field });
            ensure!(
                uri.starts_with("s3://"),
                InvalidStorageUriSnafu { field, uri }
            );
        }

        if let Some(jsonpath) = &self.storage.log_jsonpath {
            ensure!(
                jsonpath.starts_with("s3://"),
                InvalidStorageUriSnafu {
                    field: "storage.log_jsonpath",
                    uri: jsonpath.as_str(),
                }
            );
        }

        Ok(())
    }
}

/// Regex for environment variable references in config text.
/// Matches `$$` (escape), `${VAR}`, `${VAR:-default}`, `${VAR-default}`,
/// and unbraced `$VAR`.
static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        |
        \$\{
            ([A-Za-z_][A-Za-z0-9_]*)
            (?:
                (:?-)
                ([^}]*)
            )?
        \}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("Invalid regex pattern")
});

/// Substitute environment variable references in `text`.
///
/// `${VAR:-default}` falls back when VAR is unset or empty; `${VAR-default}`
/// only when unset. A reference with no default and no value is an error;
/// all such errors are collected before returning.
fn interpolate(text: &str) -> Result<String, Vec<String>> {
    let mut errors = Vec::new();

    let result = ENV_VAR_PATTERN.replace_all(text, |caps: &regex::Captures| {
        if &caps[0] == "$$" {
            return "$".to_string();
        }

        let name = caps
            .get(1)
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let value = env::var(name).ok();

        match (value, caps.get(2).map(|m| m.as_str()), caps.get(3)) {
            // `:-` treats empty as unset
            (Some(v), Some(":-"), Some(default)) if v.is_empty() => default.as_str().to_string(),
            (Some(v), _, _) => v,
            (None, Some(_), Some(default)) => default.as_str().to_string(),
            (None, _, _) => {
                errors.push(format!("environment variable '{name}' is not set"));
                String::new()
            }
        }
    });

    if errors.is_empty() {
        Ok(result.into_owned())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_YAML: &str = r#"
database:
  host: cluster.example.us-west-2.redshift.amazonaws.com
  dbname: warehouse
  user: loader
  password: secret

storage:
  log_data_uri: s3://bucket/log_data
  song_data_uri: s3://bucket/song_data
  log_jsonpath: s3://bucket/log_json_path.json
  iam_role: arn:aws:iam::000000000000:role/warehouse-loader
  region: us-west-2
"#;

    #[test]
    fn test_config_yaml_parsing() {
        let config: Config = serde_yaml::from_str(VALID_YAML).unwrap();
        assert_eq!(
            config.database.host,
            "cluster.example.us-west-2.redshift.amazonaws.com"
        );
        assert_eq!(config.database.port, 5439);
        assert_eq!(config.storage.log_data_uri, "s3://bucket/log_data");
        assert_eq!(
            config.storage.log_jsonpath.as_deref(),
            Some("s3://bucket/log_json_path.json")
        );
    }

    #[test]
    fn test_jsonpath_is_optional() {
        let yaml = VALID_YAML.replace("  log_jsonpath: s3://bucket/log_json_path.json\n", "");
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.storage.log_jsonpath.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_host() {
        let yaml = VALID_YAML.replace(
            "host: cluster.example.us-west-2.redshift.amazonaws.com",
            "host: \"\"",
        );
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database.host"));
    }

    #[test]
    fn test_validation_rejects_non_s3_uri() {
        let yaml = VALID_YAML.replace("s3://bucket/log_data", "/local/log_data");
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.log_data_uri"));
    }

    #[test]
    fn test_interpolation_braced_and_default() {
        env::set_var("GRANARY_TEST_SET", "hello");
        env::remove_var("GRANARY_TEST_UNSET");
        assert_eq!(interpolate("${GRANARY_TEST_SET}").unwrap(), "hello");
        assert_eq!(
            interpolate("${GRANARY_TEST_UNSET:-fallback}").unwrap(),
            "fallback"
        );
        assert_eq!(interpolate("cost: $$5").unwrap(), "cost: $5");
    }

    #[test]
    fn test_interpolation_missing_var_is_error() {
        env::remove_var("GRANARY_TEST_MISSING");
        let errors = interpolate("password: ${GRANARY_TEST_MISSING}").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("GRANARY_TEST_MISSING"));
    }

    #[test]
    fn test_from_file_interpolates_password() {
        env::set_var("GRANARY_TEST_PASSWORD", "s3cr3t");
        let yaml = VALID_YAML.replace("password: secret", "password: ${GRANARY_TEST_PASSWORD}");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("granary.yaml");
        std::fs::write(&path, yaml).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.database.password, "s3cr3t");
    }
}
