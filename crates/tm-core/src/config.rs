//! Configuration types and parsing for tidemark.yml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_MIGRATIONS_PATH: &str = "migrations";

const DEFAULT_DB_PATH: &str = ":memory:";

const DEFAULT_VERSION_TABLE: &str = "tidemark_version";

const DEFAULT_ENVIRONMENT: &str = "development";

/// Main project configuration from tidemark.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Directory containing migration definitions
    #[serde(default = "default_migrations_path")]
    pub migrations_path: String,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Table holding the applied-revision marker
    #[serde(default = "default_version_table")]
    pub version_table: String,

    /// Execution environment passed to every action
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Named target configurations (e.g., dev, staging, prod)
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the DuckDB file, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Target-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Database configuration override
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Environment override
    #[serde(default)]
    pub environment: Option<String>,
}

fn default_migrations_path() -> String {
    DEFAULT_MIGRATIONS_PATH.to_string()
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_version_table() -> String {
    DEFAULT_VERSION_TABLE.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

/// True for a plain SQL identifier (letters, digits, underscore; no leading digit).
fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for tidemark.yml or tidemark.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("tidemark.yml");
        let yaml_path = dir.join("tidemark.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Project name cannot be empty".to_string(),
            });
        }
        if self.migrations_path.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "migrations_path cannot be empty".to_string(),
            });
        }
        if !is_plain_identifier(&self.version_table) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "version_table '{}' must be a plain SQL identifier",
                    self.version_table
                ),
            });
        }
        if self.environment.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "environment cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Absolute path of the migrations directory
    pub fn migrations_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.migrations_path)
    }

    /// Table recording every applied or reverted step
    pub fn log_table(&self) -> String {
        format!("{}_log", self.version_table)
    }

    /// Resolve a target by name, failing if it is not configured
    fn target(&self, name: &str) -> CoreResult<&TargetConfig> {
        self.targets.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.targets.keys().map(String::as_str).collect();
            available.sort_unstable();
            CoreError::ConfigInvalid {
                message: format!(
                    "Unknown target '{}'. Available targets: [{}]",
                    name,
                    available.join(", ")
                ),
            }
        })
    }

    /// Database path for an optional target, resolved against `root`.
    ///
    /// `:memory:` is returned unchanged.
    pub fn database_path(&self, root: &Path, target: Option<&str>) -> CoreResult<String> {
        let raw = match target {
            Some(name) => self
                .target(name)?
                .database
                .as_ref()
                .map(|db| db.path.clone())
                .unwrap_or_else(|| self.database.path.clone()),
            None => self.database.path.clone(),
        };
        if raw == DEFAULT_DB_PATH || Path::new(&raw).is_absolute() {
            Ok(raw)
        } else {
            Ok(root.join(raw).display().to_string())
        }
    }

    /// Environment for an optional target.
    pub fn environment_for(&self, target: Option<&str>) -> CoreResult<String> {
        match target {
            Some(name) => Ok(self
                .target(name)?
                .environment
                .clone()
                .unwrap_or_else(|| self.environment.clone())),
            None => Ok(self.environment.clone()),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
