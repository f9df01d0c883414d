use super::schema::PathmarkConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "PATHMARK_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. `$PATHMARK_CONFIG` (must exist when set)
    /// 2. ./pathmark.yaml
    /// 3. ~/.pathmark/config.yaml
    /// 4. Default configuration
    pub async fn load_default() -> Result<PathmarkConfig, ConfigError> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&explicit)).await;
        }

        for candidate in Self::search_paths() {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Self::load_from(&candidate).await;
            }
        }

        debug!("No config file found, using defaults");
        Ok(PathmarkConfig::default())
    }

    /// Files searched by [`load_default`](Self::load_default) when the
    /// environment names none, in order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./pathmark.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".pathmark").join("config.yaml"));
        }
        paths
    }

    /// An empty file yields the defaults.
    pub async fn load_from(path: &Path) -> Result<PathmarkConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = if content.trim().is_empty() {
            PathmarkConfig::default()
        } else {
            serde_yaml::from_str(&content)?
        };
        validate(&config)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}

fn validate(config: &PathmarkConfig) -> Result<(), ConfigError> {
    if config.highlight.border.trim().is_empty() {
        return Err(ConfigError::Invalid("highlight.border must not be empty".into()));
    }
    if config.capture.label_max_chars == 0 {
        return Err(ConfigError::Invalid(
            "capture.label_max_chars must be at least 1".into(),
        ));
    }
    let grouping = &config.grouping;
    for (key, value) in [
        ("workflow", &grouping.workflow),
        ("page", &grouping.page),
        ("section", &grouping.section),
        ("subsection", &grouping.subsection),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "grouping.{} must not be empty",
                key
            )));
        }
    }
    if config.store.path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("store.path must not be empty".into()));
    }
    Ok(())
}
