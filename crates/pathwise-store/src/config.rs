//! Runtime configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level pathwise configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwiseConfig {
    /// Buffer size of the live event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Progress snapshots retained per (deployment, element, student).
    #[serde(default = "default_progress_history")]
    pub progress_history: usize,
    /// Output directory for simulation reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Deployment id used when none is given on the command line.
    #[serde(default)]
    pub default_deployment: Option<String>,
    /// Tracing filter directive, e.g. `pathwise=debug`.
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_event_capacity() -> usize {
    256
}
fn default_progress_history() -> usize {
    50
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./pathwise-results")
}

impl Default for PathwiseConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            progress_history: default_progress_history(),
            output_dir: default_output_dir(),
            default_deployment: None,
            log_filter: None,
        }
    }
}

impl PathwiseConfig {
    /// The configured default deployment, if it is set and a valid uuid.
    pub fn default_deployment_id(&self) -> Result<Option<Uuid>> {
        self.default_deployment
            .as_deref()
            .map(|d| {
                d.parse::<Uuid>()
                    .with_context(|| format!("default_deployment is not a uuid: {d}"))
            })
            .transpose()
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `pathwise.toml` in the current directory
/// 2. `~/.config/pathwise/config.toml`
///
/// Environment variable override: `PATHWISE_OUTPUT_DIR`.
pub fn load_config() -> Result<PathwiseConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<PathwiseConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("pathwise.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<PathwiseConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => PathwiseConfig::default(),
    };

    if let Ok(dir) = std::env::var("PATHWISE_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }

    config.output_dir = PathBuf::from(resolve_env_vars(&config.output_dir.to_string_lossy()));
    config.default_deployment = config.default_deployment.as_deref().map(resolve_env_vars);
    config.log_filter = config.log_filter.as_deref().map(resolve_env_vars);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("pathwise"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_PATHWISE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_PATHWISE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_PATHWISE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("unterminated ${"), "unterminated ${");
        std::env::remove_var("_PATHWISE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = PathwiseConfig::default();
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.progress_history, 50);
        assert_eq!(config.output_dir, PathBuf::from("./pathwise-results"));
        assert!(config.default_deployment_id().unwrap().is_none());
    }

    #[test]
    fn parse_partial_config() {
        let toml_str = r#"
progress_history = 10
default_deployment = "0190f2a4-0000-7000-8000-000000000001"
"#;
        let config: PathwiseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.progress_history, 10);
        assert_eq!(config.event_capacity, 256);
        assert!(config.default_deployment_id().unwrap().is_some());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/pathwise.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pathwise.toml");
        std::fs::write(&path, "event_capacity = 8\nlog_filter = \"pathwise=debug\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.log_filter.as_deref(), Some("pathwise=debug"));
    }
}
