//! Settings - workspace location, file paths and execution tuning
//!
//! Read from an optional YAML file. Every key may be omitted.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    COLLECTIONS_FILE, DEFAULT_TIMEOUT_SECS, LOG_FILE, SETTINGS_FILE, WORKSPACE_DIR_NAME,
};

/// How `stop` interrupts an in-flight request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelStrategy {
    /// The call races the cancellation token and is dropped when it fires.
    #[default]
    Preemptive,
    /// The token is only checked right before dispatch and right after the call returns.
    Cooperative,
}

/// Raw file contents; everything optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    workspace_dir: Option<PathBuf>,
    collections_file: Option<PathBuf>,
    log_file: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    cancel_strategy: Option<CancelStrategy>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub workspace_dir: PathBuf,
    pub collections_file: PathBuf,
    pub log_file: PathBuf,
    pub request_timeout: Duration,
    pub cancel_strategy: CancelStrategy,
}

pub fn default_workspace_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(WORKSPACE_DIR_NAME)
}

impl Default for Settings {
    fn default() -> Self {
        Settings::in_dir(default_workspace_dir())
    }
}

impl Settings {
    /// Default settings rooted at `workspace_dir`
    pub fn in_dir(workspace_dir: impl Into<PathBuf>) -> Self {
        let workspace_dir = workspace_dir.into();
        Settings {
            collections_file: workspace_dir.join(COLLECTIONS_FILE),
            log_file: workspace_dir.join(LOG_FILE),
            workspace_dir,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cancel_strategy: CancelStrategy::default(),
        }
    }

    /// Loads settings from `path`, or from the default workspace's settings
    /// file when `path` is `None`. A missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_workspace_dir().join(SETTINGS_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Settings::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Settings::from_yaml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: SettingsFile = if text.trim().is_empty() {
            SettingsFile::default()
        } else {
            serde_yaml::from_str(text)?
        };

        let workspace_dir = file.workspace_dir.unwrap_or_else(default_workspace_dir);
        let resolve = |p: Option<PathBuf>, default: &str| match p {
            Some(p) if p.is_relative() => workspace_dir.join(p),
            Some(p) => p,
            None => workspace_dir.join(default),
        };

        let timeout = file.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        anyhow::ensure!(timeout > 0, "request_timeout_secs must be positive");

        Ok(Settings {
            collections_file: resolve(file.collections_file, COLLECTIONS_FILE),
            log_file: resolve(file.log_file, LOG_FILE),
            workspace_dir,
            request_timeout: Duration::from_secs(timeout),
            cancel_strategy: file.cancel_strategy.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_relative_paths_resolve_against_workspace() {
        let settings = Settings::from_yaml(
            "workspace_dir: /srv/apiary\ncollections_file: data/c.json\nlog_file: /var/log/apiary.log\ncancel_strategy: cooperative\nrequest_timeout_secs: 5\n",
        )
        .unwrap();
        assert_eq!(settings.collections_file, PathBuf::from("/srv/apiary/data/c.json"));
        assert_eq!(settings.log_file, PathBuf::from("/var/log/apiary.log"));
        assert_eq!(settings.cancel_strategy, CancelStrategy::Cooperative);
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::from_yaml("workspace_dir: /tmp/ws").unwrap();
        assert_eq!(settings, Settings::in_dir("/tmp/ws"));
        assert_eq!(settings.cancel_strategy, CancelStrategy::Preemptive);
    }

    #[test]
    fn test_rejects_unknown_keys_and_zero_timeout() {
        assert!(Settings::from_yaml("colections_file: x.json").is_err());
        assert!(Settings::from_yaml("request_timeout_secs: 0").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.yaml"))).is_err());
    }
}
