//! Configuration loading.
//!
//! Reads an optional `config.toml` from the platform config directory.
//! Every field has a default, so a missing or partial file is fine.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::reminder::DEFAULT_SNOOZE_MINUTES;
use crate::validation::DEFAULT_NAME_LIMIT;
use crate::view::DEFAULT_SUMMARY_WIDTH;

pub const CONFIG_FILE: &str = "config.toml";
pub const SNAPSHOT_FILE: &str = "persistent_save.bin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the auto-saved snapshot lives
    pub snapshot_path: PathBuf,

    /// Delay before a snoozed reminder fires again, at least one minute
    pub snooze_minutes: u32,

    /// Longest accepted task name
    pub name_limit: usize,

    /// Width budget for `name + description` in list rows
    pub description_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            name_limit: DEFAULT_NAME_LIMIT,
            description_width: DEFAULT_SUMMARY_WIDTH,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "tasklist")
}

fn default_snapshot_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(SNAPSHOT_FILE))
        .unwrap_or_else(|| PathBuf::from(SNAPSHOT_FILE))
}

/// Location of the user's config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

impl Config {
    /// Loads `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        if config.snooze_minutes == 0 {
            return Err(Error::validation(format!(
                "{}: snooze_minutes must be at least 1",
                path.display()
            )));
        }
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Loads the default config file if there is one.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn snooze(&self) -> time::Duration {
        time::Duration::minutes(i64::from(self.snooze_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.snooze_minutes, 5);
        assert_eq!(config.name_limit, 25);
        assert!(config.snapshot_path.ends_with(SNAPSHOT_FILE));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "snooze_minutes = 10\nsnapshot_path = \"/tmp/tasks.bin\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.snooze_minutes, 10);
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/tasks.bin"));
        assert_eq!(config.description_width, 33);
        assert_eq!(config.snooze(), time::Duration::minutes(10));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "snooze_minutes = \"soon\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn snooze_must_be_positive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        fs::write(&path, "snooze_minutes = 0").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Validation(_))));

        fs::write(&path, "snooze_minutes = -3").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
