//! Server configuration, loaded from a `kiln.toml` file (spec.md §6
//! "Configuration (recognized options)").

use crate::error::{self, Result};
use serde::Deserialize;
use snafu::ResultExt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileSystemKind {
    Plain,
    Btrfs,
}

impl Default for FileSystemKind {
    fn default() -> Self {
        FileSystemKind::Plain
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Directory of project definitions.
    pub projects_path: PathBuf,
    /// Root for pending/ready/latest/groups.
    pub root_build_path: PathBuf,
    /// Numeric user id passed to the sandbox.
    pub uid: u32,
    /// Selects the `FileSystemDriver` implementation.
    #[serde(default)]
    pub file_system: FileSystemKind,
}

impl Config {
    pub fn from_toml_str(body: &str) -> Result<Self> {
        toml::from_str(body).context(error::LoadConfigSnafu {
            path: PathBuf::from("<string>"),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path).context(error::ReadFileSnafu { path })?;
        toml::from_str(&body).context(error::LoadConfigSnafu { path })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config = Config::from_toml_str(
            r#"
            projects_path = "/var/lib/kiln/projects"
            root_build_path = "/var/lib/kiln/builds"
            uid = 1000
            file_system = "btrfs"
            "#,
        )
        .unwrap();
        assert_eq!(config.uid, 1000);
        assert_eq!(config.file_system, FileSystemKind::Btrfs);
    }

    #[test]
    fn file_system_defaults_to_plain() {
        let config = Config::from_toml_str(
            r#"
            projects_path = "/var/lib/kiln/projects"
            root_build_path = "/var/lib/kiln/builds"
            uid = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.file_system, FileSystemKind::Plain);
    }
}
