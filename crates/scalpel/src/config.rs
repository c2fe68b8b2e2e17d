//! Configuration loading.
//!
//! Settings come from `scalpel.toml` in the working directory, falling back
//! to the user configuration directory; command-line flags override both.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use etcetera::{BaseStrategy, choose_base_strategy};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "scalpel.toml";

/// Default output directory for reconstructed slices.
pub const DEFAULT_OUTPUT_DIR: &str = "slice";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directories searched for `*.ast.json` compilation units, in addition
    /// to the criterion file's own directory.
    pub include: Vec<PathBuf>,
    /// Where reconstructed files are written. Defaults to `./slice/`.
    pub output: Option<PathBuf>,
    /// Enable the exception-sensitive graph variant.
    pub exception_sensitive: bool,
}

impl Config {
    /// Load from an explicit file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load the nearest configuration: `./scalpel.toml` if present, then the
    /// user config directory, then built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.is_file() {
            log::debug!("loading configuration from {}", local.display());
            return Self::from_file(&local);
        }
        if let Ok(strategy) = choose_base_strategy() {
            let user = strategy.config_dir().join("scalpel").join(CONFIG_FILE);
            if user.is_file() {
                log::debug!("loading configuration from {}", user.display());
                return Self::from_file(&user);
            }
        }
        Ok(Self::default())
    }

    /// Resolved output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_are_empty() {
        let config = Config::default();
        assert!(config.include.is_empty());
        assert!(!config.exception_sensitive);
        assert_eq!(config.output_dir(), PathBuf::from("slice"));
    }

    #[test]
    fn toml_round_trip() {
        let config: Config = toml::from_str(
            r#"
            include = ["lib", "vendor/acme"]
            output = "out"
            exception_sensitive = true
            "#,
        )
        .expect("valid config");
        assert_eq!(config.include, vec![PathBuf::from("lib"), PathBuf::from("vendor/acme")]);
        assert_eq!(config.output_dir(), PathBuf::from("out"));
        assert!(config.exception_sensitive);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = toml::from_str::<Config>("exception_sensible = true");
        assert!(err.is_err());
    }

    #[test]
    fn from_file_reports_missing_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = Config::from_file(&dir.path().join("nope.toml"));
        assert!(err.is_err());
    }
}
