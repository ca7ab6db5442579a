//! Configuration loading and management.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use qz_core::report::DEFAULT_LOG_DAYS;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the database location.
pub const DATABASE_ENV: &str = "QZ_DB";

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Days shown by `log` when `--since` is omitted.
    pub log_days: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("log_days", &self.log_days)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("store.db"),
            log_days: DEFAULT_LOG_DAYS,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `<config dir>/qz/config.toml`, the given
    /// file, `QZ_*` variables, then `QZ_DB`.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("QZ_").ignore(&["DB"]));

        if let Some(path) = database_override(std::env::var_os(DATABASE_ENV)) {
            figment = figment.merge(Serialized::default("database_path", path));
        }

        figment.extract()
    }
}

/// A non-blank `QZ_DB` value.
fn database_override(value: Option<OsString>) -> Option<PathBuf> {
    value
        .filter(|v| !v.to_string_lossy().trim().is_empty())
        .map(PathBuf::from)
}

/// Returns the platform-specific config directory for qz.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("qz"))
}

/// Returns the platform-specific data directory for qz.
///
/// On Linux: `~/.local/share/qz`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("qz"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_qz() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "qz");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("store.db"));
        assert_eq!(config.log_days, 7);
    }

    #[test]
    fn test_blank_override_is_ignored() {
        assert_eq!(database_override(None), None);
        assert_eq!(database_override(Some(OsString::from(""))), None);
        assert_eq!(database_override(Some(OsString::from("   "))), None);
        assert_eq!(
            database_override(Some(OsString::from("/tmp/qz.db"))),
            Some(PathBuf::from("/tmp/qz.db"))
        );
    }

    #[test]
    fn test_config_file_sets_log_days() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "log_days = 30\n").unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.log_days, 30);
    }

    #[test]
    fn test_debug_lists_fields() {
        let config = Config {
            database_path: PathBuf::from("/data/store.db"),
            log_days: 3,
        };
        assert_eq!(
            format!("{config:?}"),
            r#"Config { database_path: "/data/store.db", log_days: 3 }"#
        );
    }
}
