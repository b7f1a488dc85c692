//! Locker configuration via `txlocker.toml`
//!
//! A small config file next to the application, same model as a database
//! config file: on first open a commented default is written, and changing
//! settings means editing the file and restarting.

use serde::{Deserialize, Serialize};
use std::path::Path;
use txlocker_core::{Error, Result, TxOptions};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "txlocker.toml";

/// Locker configuration loaded from `txlocker.toml`
///
/// # Example
///
/// ```toml
/// driver = "postgres"
///
/// [transaction]
/// isolation = "serializable"
/// read_only = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockerConfig {
    /// Driver identifier reported by `Locker::driver_name`
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Options used when a lineage begins its transaction
    #[serde(default)]
    pub transaction: TxOptions,
}

fn default_driver() -> String {
    "sql".to_string()
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            transaction: TxOptions::default(),
        }
    }
}

impl LockerConfig {
    /// Check field values
    ///
    /// # Errors
    ///
    /// `Error::InvalidConfig` if the driver name is blank.
    pub fn validate(&self) -> Result<()> {
        if self.driver.trim().is_empty() {
            return Err(Error::invalid_config("driver must not be empty"));
        }
        Ok(())
    }

    /// Parse and validate config text
    pub fn parse(content: &str) -> Result<Self> {
        let config: LockerConfig = toml::from_str(content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# txlocker configuration
#
# Driver identifier, reported by the locker for diagnostics.
driver = "sql"

# Options used when a request begins its transaction.
[transaction]
# Isolation level: "read_uncommitted", "read_committed",
# "repeatable_read" or "serializable". Omit for the driver default.
# isolation = "read_committed"
read_only = false
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// `Error::Io` if the file cannot be read, `Error::InvalidConfig` if it
    /// does not parse or validate.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            Error::InvalidConfig(msg) => {
                Error::invalid_config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::invalid_config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use txlocker_core::IsolationLevel;

    #[test]
    fn default_config_uses_generic_driver() {
        let config = LockerConfig::default();
        assert_eq!(config.driver, "sql");
        assert_eq!(config.transaction, TxOptions::default());
        config.validate().unwrap();
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config = LockerConfig::parse(LockerConfig::default_toml()).unwrap();
        assert_eq!(config, LockerConfig::default());
    }

    #[test]
    fn parse_transaction_section() {
        let config = LockerConfig::parse(
            r#"
driver = "postgres"

[transaction]
isolation = "repeatable_read"
read_only = true
"#,
        )
        .unwrap();
        assert_eq!(config.driver, "postgres");
        assert_eq!(config.transaction.isolation, Some(IsolationLevel::RepeatableRead));
        assert!(config.transaction.read_only);
    }

    #[test]
    fn parse_unknown_isolation_returns_error() {
        let err = LockerConfig::parse("[transaction]\nisolation = \"chaos\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn blank_driver_is_rejected() {
        let err = LockerConfig::parse("driver = \"  \"").unwrap_err();
        assert!(err.to_string().contains("driver must not be empty"));
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        LockerConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = LockerConfig::from_file(&path).unwrap();
        assert_eq!(config.driver, "sql");
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "driver = \"mysql\"\n").unwrap();
        LockerConfig::write_default_if_missing(&path).unwrap();

        let config = LockerConfig::from_file(&path).unwrap();
        assert_eq!(config.driver, "mysql");
    }

    #[test]
    fn from_file_with_missing_fields_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();

        let config = LockerConfig::from_file(&path).unwrap();
        assert_eq!(config, LockerConfig::default());
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = LockerConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn from_file_parse_error_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "driver = [").unwrap();

        let err = LockerConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let config = LockerConfig {
            driver: "sqlite3".to_string(),
            transaction: TxOptions::new()
                .with_isolation(IsolationLevel::Serializable)
                .read_only(),
        };
        config.write_to_file(&path).unwrap();

        let loaded = LockerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn isolation_is_omitted_when_unset() {
        let toml_str = toml::to_string_pretty(&LockerConfig::default()).unwrap();
        assert!(!toml_str.contains("isolation"));
    }
}
