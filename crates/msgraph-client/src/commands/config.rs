//! Configuration commands.

use std::path::Path;

use colored::Colorize;
use tracing::info;

use super::success;
use crate::config::ConfigFile;
use crate::error::ClientResult;

/// Prints the configuration file with the client secret masked.
pub fn show(path: &Path, config: &ConfigFile) -> ClientResult<()> {
    if config.is_empty() {
        println!("{}", format!("No configuration set ({}).", path.display()).yellow());
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}

/// Sets a key and saves the file.
pub fn set(path: &Path, mut config: ConfigFile, key: &str, value: &str) -> ClientResult<()> {
    config.set(key, value)?;
    config.save_to(path)?;
    info!("set {} in {}", key, path.display());
    success(&format!("Set {}.", key));
    Ok(())
}

/// Removes a key and saves the file if it was present.
pub fn unset(path: &Path, mut config: ConfigFile, key: &str) -> ClientResult<()> {
    if !config.unset(key)? {
        println!("{}", format!("{} is not set.", key).yellow());
        return Ok(());
    }
    config.save_to(path)?;
    info!("removed {} from {}", key, path.display());
    success(&format!("Removed {}.", key));
    Ok(())
}

/// Shows the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG_FILE, TIMEZONE};

    #[test]
    fn set_and_unset_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        set(&path, ConfigFile::load_from(&path), TIMEZONE, "Asia/Tokyo").unwrap();
        assert_eq!(ConfigFile::load_from(&path).get(TIMEZONE), Some("Asia/Tokyo"));

        unset(&path, ConfigFile::load_from(&path), TIMEZONE).unwrap();
        assert!(ConfigFile::load_from(&path).is_empty());
    }

    #[test]
    fn unknown_key_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        assert!(set(&path, ConfigFile::default(), "color", "blue").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn unset_missing_key_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        unset(&path, ConfigFile::default(), TIMEZONE).unwrap();
        assert!(!path.exists());
    }
}
