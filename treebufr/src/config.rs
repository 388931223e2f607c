use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_tolerance() -> usize {
    1
}

fn enabled() -> bool {
    true
}

/// Decoder settings, usually read from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Directory holding the table files. Falls back to `BUFR_TABLES_PATH`,
    /// then `./tables`.
    #[serde(default)]
    pub tables_path: Option<PathBuf>,

    /// Allowed difference in bytes between the decoded and declared Data
    /// section length.
    #[serde(default = "default_tolerance")]
    pub bit_count_tolerance_bytes: usize,

    #[serde(default = "enabled")]
    pub validate_bit_count: bool,

    /// Reject messages whose descriptors are not all found in the tables.
    #[serde(default)]
    pub reject_incomplete_schema: bool,

    /// Register table entries carried by category 11 messages.
    #[serde(default = "enabled")]
    pub apply_embedded_tables: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            tables_path: None,
            bit_count_tolerance_bytes: default_tolerance(),
            validate_bit_count: true,
            reject_incomplete_schema: false,
            apply_embedded_tables: true,
        }
    }
}

impl DecoderConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: DecoderConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DecoderConfig = toml::from_str("reject_incomplete_schema = true\n").unwrap();
        assert!(config.reject_incomplete_schema);
        assert_eq!(config.bit_count_tolerance_bytes, 1);
        assert!(config.validate_bit_count);
        assert!(config.apply_embedded_tables);
        assert_eq!(config.tables_path, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("treebufr-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("decoder.toml");

        let config = DecoderConfig {
            tables_path: Some(PathBuf::from("/opt/bufr/tables")),
            bit_count_tolerance_bytes: 2,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        assert_eq!(DecoderConfig::load_from_file(&path).unwrap(), config);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = DecoderConfig::load_from_file("/nonexistent/decoder.toml").unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }
}
