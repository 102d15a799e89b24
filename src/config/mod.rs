//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Result cache settings
    pub cache: CacheSettings,
    /// Recognition engine settings
    pub engine: EngineSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Serve and record recognition results from the cache
    pub enabled: bool,
    /// Directory for the cache store, or empty for the app data dir
    pub directory: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

/// Recognition engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Tesseract binary name or path
    pub binary: String,
    /// Recognition language code
    pub language: String,
    /// Minimum word confidence (0 - 100); lower-scored words are dropped
    pub min_confidence: f32,
    /// Per-request engine deadline in seconds
    pub timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: "eng".to_string(),
            min_confidence: 60.0,
            timeout_secs: 30,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Check cache defaults
        assert!(config.cache.enabled);
        assert!(config.cache.directory.is_none());

        // Check engine defaults
        assert_eq!(config.engine.binary, "tesseract");
        assert_eq!(config.engine.language, "eng");
        assert!((config.engine.min_confidence - 60.0).abs() < 0.01);
        assert_eq!(config.engine.timeout_secs, 30);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        // Serialize to TOML
        let toml_str = toml::to_string_pretty(&config).unwrap();

        // Deserialize back
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        // Verify values match
        assert_eq!(config.cache.enabled, parsed.cache.enabled);
        assert_eq!(config.engine.binary, parsed.engine.binary);
        assert_eq!(config.engine.language, parsed.engine.language);
        assert_eq!(config.engine.timeout_secs, parsed.engine.timeout_secs);
    }

    #[test]
    fn test_config_with_custom_values() {
        let mut config = AppConfig::default();
        config.cache.enabled = false;
        config.cache.directory = Some(PathBuf::from("/tmp/ocr-cache"));
        config.engine.language = "deu".to_string();
        config.engine.min_confidence = 75.0;

        // Serialize and deserialize
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert!(!parsed.cache.enabled);
        assert_eq!(parsed.cache.directory, Some(PathBuf::from("/tmp/ocr-cache")));
        assert_eq!(parsed.engine.language, "deu");
        assert!((parsed.engine.min_confidence - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();

        // Create a temporary file
        let temp_file = NamedTempFile::new().unwrap();

        // Save config
        save_config(&config, temp_file.path()).unwrap();

        // Load config
        let loaded = load_config(temp_file.path()).unwrap();

        // Verify
        assert_eq!(config.cache.enabled, loaded.cache.enabled);
        assert_eq!(config.engine.binary, loaded.engine.binary);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_engine_settings_clone() {
        let settings = EngineSettings {
            binary: "/opt/tesseract/bin/tesseract".to_string(),
            language: "jpn".to_string(),
            min_confidence: 80.0,
            timeout_secs: 10,
        };

        let cloned = settings.clone();
        assert_eq!(settings.binary, cloned.binary);
        assert_eq!(settings.language, cloned.language);
        assert_eq!(settings.timeout_secs, cloned.timeout_secs);
    }
}
