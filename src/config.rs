//! Configuration file parser for ~/.config/shopfilter/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::filter::{CategoryId, ControllerOptions, ItemType, SortKey};
use crate::page::CategoryOption;
use crate::transport::TransportConfig;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// A category offered in the filter panel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryEntry {
    pub id: CategoryId,
    pub name: String,
}

/// Top-level application configuration.
///
/// Every field has a default, so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storefront origin, e.g. `https://shop.example.com`.
    pub base_url: String,

    /// Path of the filtered listing endpoint.
    pub filter_path: String,

    /// Path of the advisory count endpoint.
    pub count_path: String,

    /// What the listing shows: `products` or `categories`.
    pub item_type: ItemType,

    /// Sort order used until the user picks another.
    pub default_sort: SortKey,

    /// Search debounce window in milliseconds.
    pub debounce_ms: u64,

    /// Per-request timeout in milliseconds. 0 = wait indefinitely.
    pub request_timeout_ms: u64,

    /// Refresh the listing as soon as a category is toggled.
    pub filter_on_category_select: bool,

    /// Show the advisory "N products" count for the selection.
    pub advisory_counts: bool,

    /// Categories offered in the filter panel.
    pub categories: Vec<CategoryEntry>,
}

impl Default for Config {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            base_url: transport.base_url,
            filter_path: transport.filter_path,
            count_path: transport.count_path,
            item_type: ItemType::Products,
            default_sort: SortKey::default(),
            debounce_ms: 300,
            request_timeout_ms: 0,
            filter_on_category_select: true,
            advisory_counts: true,
            categories: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Upper bound for `debounce_ms`; anything longer feels broken.
    const MAX_DEBOUNCE_MS: u64 = 5_000;

    const KNOWN_KEYS: [&'static str; 10] = [
        "base_url",
        "filter_path",
        "count_path",
        "item_type",
        "default_sort",
        "debounce_ms",
        "request_timeout_ms",
        "filter_on_category_select",
        "advisory_counts",
        "categories",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            base_url = %config.base_url,
            item_type = config.item_type.as_str(),
            categories = config.categories.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {}", self.base_url, e)))?;

        for (name, path) in [("filter_path", &self.filter_path), ("count_path", &self.count_path)] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "{} must start with '/', got '{}'",
                    name, path
                )));
            }
        }

        if self.debounce_ms > Self::MAX_DEBOUNCE_MS {
            return Err(ConfigError::Invalid(format!(
                "debounce_ms is {} (max {})",
                self.debounce_ms,
                Self::MAX_DEBOUNCE_MS
            )));
        }

        let mut seen: Vec<&CategoryId> = Vec::with_capacity(self.categories.len());
        for entry in &self.categories {
            if seen.contains(&&entry.id) {
                return Err(ConfigError::Invalid(format!(
                    "category id '{}' listed twice",
                    entry.id
                )));
            }
            seen.push(&entry.id);
        }
        Ok(())
    }

    // ========================================================================
    // Derived Settings
    // ========================================================================

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.base_url.clone(),
            filter_path: self.filter_path.clone(),
            count_path: self.count_path.clone(),
            ..TransportConfig::default()
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            item_type: self.item_type,
            default_sort: self.default_sort,
            debounce: Duration::from_millis(self.debounce_ms),
            request_timeout: (self.request_timeout_ms > 0)
                .then(|| Duration::from_millis(self.request_timeout_ms)),
            filter_on_category_select: self.filter_on_category_select,
            advisory_counts: self.advisory_counts,
        }
    }

    pub fn category_options(&self) -> Vec<CategoryOption> {
        self.categories
            .iter()
            .map(|entry| CategoryOption {
                id: entry.id.clone(),
                name: entry.name.clone(),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.item_type, ItemType::Products);
        assert_eq!(config.default_sort, SortKey::NameAsc);
        assert_eq!(config.debounce_ms, 300);
        assert!(config.filter_on_category_select);
        assert!(config.advisory_counts);
        assert!(config.categories.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/shopfilter_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.debounce_ms, 300);
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::parse("   \n  \n  ").unwrap();
        assert_eq!(config.filter_path, Config::default().filter_path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
base_url = "https://shop.example.com"
filter_path = "/catalog/"
count_path = "/catalog/count/"
item_type = "categories"
default_sort = "-price"
debounce_ms = 250
request_timeout_ms = 8000
filter_on_category_select = false
advisory_counts = false

[[categories]]
id = "3"
name = "Boots"

[[categories]]
id = 7
name = "Sandals"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.base_url, "https://shop.example.com");
        assert_eq!(config.item_type, ItemType::Categories);
        assert_eq!(config.default_sort, SortKey::PriceDesc);
        assert_eq!(
            config.category_options(),
            vec![
                CategoryOption {
                    id: CategoryId::from("3"),
                    name: "Boots".to_string(),
                },
                CategoryOption {
                    id: CategoryId::from("7"),
                    name: "Sandals".to_string(),
                },
            ]
        );

        let options = config.controller_options();
        assert_eq!(options.debounce, Duration::from_millis(250));
        assert_eq!(options.request_timeout, Some(Duration::from_secs(8)));
        assert!(!options.filter_on_category_select);
        assert!(!options.advisory_counts);

        let transport = config.transport_config();
        assert_eq!(transport.filter_path, "/catalog/");
        assert_eq!(transport.count_path, "/catalog/count/");
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let config = Config::parse("request_timeout_ms = 0\n").unwrap();
        assert_eq!(config.controller_options().request_timeout, None);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_sort_rejected() {
        let err = Config::parse("default_sort = \"popularity\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
debounce_ms = 200
totally_fake_key = "should not fail"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.debounce_ms, 200);
    }

    #[test]
    fn test_validation_errors() {
        for content in [
            "base_url = \"not a url\"\n",
            "filter_path = \"products/\"\n",
            "debounce_ms = 60000\n",
            "[[categories]]\nid = \"1\"\nname = \"A\"\n[[categories]]\nid = 1\nname = \"B\"\n",
        ] {
            let err = Config::parse(content).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{content}");
        }
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("shopfilter_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_reads_file() {
        let dir = std::env::temp_dir().join("shopfilter_config_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "debounce_ms = 120\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.debounce_ms, 120);

        std::fs::remove_dir_all(&dir).ok();
    }
}
