//! Configuration management for graphchat.
//!
//! Loads configuration from ${GRAPHCHAT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `base_url`.
pub const BASE_URL_ENV: &str = "GRAPHCHAT_BASE_URL";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// New comments/sections from the template stay present while the user's
/// values win.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for graphchat configuration and data directories.
    //!
    //! GRAPHCHAT_HOME resolution order:
    //! 1. GRAPHCHAT_HOME environment variable (if set)
    //! 2. ~/.config/graphchat (default)

    use std::path::PathBuf;

    /// Returns the graphchat home directory.
    pub fn graphchat_home() -> PathBuf {
        if let Ok(home) = std::env::var("GRAPHCHAT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".graphchat"),
            |h| h.join(".config").join("graphchat"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        graphchat_home().join("config.toml")
    }

    /// Returns the directory log files are written to.
    pub fn logs_dir() -> PathBuf {
        graphchat_home().join("logs")
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when GRAPHCHAT_LOG is unset
    pub filter: String,
    /// Whether to write log files at all
    pub enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
            enabled: true,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat backend base URL
    pub base_url: String,

    /// Backend model provider id
    pub model: String,

    /// Connect timeout in seconds (0 disables)
    pub connect_timeout_secs: u32,

    /// Snapshot channel capacity between controller and renderer
    pub snapshot_channel_capacity: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    const DEFAULT_BASE_URL: &str = "http://localhost:8000";
    const DEFAULT_MODEL: &str = "openai";
    const DEFAULT_CONNECT_TIMEOUT_SECS: u32 = 10;
    const DEFAULT_SNAPSHOT_CHANNEL_CAPACITY: usize = 128;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the base URL with precedence: env > config.
    ///
    /// # Errors
    /// Returns an error if the winning value is not a valid URL.
    pub fn effective_base_url(&self) -> Result<String> {
        let env_value = std::env::var(BASE_URL_ENV).ok();
        resolve_base_url(env_value.as_deref(), &self.base_url)
    }

    /// Returns the connect timeout, or `None` if disabled.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0)
            .then(|| Duration::from_secs(u64::from(self.connect_timeout_secs)))
    }

    /// Snapshot channel capacity, never zero.
    pub fn snapshot_capacity(&self) -> usize {
        self.snapshot_channel_capacity.max(1)
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Saves only the model field to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or written.
    pub fn save_model_to(path: &Path, model: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["model"] = value(model);

        Self::write_config(path, &doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            connect_timeout_secs: Self::DEFAULT_CONNECT_TIMEOUT_SECS,
            snapshot_channel_capacity: Self::DEFAULT_SNAPSHOT_CHANNEL_CAPACITY,
            logging: LoggingConfig::default(),
        }
    }
}

/// Picks the base URL: a non-blank env value wins over the config value.
///
/// Trailing slashes are stripped so `{base}/chat` joins cleanly.
///
/// # Errors
/// Returns an error if the chosen value is not a valid URL.
pub fn resolve_base_url(env_value: Option<&str>, config_value: &str) -> Result<String> {
    let chosen = env_value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| config_value.trim());

    url::Url::parse(chosen).with_context(|| format!("Invalid base URL: {chosen}"))?;
    Ok(chosen.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.model, "openai");
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(config.logging.enabled);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "model = \"groq\"\n[logging]\nfilter = \"debug\"\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "groq");
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.logging.filter, "debug");
        assert!(config.logging.enabled);
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "model = [").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let parsed: Config = toml::from_str(default_config_template()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.base_url, defaults.base_url);
        assert_eq!(parsed.model, defaults.model);
        assert_eq!(parsed.connect_timeout_secs, defaults.connect_timeout_secs);
        assert_eq!(
            parsed.snapshot_channel_capacity,
            defaults.snapshot_channel_capacity
        );
        assert_eq!(parsed.logging.filter, defaults.logging.filter);
    }

    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        assert!(config_path.exists());
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("base_url = \"http://localhost:8000\""));
        assert!(contents.contains("# Backend model provider id"));
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "").unwrap();

        assert!(Config::init(&config_path).is_err());
    }

    #[test]
    fn test_save_model_preserves_user_values_and_comments() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "base_url = \"http://graph.example:9000\"\n").unwrap();

        Config::save_model_to(&config_path, "anthropic").unwrap();

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# Backend model provider id"));
        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.model, "anthropic");
        assert_eq!(config.base_url, "http://graph.example:9000");
    }

    #[test]
    fn test_connect_timeout_zero_disables() {
        let config = Config {
            connect_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(
            Config::default().connect_timeout(),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_snapshot_capacity_never_zero() {
        let config = Config {
            snapshot_channel_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.snapshot_capacity(), 1);
    }

    #[test]
    fn test_resolve_base_url_env_wins_over_config() {
        assert_eq!(
            resolve_base_url(Some("http://env.example/"), "http://config.example").unwrap(),
            "http://env.example"
        );
        assert_eq!(
            resolve_base_url(Some("   "), "http://config.example").unwrap(),
            "http://config.example"
        );
        assert_eq!(
            resolve_base_url(None, "http://config.example").unwrap(),
            "http://config.example"
        );
    }

    #[test]
    fn test_resolve_base_url_rejects_garbage() {
        let err = resolve_base_url(None, "not a url").unwrap_err();
        assert!(err.to_string().contains("Invalid base URL"));
    }
}
