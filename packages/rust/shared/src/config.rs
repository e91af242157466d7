//! Application configuration for WikiScope.
//!
//! User config lives at `~/.wikiscope/wikiscope.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WikiScopeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "wikiscope.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".wikiscope";

// ---------------------------------------------------------------------------
// Config structs (matching wikiscope.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Store locations.
    #[serde(default)]
    pub stores: StoresConfig,

    /// Rebuild tunables.
    #[serde(default)]
    pub rebuild: RebuildDefaults,
}

/// `[stores]` section. Connection configuration is opaque to the pipeline;
/// in this build both stores are embedded libSQL databases addressed by path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoresConfig {
    /// Path to the wiki replica database (read-only).
    #[serde(default = "default_wiki_db")]
    pub wiki_db: String,

    /// Path to the index database (read-write).
    #[serde(default = "default_index_db")]
    pub index_db: String,
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            wiki_db: default_wiki_db(),
            index_db: default_index_db(),
        }
    }
}

fn default_wiki_db() -> String {
    "~/.wikiscope/wiki.db".into()
}
fn default_index_db() -> String {
    "~/.wikiscope/index.db".into()
}

/// `[rebuild]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildDefaults {
    /// Rows per bulk-insert statement during Batching.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-query timeout in seconds for both stores.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for RebuildDefaults {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_batch_size() -> usize {
    10_000
}
fn default_query_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Rebuild config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime rebuild configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RebuildConfig {
    /// Rows per bulk-insert statement.
    pub batch_size: usize,
    /// Per-query timeout applied to every store query.
    pub query_timeout: Duration,
}

impl From<&AppConfig> for RebuildConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch_size: config.rebuild.batch_size,
            query_timeout: Duration::from_secs(config.rebuild.query_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.wikiscope/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| WikiScopeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.wikiscope/wikiscope.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| WikiScopeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        WikiScopeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| WikiScopeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| WikiScopeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| WikiScopeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` in a configured store path.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| WikiScopeError::config("could not determine home directory"))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("wiki_db"));
        assert!(toml_str.contains("batch_size"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.rebuild.batch_size, 10_000);
        assert_eq!(parsed.rebuild.query_timeout_secs, 30);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[stores]
wiki_db = "/srv/replica/enwiki.db"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.stores.wiki_db, "/srv/replica/enwiki.db");
        assert_eq!(config.stores.index_db, "~/.wikiscope/index.db");
        assert_eq!(config.rebuild.batch_size, 10_000);
    }

    #[test]
    fn rebuild_config_from_app_config() {
        let app = AppConfig::default();
        let rebuild = RebuildConfig::from(&app);
        assert_eq!(rebuild.batch_size, 10_000);
        assert_eq!(rebuild.query_timeout, Duration::from_secs(30));
    }

    #[test]
    fn expand_path_handles_tilde() {
        let absolute = expand_path("/srv/wiki.db").expect("absolute path");
        assert_eq!(absolute, PathBuf::from("/srv/wiki.db"));

        let expanded = expand_path("~/.wikiscope/wiki.db").expect("tilde path");
        assert!(expanded.is_absolute());
        assert!(expanded.ends_with(".wikiscope/wiki.db"));
    }
}
