//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EMLSEARCH_CONFIG` (environment variable)
//! 2. `~/.config/emlsearch/config.toml` (Linux/macOS)
//!    `%APPDATA%\emlsearch\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! The loaded [`Config`] is passed explicitly to the components that need it;
//! nothing here is stored in process-wide state.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::index::StoreOptions;
use crate::scan::ScanOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Index store location and tuning.
    pub index: IndexConfig,
    /// Search defaults.
    pub search: SearchConfig,
    /// Directory scanning.
    pub scan: ScanConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root of the `<client>/<project>/*.eml` tree, when not given on the command line.
    pub root_path: Option<PathBuf>,
    /// `strftime` format string for dates in result listings.
    pub date_format: String,
    /// Override cache directory for the index, logs and history.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Index store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index directory. Defaults to `<cache_dir>/index`.
    pub location: Option<PathBuf>,
    /// Attempts made to take the index lock before giving up.
    pub lock_retries: u32,
    /// Delay between lock attempts, in milliseconds.
    pub lock_retry_delay_ms: u64,
    /// Journal entries accumulated before the index is compacted into a new segment.
    pub compact_after: usize,
    /// Ranking weight of subject matches.
    pub subject_weight: f32,
    /// Ranking weight of body matches.
    pub body_weight: f32,
}

/// Search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results returned by a search.
    pub max_results: usize,
}

/// Directory scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions treated as email files (case-insensitive, without the dot).
    pub extensions: Vec<String>,
    /// Remove index entries whose file disappeared from the scanned root.
    pub prune_missing: bool,
    /// Skip directories whose name starts with a dot.
    pub skip_hidden: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            root_path: None,
            date_format: "%Y-%m-%d %H:%M".to_string(),
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            location: None,
            lock_retries: 3,
            lock_retry_delay_ms: 1000,
            compact_after: 512,
            subject_weight: 2.0,
            body_weight: 1.0,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: 10 }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["eml".to_string()],
            prune_missing: false,
            skip_hidden: true,
        }
    }
}

impl IndexConfig {
    /// Store options derived from this section.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            lock_retries: self.lock_retries.max(1),
            lock_retry_delay: Duration::from_millis(self.lock_retry_delay_ms),
            compact_after: self.compact_after.max(1),
            subject_weight: self.subject_weight,
            body_weight: self.body_weight,
        }
    }
}

impl ScanConfig {
    /// Scan options derived from this section.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            skip_hidden: self.skip_hidden,
            prune_missing: self.prune_missing,
            ..ScanOptions::default()
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EMLSEARCH_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("emlsearch").join("config.toml"))
}

/// Return the cache directory for the index, logs and history.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emlsearch")
}

/// Return the index directory.
pub fn index_location(config: &Config) -> PathBuf {
    config
        .index
        .location
        .clone()
        .unwrap_or_else(|| cache_dir(config).join("index"))
}

/// Return the recently viewed emails file.
pub fn recent_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("recent.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.search.max_results, 10);
        assert_eq!(cfg.index.lock_retries, 3);
        assert_eq!(cfg.index.lock_retry_delay_ms, 1000);
        assert_eq!(cfg.scan.extensions, vec!["eml".to_string()]);
        assert!(!cfg.scan.prune_missing);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.general.date_format, cfg.general.date_format);
        assert_eq!(parsed.index.compact_after, cfg.index.compact_after);
        assert_eq!(parsed.search.max_results, cfg.search.max_results);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[search]
max_results = 25

[scan]
extensions = [".EML", "msg"]
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.search.max_results, 25);
        assert_eq!(cfg.index.lock_retries, 3);
        let scan = cfg.scan.scan_options();
        assert_eq!(scan.extensions, vec!["eml".to_string(), "msg".to_string()]);
    }

    #[test]
    fn test_index_location_follows_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/emlsearch-test"));
        assert_eq!(
            index_location(&cfg),
            PathBuf::from("/tmp/emlsearch-test/index")
        );
        cfg.index.location = Some(PathBuf::from("/srv/idx"));
        assert_eq!(index_location(&cfg), PathBuf::from("/srv/idx"));
    }

    #[test]
    fn test_store_options_clamp_zero_retries() {
        let mut cfg = IndexConfig::default();
        cfg.lock_retries = 0;
        cfg.lock_retry_delay_ms = 20;
        let opts = cfg.store_options();
        assert_eq!(opts.lock_retries, 1);
        assert_eq!(opts.lock_retry_delay, Duration::from_millis(20));
    }
}
