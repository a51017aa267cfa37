//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/driftpad/config.toml)
//! 3. Environment variables (DRIFTPAD_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "DRIFTPAD";

const DEFAULT_DEBOUNCE_MS: u64 = 1000;
const DEFAULT_QUIET_PERIOD_MS: u64 = 500;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 5;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (cache database, logs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the remote document store (optional)
    ///
    /// Without one the engine works purely from the local cache.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Delay between the last edit and the remote push
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Minimum quiet time since the last edit before a push goes out
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,

    /// How often remote subscriptions poll for changes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the reachability probe checks the remote host
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Log file path (defaults to stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Timing knobs of a sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTiming {
    /// Debounce window armed on every edit
    pub debounce: Duration,
    /// Minimum time since the last edit when the debounce fires
    pub quiet_period: Duration,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            remote_url: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DRIFTPAD_DATA_DIR, DRIFTPAD_REMOTE_URL, ...)
    /// 2. Config file (~/.config/driftpad/config.toml or DRIFTPAD_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Empty string clears the remote
        if let Ok(val) = std::env::var(format!("{}_REMOTE_URL", ENV_PREFIX)) {
            self.remote_url = if val.is_empty() { None } else { Some(val) };
        }

        if let Some(ms) = env_millis("DEBOUNCE_MS") {
            self.debounce_ms = ms;
        }

        if let Some(ms) = env_millis("QUIET_PERIOD_MS") {
            self.quiet_period_ms = ms;
        }

        if let Some(ms) = env_millis("POLL_INTERVAL_MS") {
            self.poll_interval_ms = ms;
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with DRIFTPAD_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("driftpad")
            .join("config.toml")
    }

    /// Get the path to the cache database
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache.db")
    }

    /// Session timing derived from this configuration
    pub fn timing(&self) -> SyncTiming {
        SyncTiming {
            debounce: Duration::from_millis(self.debounce_ms),
            quiet_period: Duration::from_millis(self.quiet_period_ms),
        }
    }

    /// Interval between subscription polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Interval between reachability probes
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }
}

/// Read a `DRIFTPAD_{name}` millisecond override, ignoring unparsable values
fn env_millis(name: &str) -> Option<u64> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name))
        .ok()
        .and_then(|val| val.trim().parse().ok())
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("driftpad")
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_quiet_period_ms() -> u64 {
    DEFAULT_QUIET_PERIOD_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_probe_interval_secs() -> u64 {
    DEFAULT_PROBE_INTERVAL_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "DRIFTPAD_DATA_DIR",
        "DRIFTPAD_REMOTE_URL",
        "DRIFTPAD_DEBOUNCE_MS",
        "DRIFTPAD_QUIET_PERIOD_MS",
        "DRIFTPAD_POLL_INTERVAL_MS",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.remote_url.is_none());
        assert!(config.data_dir.ends_with("driftpad"));
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.quiet_period_ms, 500);
        assert!(config.cache_path().ends_with("cache.db"));
    }

    #[test]
    fn test_timing() {
        let config = Config {
            debounce_ms: 250,
            quiet_period_ms: 100,
            ..Config::default()
        };
        let timing = config.timing();
        assert_eq!(timing.debounce, Duration::from_millis(250));
        assert_eq!(timing.quiet_period, Duration::from_millis(100));
        assert_eq!(SyncTiming::default(), Config::default().timing());
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("DRIFTPAD_DATA_DIR", "/tmp/driftpad-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/driftpad-test"));
    }

    #[test]
    fn test_env_override_remote_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("DRIFTPAD_REMOTE_URL", "https://pad.example.com");
        config.apply_env_overrides();
        assert_eq!(
            config.remote_url,
            Some("https://pad.example.com".to_string())
        );

        // Empty string clears it
        env::set_var("DRIFTPAD_REMOTE_URL", "");
        config.apply_env_overrides();
        assert!(config.remote_url.is_none());
    }

    #[test]
    fn test_env_override_timing() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("DRIFTPAD_DEBOUNCE_MS", "1500");
        env::set_var("DRIFTPAD_QUIET_PERIOD_MS", "not a number");
        config.apply_env_overrides();

        assert_eq!(config.debounce_ms, 1500);
        assert_eq!(config.quiet_period_ms, 500);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            remote_url = "https://pad.example.com"
            debounce_ms = 2000
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(
            config.remote_url,
            Some("https://pad.example.com".to_string())
        );
        assert_eq!(config.debounce_ms, 2000);
        // Unset fields fall back to defaults
        assert_eq!(config.quiet_period_ms, 500);
        assert_eq!(config.poll_interval_ms, 2000);
    }

    #[test]
    fn test_save_and_load_path() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config").join("config.toml");

        let config = Config {
            data_dir: temp_dir.path().join("data"),
            remote_url: Some("https://pad.example.com".to_string()),
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.remote_url, config.remote_url);
        assert!(loaded.data_dir.exists());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("DRIFTPAD_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(config.remote_url.is_none());
        assert_eq!(config.debounce_ms, 1000);
    }
}
