//! Engine wiring
//!
//! Builds the sync engine from configuration: the SQLite cache, the remote
//! chosen by `remote_url` (or `--memory`), and a connectivity monitor fed by
//! a reachability probe when the remote has a host to probe.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use driftpad_core::connectivity::ProbeHandle;
use driftpad_core::{
    spawn_reachability_probe, Config, ConnectivityMonitor, HttpRemote, MemoryRemote,
    RemoteStore, SqliteCache, SyncEngine, Unreachable,
};

/// A configured engine plus the background tasks it relies on
pub struct Backend {
    pub engine: SyncEngine,
    probe: Option<ProbeHandle>,
}

impl Backend {
    pub fn from_config(config: &Config, memory: bool) -> Result<Self> {
        let cache = SqliteCache::open(config).with_context(|| {
            format!("Failed to open local cache at {}", config.cache_path().display())
        })?;

        let (remote, monitor, probe) = if memory {
            debug!("Using in-process remote");
            let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemote::new());
            (remote, ConnectivityMonitor::new(true), None)
        } else if let Some(url) = config.remote_url.as_deref() {
            let http = HttpRemote::new(url, config.poll_interval())
                .with_context(|| format!("Invalid remote_url '{}'", url))?;
            let monitor = ConnectivityMonitor::new(true);
            let probe = http.probe_target().map(|target| {
                debug!("Probing {} every {:?}", target, config.probe_interval());
                spawn_reachability_probe(monitor.clone(), target, config.probe_interval())
            });
            let remote: Arc<dyn RemoteStore> = Arc::new(http);
            (remote, monitor, probe)
        } else {
            debug!("No remote configured, working locally");
            let remote: Arc<dyn RemoteStore> = Arc::new(Unreachable);
            (remote, ConnectivityMonitor::new(false), None)
        };

        let engine = SyncEngine::new(Arc::new(cache), remote, monitor).with_timing(config.timing());

        Ok(Self { engine, probe })
    }

    /// Stop background tasks
    pub fn shutdown(self) {
        if let Some(probe) = self.probe {
            probe.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_local_only_backend_starts_offline() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Backend::from_config(&test_config(&temp_dir), false).unwrap();

        assert!(!backend.engine.monitor().currently_online());
        assert!(temp_dir.path().join("cache.db").exists());
        backend.shutdown();
    }

    #[tokio::test]
    async fn test_memory_backend_is_online() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Backend::from_config(&test_config(&temp_dir), true).unwrap();

        assert!(backend.engine.monitor().currently_online());
        backend.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_remote_url() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            remote_url: Some("not a url".to_string()),
            ..test_config(&temp_dir)
        };

        assert!(Backend::from_config(&config, false).is_err());
    }
}
