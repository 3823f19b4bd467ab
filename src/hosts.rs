//! In-memory host store
//!
//! Holds the host override records in persistence order. The store is
//! rebuilt wholesale by a periodic refresh; readers keep working off the
//! snapshot they loaded.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use log::{error, info};
use tokio::sync::Notify;

use crate::models::InboundHost;
use crate::settings::Settings;

/// Persistence collaborator the store refreshes from. The control plane's
/// database layer implements this.
pub trait HostSource {
    fn load_hosts(&self) -> impl Future<Output = Result<Vec<InboundHost>, String>> + Send;
}

#[derive(Debug, Default)]
pub struct HostStore {
    snapshot: ArcSwap<Vec<InboundHost>>,
    shutdown: Notify,
}

impl HostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, in insertion order.
    pub fn hosts(&self) -> Arc<Vec<InboundHost>> {
        self.snapshot.load_full()
    }

    /// Publish a replacement host set.
    pub fn replace(&self, hosts: Vec<InboundHost>) {
        info!("host store refreshed, {} host(s)", hosts.len());
        self.snapshot.store(Arc::new(hosts));
    }

    /// Pull a fresh host set from persistence. A failed load keeps the
    /// previous snapshot in place.
    pub async fn refresh<S: HostSource>(&self, source: &S) {
        match source.load_hosts().await {
            Ok(hosts) => self.replace(hosts),
            Err(err) => error!("host refresh failed, keeping previous snapshot: {}", err),
        }
    }

    /// Refresh at the configured `host_refresh_interval` until `stop` is
    /// called. Missed ticks coalesce into one.
    pub async fn run_refresh_loop<S: HostSource>(&self, source: &S) {
        let interval = Duration::from_secs(Settings::current().host_refresh_interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh(source).await,
                _ = self.shutdown.notified() => break,
            }
        }
        info!("host refresh loop stopped");
    }

    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }
}

/// Host records stored as a JSON array in a file. Each refresh re-reads the
/// file, so edits show up without a restart.
pub struct FileHostSource {
    path: PathBuf,
}

impl FileHostSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileHostSource { path: path.into() }
    }
}

impl HostSource for FileHostSource {
    async fn load_hosts(&self) -> Result<Vec<InboundHost>, String> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| format!("{}: {}", self.path.display(), e))?;
        serde_json::from_str(&raw).map_err(|e| format!("{}: {}", self.path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource(Vec<InboundHost>);

    impl HostSource for StaticSource {
        async fn load_hosts(&self) -> Result<Vec<InboundHost>, String> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl HostSource for FailingSource {
        async fn load_hosts(&self) -> Result<Vec<InboundHost>, String> {
            Err("db unreachable".to_string())
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let store = HostStore::new();
        let source = StaticSource(vec![InboundHost::for_tag("a"), InboundHost::for_tag("b")]);
        store.refresh(&source).await;

        let hosts = store.hosts();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].inbound_tag, "a");
        assert_eq!(hosts[1].inbound_tag, "b");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let store = HostStore::new();
        store.replace(vec![InboundHost::for_tag("a")]);
        store.refresh(&FailingSource).await;
        assert_eq!(store.hosts().len(), 1);
    }

    #[tokio::test]
    async fn test_file_source_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.json");
        let hosts = vec![InboundHost::for_tag("a")];
        std::fs::write(&path, serde_json::to_string(&hosts).unwrap()).unwrap();

        let store = HostStore::new();
        store.refresh(&FileHostSource::new(&path)).await;
        assert_eq!(store.hosts().len(), 1);
        assert_eq!(store.hosts()[0].inbound_tag, "a");
    }

    #[tokio::test]
    async fn test_missing_file_keeps_snapshot() {
        let store = HostStore::new();
        store.replace(vec![InboundHost::for_tag("a")]);
        store
            .refresh(&FileHostSource::new("/nonexistent/hosts.json"))
            .await;
        assert_eq!(store.hosts().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_loop_ticks_and_stops() {
        let store = Arc::new(HostStore::new());
        let handle = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let source = StaticSource(vec![InboundHost::for_tag("a")]);
                store.run_refresh_loop(&source).await;
            })
        };

        // the first tick fires immediately
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.hosts().len(), 1);

        store.stop();
        handle.await.unwrap();
    }

    #[test]
    fn test_reader_keeps_old_snapshot() {
        let store = HostStore::new();
        store.replace(vec![InboundHost::for_tag("a")]);
        let old = store.hosts();
        store.replace(vec![]);
        assert_eq!(old.len(), 1);
        assert_eq!(store.hosts().len(), 0);
    }
}
