//! Connectivity monitoring
//!
//! Tracks whether the network is reachable and fans out edge-triggered
//! [`ConnectivityEvent`]s to listeners. A new listener first receives the
//! current status, then exactly one event per transition.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A connectivity signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl ConnectivityEvent {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        }
    }

    pub fn is_online(self) -> bool {
        matches!(self, ConnectivityEvent::Online)
    }
}

#[derive(Debug)]
struct MonitorState {
    online: bool,
    listeners: Vec<mpsc::UnboundedSender<ConnectivityEvent>>,
}

/// Shared online/offline status
///
/// Clones observe and update the same status.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with a known initial status
    pub fn new(initially_online: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState {
                online: initially_online,
                listeners: Vec::new(),
            })),
        }
    }

    /// Current status
    pub fn currently_online(&self) -> bool {
        self.lock().online
    }

    /// Report the observed status
    ///
    /// Listeners are notified only when the status actually changes.
    /// Returns whether a transition happened.
    pub fn set_online(&self, online: bool) -> bool {
        let mut state = self.lock();
        if state.online == online {
            return false;
        }

        state.online = online;
        let event = ConnectivityEvent::from_online(online);
        state.listeners.retain(|tx| tx.send(event).is_ok());

        if online {
            info!("Connectivity restored");
        } else {
            warn!("Connectivity lost");
        }
        true
    }

    /// Register a listener
    ///
    /// The listener's first event is the current status.
    pub fn subscribe(&self) -> ConnectivityListener {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        // Sent under the lock so no transition can slip in ahead of it
        let _ = tx.send(ConnectivityEvent::from_online(state.online));
        state.listeners.push(tx);
        ConnectivityListener { rx }
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        let mut state = self.lock();
        state.listeners.retain(|tx| !tx.is_closed());
        state.listeners.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        // Listener lists stay valid even if a holder panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Receiving side of a monitor registration
///
/// Dropping the listener deregisters it.
#[derive(Debug)]
pub struct ConnectivityListener {
    rx: mpsc::UnboundedReceiver<ConnectivityEvent>,
}

impl ConnectivityListener {
    /// Wait for the next event
    ///
    /// Returns `None` once every monitor handle has been dropped.
    pub async fn recv(&mut self) -> Option<ConnectivityEvent> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting
    pub fn try_recv(&mut self) -> Option<ConnectivityEvent> {
        self.rx.try_recv().ok()
    }
}

/// Handle to a running reachability probe
#[derive(Debug)]
pub struct ProbeHandle {
    task: JoinHandle<()>,
}

impl ProbeHandle {
    /// Stop probing
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Spawn a task that periodically checks whether `target` (host:port) accepts
/// TCP connections and reports the result to `monitor`
pub fn spawn_reachability_probe(
    monitor: ConnectivityMonitor,
    target: String,
    interval: Duration,
) -> ProbeHandle {
    let task = tokio::spawn(async move {
        let connect_timeout = interval.min(Duration::from_secs(5));
        loop {
            let reachable =
                match tokio::time::timeout(connect_timeout, TcpStream::connect(&target)).await {
                    Ok(Ok(_)) => true,
                    Ok(Err(e)) => {
                        debug!("Probe of {} failed: {}", target, e);
                        false
                    }
                    Err(_) => {
                        debug!("Probe of {} timed out", target);
                        false
                    }
                };

            monitor.set_online(reachable);
            tokio::time::sleep(interval).await;
        }
    });

    ProbeHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_status_is_emitted() {
        let monitor = ConnectivityMonitor::new(false);
        let mut listener = monitor.subscribe();

        assert_eq!(listener.recv().await, Some(ConnectivityEvent::Offline));
        assert!(listener.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_edge_triggered() {
        let monitor = ConnectivityMonitor::new(true);
        let mut listener = monitor.subscribe();
        assert_eq!(listener.recv().await, Some(ConnectivityEvent::Online));

        // Same status is not a transition
        assert!(!monitor.set_online(true));
        assert!(listener.try_recv().is_none());

        assert!(monitor.set_online(false));
        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));

        assert_eq!(listener.recv().await, Some(ConnectivityEvent::Offline));
        assert_eq!(listener.recv().await, Some(ConnectivityEvent::Online));
        assert!(listener.try_recv().is_none());
        assert!(monitor.currently_online());
    }

    #[tokio::test]
    async fn test_new_subscriber_does_not_notify_existing() {
        let monitor = ConnectivityMonitor::new(true);
        let mut first = monitor.subscribe();
        assert_eq!(first.recv().await, Some(ConnectivityEvent::Online));

        let mut second = monitor.subscribe();
        assert_eq!(second.recv().await, Some(ConnectivityEvent::Online));
        assert!(first.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dropped_listener_is_pruned() {
        let monitor = ConnectivityMonitor::new(true);
        let listener = monitor.subscribe();
        let _other = monitor.subscribe();
        assert_eq!(monitor.listener_count(), 2);

        drop(listener);
        assert_eq!(monitor.listener_count(), 1);

        monitor.set_online(false);
        assert_eq!(monitor.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_probe_reports_unreachable() {
        let monitor = ConnectivityMonitor::new(true);
        let mut listener = monitor.subscribe();
        assert_eq!(listener.recv().await, Some(ConnectivityEvent::Online));

        // Port 1 on localhost is closed in test environments
        let probe = spawn_reachability_probe(
            monitor.clone(),
            "127.0.0.1:1".to_string(),
            Duration::from_millis(50),
        );

        let event = tokio::time::timeout(Duration::from_secs(5), listener.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(ConnectivityEvent::Offline));
        probe.stop();
    }

    #[tokio::test]
    async fn test_probe_reports_reachable() {
        let server = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let monitor = ConnectivityMonitor::new(false);
        let mut listener = monitor.subscribe();
        assert_eq!(listener.recv().await, Some(ConnectivityEvent::Offline));

        let probe =
            spawn_reachability_probe(monitor.clone(), addr.to_string(), Duration::from_millis(50));

        let event = tokio::time::timeout(Duration::from_secs(5), listener.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(ConnectivityEvent::Online));
        probe.stop();
    }
}
