//! # Connectivity Monitor
//!
//! Tracks device network reachability and notifies subscribers on change.
//!
//! The monitor is a pass-through over the platform's reachability signal:
//! no retries, no probing. At startup the state is unknown (`None`), which
//! the engine treats as offline for submission decisions, since a false
//! "online" reading causes failed network calls rather than mere delay.

use tokio::sync::watch;

/// Network reachability monitor.
///
/// The host platform feeds state changes in through [`set_online`];
/// subscribers receive every transition through a watch channel.
///
/// [`set_online`]: ConnectivityMonitor::set_online
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<Option<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with unknown initial state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Current reachability: `Some(true)` online, `Some(false)` offline,
    /// `None` unknown at startup
    pub fn current(&self) -> Option<bool> {
        *self.tx.borrow()
    }

    /// Whether submission should be attempted now. Unknown counts as offline.
    pub fn is_online(&self) -> bool {
        self.current() == Some(true)
    }

    /// Record a reachability change from the platform signal.
    ///
    /// Subscribers are only notified on actual transitions.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|state| {
            if *state == Some(online) {
                false
            } else {
                *state = Some(online);
                true
            }
        });
    }

    /// Subscribe to reachability transitions
    pub fn subscribe(&self) -> watch::Receiver<Option<bool>> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
