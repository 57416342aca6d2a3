//! Online/offline state and transitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::info;

/// Reachability as last reported to the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    /// Nothing reported yet
    Unknown,
    Online,
    Offline,
}

impl NetworkState {
    pub fn is_online(&self) -> bool {
        matches!(self, NetworkState::Online)
    }
}

/// A change of reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOnline,
    WentOffline,
}

impl Transition {
    /// The transition (if any) between two observed states
    pub fn between(previous: NetworkState, current: NetworkState) -> Option<Transition> {
        match (previous, current) {
            (NetworkState::Online, NetworkState::Online) => None,
            (_, NetworkState::Online) => Some(Transition::WentOnline),
            (NetworkState::Online, NetworkState::Offline) => Some(Transition::WentOffline),
            (NetworkState::Unknown, NetworkState::Offline) => Some(Transition::WentOffline),
            _ => None,
        }
    }
}

/// Holds the current reachability and broadcasts every change.
///
/// Detection lives elsewhere (probe, netlink, platform callbacks); they all
/// report into `set_online`. The monitor itself never retries anything.
pub struct NetworkMonitor {
    state: watch::Sender<NetworkState>,
    changed_at: Mutex<Option<DateTime<Utc>>>,
}

impl NetworkMonitor {
    pub fn new() -> Self {
        Self::with_state(NetworkState::Unknown)
    }

    pub fn with_state(initial: NetworkState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            changed_at: Mutex::new(None),
        }
    }

    /// Report reachability; returns the transition if the state changed
    pub fn set_online(&self, online: bool) -> Option<Transition> {
        let next = if online {
            NetworkState::Online
        } else {
            NetworkState::Offline
        };

        let mut previous = NetworkState::Unknown;
        let changed = self.state.send_if_modified(|current| {
            previous = *current;
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if !changed {
            return None;
        }

        if let Ok(mut at) = self.changed_at.lock() {
            *at = Some(playcache_util::now());
        }

        let transition = Transition::between(previous, next);
        info!(from = ?previous, to = ?next, "Network state changed");
        transition
    }

    pub fn state(&self) -> NetworkState {
        *self.state.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Wall-clock time of the last state change
    pub fn last_change(&self) -> Option<DateTime<Utc>> {
        self.changed_at.lock().ok().and_then(|at| *at)
    }

    pub fn handle(&self) -> NetworkHandle {
        NetworkHandle {
            rx: self.state.subscribe(),
        }
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the monitor for other parts of the service
#[derive(Debug, Clone)]
pub struct NetworkHandle {
    rx: watch::Receiver<NetworkState>,
}

impl NetworkHandle {
    pub fn state(&self) -> NetworkState {
        *self.rx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Independent receiver for transition-driven loops
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.rx.clone()
    }
}
