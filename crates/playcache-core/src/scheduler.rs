//! Sync triggers: periodic timer and connectivity transitions

use playcache_net::{NetworkHandle, Transition};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{SyncEngine, SyncTrigger};

/// Starts sync passes on a fixed interval while online and whenever the
/// network comes back.
///
/// Passes run as their own tasks; overlapping triggers are dropped by the
/// engine's in-flight guard.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    network: NetworkHandle,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>, network: NetworkHandle, interval: Duration) -> Self {
        Self {
            engine,
            network,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;

        let mut states = self.network.subscribe();
        let mut last = *states.borrow_and_update();
        let mut watching = true;

        info!(interval_secs = self.interval.as_secs(), "Sync scheduler started");

        if last.is_online() {
            self.spawn_pass(SyncTrigger::Connectivity);
        }

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.network.is_online() {
                        self.spawn_pass(SyncTrigger::Periodic);
                    } else {
                        debug!("Offline, periodic sync skipped");
                    }
                }
                changed = states.changed(), if watching => {
                    if changed.is_err() {
                        debug!("Network monitor gone, connectivity triggers disabled");
                        watching = false;
                        continue;
                    }

                    let current = *states.borrow_and_update();
                    if Transition::between(last, current) == Some(Transition::WentOnline) {
                        info!("Network came back, starting sync pass");
                        self.spawn_pass(SyncTrigger::Connectivity);
                    }
                    last = current;
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    fn spawn_pass(&self, trigger: SyncTrigger) {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            engine.sync_all(trigger).await;
        });
    }
}
