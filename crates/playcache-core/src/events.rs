//! Events and reports emitted by the sync engine

use chrono::{DateTime, Utc};
use playcache_api::RecordKind;
use playcache_util::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What started a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Fixed interval while online
    Periodic,
    /// The network came back
    Connectivity,
    /// Right after a write while online
    FastPath,
    /// Explicit request (CLI, settings screen)
    Manual,
}

/// Per-kind results of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    /// The store could not be read for this kind
    pub skipped: bool,
}

/// Summary of a completed pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub kinds: BTreeMap<RecordKind, KindReport>,
}

impl SyncReport {
    pub fn kind(&self, kind: RecordKind) -> KindReport {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }

    pub fn synced(&self) -> usize {
        self.kinds.values().map(|k| k.synced).sum()
    }

    pub fn failed(&self) -> usize {
        self.kinds.values().map(|k| k.failed).sum()
    }

    pub fn skipped_kinds(&self) -> Vec<RecordKind> {
        self.kinds
            .iter()
            .filter(|(_, report)| report.skipped)
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Nothing failed and nothing was skipped
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.skipped_kinds().is_empty()
    }
}

/// Result of asking for a pass
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was in flight; this request was dropped
    AlreadyRunning,
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::AlreadyRunning => None,
        }
    }
}

/// Progress events broadcast by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    PassStarted {
        trigger: SyncTrigger,
    },

    RecordSynced {
        kind: RecordKind,
        id: RecordId,
    },

    /// Push failed; the record stays pending for the next pass
    RecordFailed {
        kind: RecordKind,
        id: RecordId,
        error: String,
        transient: bool,
    },

    /// The store failed for this kind; nothing was pushed
    KindSkipped {
        kind: RecordKind,
        error: String,
    },

    PassFinished(SyncReport),
}
