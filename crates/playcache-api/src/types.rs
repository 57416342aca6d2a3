//! Sync record wrapper, kinds, and sync state

use chrono::{DateTime, Utc};
use playcache_util::{OwnerId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::{Payload, ProfileSnapshot};

/// Entity kind; one logical collection per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Telemetry,
    Highlight,
    Reward,
    DrillLog,
    Notification,
    Profile,
}

impl RecordKind {
    /// Every kind, in the order a sync pass visits them
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Telemetry,
        RecordKind::Highlight,
        RecordKind::Reward,
        RecordKind::DrillLog,
        RecordKind::Notification,
        RecordKind::Profile,
    ];

    /// Kinds whose records are appended and tracked with a pending/synced flag
    pub const APPEND_ONLY: [RecordKind; 5] = [
        RecordKind::Telemetry,
        RecordKind::Highlight,
        RecordKind::Reward,
        RecordKind::DrillLog,
        RecordKind::Notification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Telemetry => "telemetry",
            RecordKind::Highlight => "highlight",
            RecordKind::Reward => "reward",
            RecordKind::DrillLog => "drill_log",
            RecordKind::Notification => "notification",
            RecordKind::Profile => "profile",
        }
    }

    /// Profiles are upserted (one per owner) rather than appended
    pub fn is_upserted(&self) -> bool {
        matches!(self, RecordKind::Profile)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown record kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for RecordKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Synchronization state of an append-only record.
///
/// The only transition is `Pending -> Synced`; `Synced` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Synced,
}

impl SyncState {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncState::Synced)
    }
}

/// A single immutable unit of cached domain data plus its sync status.
///
/// Only `sync_state`, the sync bookkeeping fields and the local `read` flag
/// ever change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: RecordId,
    pub owner_id: OwnerId,
    /// Logical timestamp (monotonic per device), used for ordering
    pub created_at: i64,
    pub sync_state: SyncState,
    /// Wall-clock time the remote confirmed the record
    pub synced_at: Option<DateTime<Utc>>,
    /// Number of failed push attempts so far
    #[serde(default)]
    pub sync_attempts: u32,
    /// Error message from the most recent failed push
    pub last_error: Option<String>,
    /// Pointer to a non-durable local resource (e.g. a clip not yet uploaded)
    pub local_only_ref: Option<String>,
    /// Local-only read flag; meaningful for notifications, never sent upstream
    #[serde(default)]
    pub read: bool,
    pub payload: Payload,
}

impl SyncRecord {
    /// Create a new pending record with a client-generated id.
    pub fn new_pending(owner_id: OwnerId, payload: Payload, created_at: i64) -> Self {
        let id = RecordId::generate(&owner_id, payload.kind().as_str(), created_at);
        Self {
            id,
            owner_id,
            created_at,
            sync_state: SyncState::Pending,
            synced_at: None,
            sync_attempts: 0,
            last_error: None,
            local_only_ref: None,
            read: false,
            payload,
        }
    }

    pub fn with_local_ref(mut self, local_ref: impl Into<String>) -> Self {
        self.local_only_ref = Some(local_ref.into());
        self
    }

    pub fn kind(&self) -> RecordKind {
        self.payload.kind()
    }

    pub fn is_pending(&self) -> bool {
        !self.sync_state.is_synced()
    }
}

/// The single cached profile of an owner.
///
/// Stale (needs a push) when it was never synced, or the synced version
/// predates the last local mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub owner_id: OwnerId,
    pub profile: ProfileSnapshot,
    /// Logical timestamp of the last local mutation
    pub updated_at: i64,
    /// `updated_at` value that the remote last confirmed
    pub synced_version: Option<i64>,
    /// Wall-clock time of the last confirmed push
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    pub fn is_stale(&self) -> bool {
        self.synced_version.is_none_or(|v| v < self.updated_at)
    }

    /// Stable record id used when pushing the profile upstream
    pub fn record_id(&self) -> RecordId {
        RecordId::new(format!("{}_{}", self.owner_id.as_str(), RecordKind::Profile))
    }

    /// View the profile as a sync record so it travels the same gateway path
    pub fn to_sync_record(&self) -> SyncRecord {
        SyncRecord {
            id: self.record_id(),
            owner_id: self.owner_id.clone(),
            created_at: self.updated_at,
            sync_state: if self.is_stale() {
                SyncState::Pending
            } else {
                SyncState::Synced
            },
            synced_at: self.last_synced_at,
            sync_attempts: 0,
            last_error: None,
            local_only_ref: None,
            read: false,
            payload: Payload::Profile(self.profile.clone()),
        }
    }
}

/// Per-kind record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    pub total: usize,
    pub pending: usize,
}

/// Cache inspection summary: counts per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSize {
    pub kinds: BTreeMap<RecordKind, KindCount>,
}

impl CacheSize {
    pub fn get(&self, kind: RecordKind) -> KindCount {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.kinds.values().map(|c| c.total).sum()
    }

    pub fn pending(&self) -> usize {
        self.kinds.values().map(|c| c.pending).sum()
    }
}

/// Leaderboard score over an owner's recent sessions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Number of sessions considered
    pub sessions: usize,
    pub average: f64,
    /// 0-100, 100 when every score is identical
    pub consistency: f64,
    /// 0-100, 50 means no change between the older and newer half
    pub improvement: f64,
    pub composite: f64,
}
