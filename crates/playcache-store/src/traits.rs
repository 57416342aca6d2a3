//! Store trait definitions

use chrono::{DateTime, Utc};
use playcache_api::{CacheSize, ProfileRecord, ProfileSnapshot, RecordKind, SyncRecord};
use playcache_util::{OwnerId, RecordId};

use crate::StoreResult;

/// Durable, keyed, multi-collection storage for cached records.
///
/// A successful write is visible to every subsequent read; there is no
/// buffering. Implementations own no business logic.
pub trait LocalStore: Send + Sync {
    // Append-only collections

    /// Insert a new record. Fails with `AlreadyExists` if the id is taken.
    fn put(&self, record: &SyncRecord) -> StoreResult<()>;

    /// Look up a single record
    fn get(&self, kind: RecordKind, id: &RecordId) -> StoreResult<Option<SyncRecord>>;

    /// Records of an owner, newest first, optionally capped to `limit`
    fn get_by_owner(
        &self,
        kind: RecordKind,
        owner: &OwnerId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SyncRecord>>;

    /// Pending records of a kind, in insertion order
    fn get_unsynced(&self, kind: RecordKind) -> StoreResult<Vec<SyncRecord>>;

    // Dirty tracking

    /// Transition a record to synced. Returns `false` if it already was.
    fn mark_synced(&self, kind: RecordKind, id: &RecordId, at: DateTime<Utc>)
    -> StoreResult<bool>;

    /// Note a failed push; the record stays pending
    fn record_failure(&self, kind: RecordKind, id: &RecordId, error: &str) -> StoreResult<()>;

    // Local-only notification state

    /// Set the read flag of a notification. Returns `false` if unknown.
    fn set_notification_read(&self, id: &RecordId, read: bool) -> StoreResult<bool>;

    /// Count unread notifications of an owner
    fn unread_notifications(&self, owner: &OwnerId) -> StoreResult<usize>;

    // Profiles

    /// Insert or replace the owner's profile, bumping its version
    fn upsert_profile(
        &self,
        owner: &OwnerId,
        profile: &ProfileSnapshot,
        updated_at: i64,
    ) -> StoreResult<()>;

    /// Get the owner's profile
    fn get_profile(&self, owner: &OwnerId) -> StoreResult<Option<ProfileRecord>>;

    /// Profiles whose latest version has not been confirmed upstream
    fn stale_profiles(&self) -> StoreResult<Vec<ProfileRecord>>;

    /// Record that `version` of the owner's profile reached the remote.
    /// Never moves the synced version backwards.
    fn mark_profile_synced(
        &self,
        owner: &OwnerId,
        version: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // Eviction

    /// Delete every record of a kind belonging to an owner
    fn delete_by_owner(&self, kind: RecordKind, owner: &OwnerId) -> StoreResult<usize>;

    /// Delete everything
    fn clear_all(&self) -> StoreResult<()>;

    // Inspection

    /// Total and pending counts per kind
    fn cache_size(&self) -> StoreResult<CacheSize>;

    /// Newest logical timestamp stored, for seeding the logical clock
    fn latest_timestamp(&self) -> StoreResult<Option<i64>>;

    // Sync pass lease, shared by every process opening the same database

    /// Take or renew the sync lease for `holder` until `now + ttl_ms`.
    ///
    /// Succeeds when the lease is free, expired, or already held by
    /// `holder`. Returns `false` while another holder owns it.
    fn try_acquire_pass(&self, holder: &str, now: i64, ttl_ms: i64) -> StoreResult<bool>;

    /// Give the lease up, if `holder` still owns it
    fn release_pass(&self, holder: &str) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
