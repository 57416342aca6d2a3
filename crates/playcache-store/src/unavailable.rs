//! Stand-in store used when the real store failed to initialize

use chrono::{DateTime, Utc};
use playcache_api::{CacheSize, ProfileRecord, ProfileSnapshot, RecordKind, SyncRecord};
use playcache_util::{OwnerId, RecordId};

use crate::{LocalStore, StoreError, StoreResult};

/// Store whose every operation fails with [`StoreError::Unavailable`].
///
/// Lets the rest of the system keep running (and logging) when the database
/// could not be opened, instead of refusing to start.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn fail<T>(&self) -> StoreResult<T> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }
}

impl LocalStore for UnavailableStore {
    fn put(&self, _record: &SyncRecord) -> StoreResult<()> {
        self.fail()
    }

    fn get(&self, _kind: RecordKind, _id: &RecordId) -> StoreResult<Option<SyncRecord>> {
        self.fail()
    }

    fn get_by_owner(
        &self,
        _kind: RecordKind,
        _owner: &OwnerId,
        _limit: Option<usize>,
    ) -> StoreResult<Vec<SyncRecord>> {
        self.fail()
    }

    fn get_unsynced(&self, _kind: RecordKind) -> StoreResult<Vec<SyncRecord>> {
        self.fail()
    }

    fn mark_synced(
        &self,
        _kind: RecordKind,
        _id: &RecordId,
        _at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.fail()
    }

    fn record_failure(&self, _kind: RecordKind, _id: &RecordId, _error: &str) -> StoreResult<()> {
        self.fail()
    }

    fn set_notification_read(&self, _id: &RecordId, _read: bool) -> StoreResult<bool> {
        self.fail()
    }

    fn unread_notifications(&self, _owner: &OwnerId) -> StoreResult<usize> {
        self.fail()
    }

    fn upsert_profile(
        &self,
        _owner: &OwnerId,
        _profile: &ProfileSnapshot,
        _updated_at: i64,
    ) -> StoreResult<()> {
        self.fail()
    }

    fn get_profile(&self, _owner: &OwnerId) -> StoreResult<Option<ProfileRecord>> {
        self.fail()
    }

    fn stale_profiles(&self) -> StoreResult<Vec<ProfileRecord>> {
        self.fail()
    }

    fn mark_profile_synced(
        &self,
        _owner: &OwnerId,
        _version: i64,
        _at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.fail()
    }

    fn delete_by_owner(&self, _kind: RecordKind, _owner: &OwnerId) -> StoreResult<usize> {
        self.fail()
    }

    fn clear_all(&self) -> StoreResult<()> {
        self.fail()
    }

    fn cache_size(&self) -> StoreResult<CacheSize> {
        self.fail()
    }

    fn latest_timestamp(&self) -> StoreResult<Option<i64>> {
        self.fail()
    }

    fn try_acquire_pass(&self, _holder: &str, _now: i64, _ttl_ms: i64) -> StoreResult<bool> {
        self.fail()
    }

    fn release_pass(&self, _holder: &str) -> StoreResult<()> {
        self.fail()
    }

    fn is_healthy(&self) -> bool {
        false
    }
}
