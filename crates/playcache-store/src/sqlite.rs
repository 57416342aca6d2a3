//! SQLite-based store implementation

use chrono::{DateTime, Utc};
use playcache_api::{
    CacheSize, KindCount, Payload, ProfileRecord, ProfileSnapshot, RecordKind, SyncRecord,
    SyncState,
};
use playcache_util::{OwnerId, RecordId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{LocalStore, StoreError, StoreResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RECORD_COLUMNS: &str = "id, owner_id, created_at, synced, synced_at, sync_attempts, \
                              last_error, local_only_ref, is_read, payload_json";

const PROFILE_COLUMNS: &str = "owner_id, profile_json, updated_at, synced_version, last_synced_at";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        // Other processes may hold the database briefly
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Append-only records, one logical collection per kind
            CREATE TABLE IF NOT EXISTS records (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0,
                synced_at TEXT,
                sync_attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                local_only_ref TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                payload_json TEXT NOT NULL,
                PRIMARY KEY (kind, id)
            );

            -- One profile per owner
            CREATE TABLE IF NOT EXISTS profiles (
                owner_id TEXT PRIMARY KEY,
                profile_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                synced_version INTEGER,
                last_synced_at TEXT
            );

            -- Single-row lease guarding sync passes across processes
            CREATE TABLE IF NOT EXISTS sync_lease (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                holder TEXT,
                expires_at INTEGER NOT NULL DEFAULT 0
            );
            INSERT OR IGNORE INTO sync_lease (id, holder, expires_at) VALUES (1, NULL, 0);

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_records_owner ON records(kind, owner_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_records_pending ON records(kind, synced, created_at);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    fn query_records<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> StoreResult<Vec<SyncRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, RecordRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn query_profiles<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> StoreResult<Vec<ProfileRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, ProfileRow::from_row)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?.into_profile()?);
        }
        Ok(profiles)
    }
}

fn profile_owner_from_id(id: &RecordId) -> Option<OwnerId> {
    id.as_str()
        .strip_suffix(&format!("_{}", RecordKind::Profile))
        .map(OwnerId::new)
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

struct RecordRow {
    id: String,
    owner_id: String,
    created_at: i64,
    synced: bool,
    synced_at: Option<String>,
    sync_attempts: i64,
    last_error: Option<String>,
    local_only_ref: Option<String>,
    is_read: bool,
    payload_json: String,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            created_at: row.get(2)?,
            synced: row.get(3)?,
            synced_at: row.get(4)?,
            sync_attempts: row.get(5)?,
            last_error: row.get(6)?,
            local_only_ref: row.get(7)?,
            is_read: row.get(8)?,
            payload_json: row.get(9)?,
        })
    }

    fn into_record(self) -> StoreResult<SyncRecord> {
        let payload: Payload = serde_json::from_str(&self.payload_json)?;
        Ok(SyncRecord {
            id: RecordId::new(self.id),
            owner_id: OwnerId::new(self.owner_id),
            created_at: self.created_at,
            sync_state: if self.synced {
                SyncState::Synced
            } else {
                SyncState::Pending
            },
            synced_at: parse_timestamp(self.synced_at),
            sync_attempts: u32::try_from(self.sync_attempts).unwrap_or(u32::MAX),
            last_error: self.last_error,
            local_only_ref: self.local_only_ref,
            read: self.is_read,
            payload,
        })
    }
}

struct ProfileRow {
    owner_id: String,
    profile_json: String,
    updated_at: i64,
    synced_version: Option<i64>,
    last_synced_at: Option<String>,
}

impl ProfileRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            owner_id: row.get(0)?,
            profile_json: row.get(1)?,
            updated_at: row.get(2)?,
            synced_version: row.get(3)?,
            last_synced_at: row.get(4)?,
        })
    }

    fn into_profile(self) -> StoreResult<ProfileRecord> {
        let profile: ProfileSnapshot = serde_json::from_str(&self.profile_json)?;
        Ok(ProfileRecord {
            owner_id: OwnerId::new(self.owner_id),
            profile,
            updated_at: self.updated_at,
            synced_version: self.synced_version,
            last_synced_at: parse_timestamp(self.last_synced_at),
        })
    }
}

impl LocalStore for SqliteStore {
    fn put(&self, record: &SyncRecord) -> StoreResult<()> {
        let kind = record.kind();
        if kind.is_upserted() {
            return Err(StoreError::InvalidRecord(format!(
                "{} records are upserted, not appended",
                kind
            )));
        }

        let payload_json = serde_json::to_string(&record.payload)?;
        let conn = self.conn()?;

        let result = conn.execute(
            r#"
            INSERT INTO records (
                kind, id, owner_id, created_at, synced, synced_at,
                sync_attempts, last_error, local_only_ref, is_read, payload_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                kind.as_str(),
                record.id.as_str(),
                record.owner_id.as_str(),
                record.created_at,
                record.sync_state.is_synced(),
                record.synced_at.map(|t| t.to_rfc3339()),
                record.sync_attempts,
                record.last_error,
                record.local_only_ref,
                record.read,
                payload_json,
            ],
        );

        match result {
            Ok(_) => {
                debug!(kind = %kind, id = %record.id, owner = %record.owner_id, "Record stored");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::AlreadyExists(record.id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, kind: RecordKind, id: &RecordId) -> StoreResult<Option<SyncRecord>> {
        if kind.is_upserted() {
            return match profile_owner_from_id(id) {
                Some(owner) => Ok(self.get_profile(&owner)?.map(|p| p.to_sync_record())),
                None => Ok(None),
            };
        }

        let conn = self.conn()?;
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE kind = ? AND id = ?");
        let mut records = Self::query_records(&conn, &sql, params![kind.as_str(), id.as_str()])?;
        Ok(records.pop())
    }

    fn get_by_owner(
        &self,
        kind: RecordKind,
        owner: &OwnerId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<SyncRecord>> {
        if kind.is_upserted() {
            let profile = self.get_profile(owner)?;
            return Ok(profile.map(|p| p.to_sync_record()).into_iter().collect());
        }

        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE kind = ? AND owner_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        );
        Self::query_records(&conn, &sql, params![kind.as_str(), owner.as_str(), limit])
    }

    fn get_unsynced(&self, kind: RecordKind) -> StoreResult<Vec<SyncRecord>> {
        if kind.is_upserted() {
            return Ok(self
                .stale_profiles()?
                .iter()
                .map(ProfileRecord::to_sync_record)
                .collect());
        }

        let conn = self.conn()?;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE kind = ? AND synced = 0 \
             ORDER BY created_at ASC, rowid ASC"
        );
        Self::query_records(&conn, &sql, params![kind.as_str()])
    }

    fn mark_synced(
        &self,
        kind: RecordKind,
        id: &RecordId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        if kind.is_upserted() {
            return Err(StoreError::InvalidRecord(
                "profiles are marked synced by version".into(),
            ));
        }

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE records SET synced = 1, synced_at = ?, last_error = NULL \
             WHERE kind = ? AND id = ? AND synced = 0",
            params![at.to_rfc3339(), kind.as_str(), id.as_str()],
        )?;

        if changed > 0 {
            debug!(kind = %kind, id = %id, "Record marked synced");
            return Ok(true);
        }

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM records WHERE kind = ? AND id = ?",
                params![kind.as_str(), id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    fn record_failure(&self, kind: RecordKind, id: &RecordId, error: &str) -> StoreResult<()> {
        if kind.is_upserted() {
            return Ok(());
        }

        let conn = self.conn()?;
        conn.execute(
            "UPDATE records SET sync_attempts = sync_attempts + 1, last_error = ? \
             WHERE kind = ? AND id = ? AND synced = 0",
            params![error, kind.as_str(), id.as_str()],
        )?;
        Ok(())
    }

    fn set_notification_read(&self, id: &RecordId, read: bool) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE records SET is_read = ? WHERE kind = ? AND id = ?",
            params![read, RecordKind::Notification.as_str(), id.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn unread_notifications(&self, owner: &OwnerId) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE kind = ? AND owner_id = ? AND is_read = 0",
            params![RecordKind::Notification.as_str(), owner.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn upsert_profile(
        &self,
        owner: &OwnerId,
        profile: &ProfileSnapshot,
        updated_at: i64,
    ) -> StoreResult<()> {
        let json = serde_json::to_string(profile)?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO profiles (owner_id, profile_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(owner_id)
            DO UPDATE SET profile_json = excluded.profile_json, updated_at = excluded.updated_at
            "#,
            params![owner.as_str(), json, updated_at],
        )?;

        debug!(owner = %owner, updated_at, "Profile upserted");
        Ok(())
    }

    fn get_profile(&self, owner: &OwnerId) -> StoreResult<Option<ProfileRecord>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE owner_id = ?");
        let mut profiles = Self::query_profiles(&conn, &sql, params![owner.as_str()])?;
        Ok(profiles.pop())
    }

    fn stale_profiles(&self) -> StoreResult<Vec<ProfileRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles \
             WHERE synced_version IS NULL OR synced_version < updated_at \
             ORDER BY updated_at ASC"
        );
        Self::query_profiles(&conn, &sql, [])
    }

    fn mark_profile_synced(
        &self,
        owner: &OwnerId,
        version: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE profiles SET synced_version = ?, last_synced_at = ? \
             WHERE owner_id = ? AND (synced_version IS NULL OR synced_version < ?)",
            params![version, at.to_rfc3339(), owner.as_str(), version],
        )?;
        Ok(changed > 0)
    }

    fn delete_by_owner(&self, kind: RecordKind, owner: &OwnerId) -> StoreResult<usize> {
        let conn = self.conn()?;
        let deleted = if kind.is_upserted() {
            conn.execute("DELETE FROM profiles WHERE owner_id = ?", [owner.as_str()])?
        } else {
            conn.execute(
                "DELETE FROM records WHERE kind = ? AND owner_id = ?",
                params![kind.as_str(), owner.as_str()],
            )?
        };

        debug!(kind = %kind, owner = %owner, deleted, "Records deleted");
        Ok(deleted)
    }

    fn clear_all(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("DELETE FROM records; DELETE FROM profiles;")?;
        debug!("Store cleared");
        Ok(())
    }

    fn cache_size(&self) -> StoreResult<CacheSize> {
        let conn = self.conn()?;
        let mut size = CacheSize::default();

        let mut stmt = conn.prepare(
            "SELECT kind, COUNT(*), SUM(CASE WHEN synced = 0 THEN 1 ELSE 0 END) \
             FROM records GROUP BY kind",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(0)?;
            let total: i64 = row.get(1)?;
            let pending: i64 = row.get(2)?;
            Ok((kind, total, pending))
        })?;

        for row in rows {
            let (kind, total, pending) = row?;
            match kind.parse::<RecordKind>() {
                Ok(kind) => {
                    size.kinds.insert(
                        kind,
                        KindCount {
                            total: total as usize,
                            pending: pending as usize,
                        },
                    );
                }
                Err(e) => warn!(error = %e, "Skipping rows of unknown kind"),
            }
        }

        let (total, pending): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), \
             COALESCE(SUM(CASE WHEN synced_version IS NULL OR synced_version < updated_at \
                          THEN 1 ELSE 0 END), 0) \
             FROM profiles",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if total > 0 {
            size.kinds.insert(
                RecordKind::Profile,
                KindCount {
                    total: total as usize,
                    pending: pending as usize,
                },
            );
        }

        Ok(size)
    }

    fn latest_timestamp(&self) -> StoreResult<Option<i64>> {
        let conn = self.conn()?;
        let latest: Option<i64> = conn.query_row(
            "SELECT MAX(ts) FROM ( \
                SELECT MAX(created_at) AS ts FROM records \
                UNION ALL \
                SELECT MAX(updated_at) AS ts FROM profiles \
             )",
            [],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    fn try_acquire_pass(&self, holder: &str, now: i64, ttl_ms: i64) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sync_lease SET holder = ?1, expires_at = ?2 \
             WHERE id = 1 AND (holder IS NULL OR holder = ?1 OR expires_at < ?3)",
            params![holder, now.saturating_add(ttl_ms), now],
        )?;
        Ok(changed > 0)
    }

    fn release_pass(&self, holder: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sync_lease SET holder = NULL, expires_at = 0 WHERE id = 1 AND holder = ?",
            [holder],
        )?;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
