//! Command types for the playcached socket protocol

use playcache_util::{OwnerId, RecordId};
use serde::{Deserialize, Serialize};

use crate::{
    CacheSize, CompositeScore, Payload, ProfileRecord, ProfileSnapshot, RecordKind, SyncRecord,
};

/// Protocol version carried by every request and response
pub const API_VERSION: u32 = 1;

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    pub api_version: u32,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }

    pub fn payload(&self) -> Option<&ResponsePayload> {
        match &self.result {
            ResponseResult::Ok(payload) => Some(payload),
            ResponseResult::Err(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnsupportedVersion,
    /// The write could not be stored
    StorageUnavailable,
    SyncInProgress,
}

/// Commands accepted by the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Cache a record; profile payloads are upserted
    Put {
        owner_id: OwnerId,
        payload: Payload,
        #[serde(default)]
        local_ref: Option<String>,
    },

    SaveProfile {
        owner_id: OwnerId,
        profile: ProfileSnapshot,
    },

    Get {
        kind: RecordKind,
        id: RecordId,
    },

    /// Records of an owner, newest first
    Recent {
        owner_id: OwnerId,
        kind: RecordKind,
        #[serde(default)]
        limit: Option<usize>,
    },

    GetProfile {
        owner_id: OwnerId,
    },

    MarkNotificationRead {
        id: RecordId,
        read: bool,
    },

    UnreadNotifications {
        owner_id: OwnerId,
    },

    CompositeScore {
        owner_id: OwnerId,
    },

    CacheSize,

    /// Evict one owner's records, or everything
    ClearCache {
        #[serde(default)]
        owner_id: Option<OwnerId>,
    },

    /// Run a sync pass and wait for it
    SyncNow,

    GetHealth,

    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Stored { record: SyncRecord },
    Record { record: Option<SyncRecord> },
    Records { records: Vec<SyncRecord> },
    Profile { profile: Option<ProfileRecord> },
    Updated { changed: bool },
    Unread { count: usize },
    Score { score: Option<CompositeScore> },
    CacheSize { size: CacheSize },
    Cleared,
    SyncFinished {
        synced: usize,
        failed: usize,
        skipped: Vec<RecordKind>,
    },
    Health(HealthStatus),
    Pong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub store_healthy: bool,
    pub online: bool,
    pub syncing: bool,
    pub pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DrillLog;

    #[test]
    fn put_command_wire_format() {
        let line = r#"{
            "request_id": 7,
            "api_version": 1,
            "command": {
                "type": "put",
                "owner_id": "athlete-1",
                "payload": {
                    "kind": "drill_log",
                    "data": {
                        "drill_id": "d1",
                        "drill_name": "Cone weave",
                        "reps": 12,
                        "duration_secs": 90
                    }
                }
            }
        }"#;

        let request: Request = serde_json::from_str(line).unwrap();
        assert_eq!(request.request_id, 7);
        match request.command {
            Command::Put {
                owner_id,
                payload: Payload::DrillLog(DrillLog { reps, .. }),
                local_ref,
            } => {
                assert_eq!(owner_id.as_str(), "athlete-1");
                assert_eq!(reps, 12);
                assert!(local_ref.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn error_response_serializes_code() {
        let response = Response::error(
            3,
            ErrorInfo::new(ErrorCode::StorageUnavailable, "disk full"),
        );
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["result"]["err"]["code"], "storage_unavailable");
        assert!(response.payload().is_none());
    }
}
