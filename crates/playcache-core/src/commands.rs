//! Socket commands applied to the cache service

use playcache_api::{Command, ErrorCode, ErrorInfo, HealthStatus, Response, ResponsePayload};
use tracing::debug;

use crate::{CacheService, SyncOutcome};

fn storage_unavailable(request_id: u64, what: &str) -> Response {
    Response::error(
        request_id,
        ErrorInfo::new(ErrorCode::StorageUnavailable, format!("{} failed, store unavailable", what)),
    )
}

/// Apply one client command to the cache and build its response
pub async fn handle_command(cache: &CacheService, request_id: u64, command: Command) -> Response {
    debug!(request_id, command = ?command, "Handling command");

    match command {
        Command::Put {
            owner_id,
            payload,
            local_ref,
        } => match cache.put_with_local_ref(&owner_id, payload, local_ref) {
            Some(record) => Response::success(request_id, ResponsePayload::Stored { record }),
            None => storage_unavailable(request_id, "Put"),
        },

        Command::SaveProfile { owner_id, profile } => {
            match cache.save_profile(&owner_id, profile) {
                Some(profile) => Response::success(
                    request_id,
                    ResponsePayload::Profile {
                        profile: Some(profile),
                    },
                ),
                None => storage_unavailable(request_id, "Profile save"),
            }
        }

        Command::Get { kind, id } => Response::success(
            request_id,
            ResponsePayload::Record {
                record: cache.get(kind, &id),
            },
        ),

        Command::Recent {
            owner_id,
            kind,
            limit,
        } => {
            let records = match limit {
                Some(n) => cache.recent(kind, &owner_id, n),
                None => cache.records(kind, &owner_id),
            };
            Response::success(request_id, ResponsePayload::Records { records })
        }

        Command::GetProfile { owner_id } => Response::success(
            request_id,
            ResponsePayload::Profile {
                profile: cache.profile(&owner_id),
            },
        ),

        Command::MarkNotificationRead { id, read } => Response::success(
            request_id,
            ResponsePayload::Updated {
                changed: cache.mark_notification_read(&id, read),
            },
        ),

        Command::UnreadNotifications { owner_id } => Response::success(
            request_id,
            ResponsePayload::Unread {
                count: cache.unread_notifications(&owner_id),
            },
        ),

        Command::CompositeScore { owner_id } => Response::success(
            request_id,
            ResponsePayload::Score {
                score: cache.composite_score(&owner_id),
            },
        ),

        Command::CacheSize => match cache.cache_size() {
            Some(size) => Response::success(request_id, ResponsePayload::CacheSize { size }),
            None => storage_unavailable(request_id, "Cache size"),
        },

        Command::ClearCache { owner_id } => {
            if cache.clear_cache(owner_id.as_ref()) {
                Response::success(request_id, ResponsePayload::Cleared)
            } else {
                storage_unavailable(request_id, "Clear")
            }
        }

        Command::SyncNow => match cache.sync_now().await {
            SyncOutcome::Completed(report) => Response::success(
                request_id,
                ResponsePayload::SyncFinished {
                    synced: report.synced(),
                    failed: report.failed(),
                    skipped: report.skipped_kinds(),
                },
            ),
            SyncOutcome::AlreadyRunning => Response::error(
                request_id,
                ErrorInfo::new(ErrorCode::SyncInProgress, "A sync pass is already running"),
            ),
        },

        Command::GetHealth => Response::success(
            request_id,
            ResponsePayload::Health(HealthStatus {
                store_healthy: cache.is_healthy(),
                online: cache.network().is_online(),
                syncing: cache.engine().is_syncing(),
                pending: cache.pending_count(),
            }),
        ),

        Command::Ping => Response::success(request_id, ResponsePayload::Pong),
    }
}
