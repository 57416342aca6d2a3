//! Validated settings (converted from raw config)

use crate::schema::RawConfig;
use playcache_api::{RecordKind, WidgetKinds};
use playcache_util::default_data_dir;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE: &str = "cache.db";
pub const DEFAULT_SOCKET: &str = "playcached.sock";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_AUTH_TOKEN_ENV: &str = "PLAYCACHE_TOKEN";
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SCORE_WINDOW: usize = 10;

/// Fully validated settings for the cache daemon
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceSettings,
    pub sync: SyncSettings,
    pub remote: RemoteSettings,
    pub connectivity: ConnectivitySettings,
    pub widget: WidgetSettings,
    pub scoring: ScoringSettings,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub data_dir: PathBuf,
    pub database: String,
    pub socket: String,
}

impl ServiceSettings {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }

    /// Unix socket the daemon takes commands on
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir.join(&self.socket)
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub interval: Duration,
    pub fast_path: bool,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub auth_token_env: String,
}

impl RemoteSettings {
    /// Bearer token read from the configured environment variable, if set
    pub fn auth_token(&self) -> Option<String> {
        std::env::var(&self.auth_token_env)
            .ok()
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ConnectivitySettings {
    pub check_url: String,
    pub check_interval: Duration,
    pub check_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct WidgetSettings {
    pub enabled: bool,
    pub kinds: WidgetKinds,
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub window: usize,
}

impl Settings {
    /// Convert from an already validated raw config
    pub fn from_raw(raw: RawConfig) -> Self {
        let data_dir = raw.service.data_dir.unwrap_or_else(default_data_dir);

        let base_url = raw
            .remote
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let check_url = raw
            .connectivity
            .check_url
            .unwrap_or_else(|| format!("{}/health", base_url));

        let kinds = raw
            .widget
            .kinds
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| name.parse::<RecordKind>().ok())
                    .collect()
            })
            .unwrap_or_default();

        let widget_dir = raw
            .widget
            .dir
            .unwrap_or_else(|| data_dir.join("widget"));

        Self {
            service: ServiceSettings {
                database: raw
                    .service
                    .database
                    .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                socket: raw
                    .service
                    .socket
                    .unwrap_or_else(|| DEFAULT_SOCKET.to_string()),
                data_dir,
            },
            sync: SyncSettings {
                interval: seconds_or(raw.sync.interval_seconds, DEFAULT_SYNC_INTERVAL),
                fast_path: raw.sync.fast_path.unwrap_or(true),
            },
            remote: RemoteSettings {
                base_url,
                timeout: seconds_or(raw.remote.timeout_seconds, DEFAULT_REMOTE_TIMEOUT),
                auth_token_env: raw
                    .remote
                    .auth_token_env
                    .unwrap_or_else(|| DEFAULT_AUTH_TOKEN_ENV.to_string()),
            },
            connectivity: ConnectivitySettings {
                check_url,
                check_interval: seconds_or(
                    raw.connectivity.check_interval_seconds,
                    DEFAULT_CHECK_INTERVAL,
                ),
                check_timeout: seconds_or(
                    raw.connectivity.check_timeout_seconds,
                    DEFAULT_CHECK_TIMEOUT,
                ),
            },
            widget: WidgetSettings {
                enabled: raw.widget.enabled.unwrap_or(true),
                kinds,
                dir: widget_dir,
            },
            scoring: ScoringSettings {
                window: raw.scoring.window.unwrap_or(DEFAULT_SCORE_WINDOW),
            },
        }
    }

    /// Settings used when no config file exists
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let mut raw = RawConfig::default();
        raw.service.data_dir = Some(data_dir);
        Self::from_raw(raw)
    }

    /// Point at another data directory (CLI/env override). A widget dir that
    /// was derived from the old data dir follows it.
    pub fn override_data_dir(&mut self, data_dir: PathBuf) {
        if self.widget.dir == self.service.data_dir.join("widget") {
            self.widget.dir = data_dir.join("widget");
        }
        self.service.data_dir = data_dir;
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_raw(RawConfig::default())
    }
}

fn seconds_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/playcache"));
        assert_eq!(
            settings.service.database_path(),
            PathBuf::from("/tmp/playcache/cache.db")
        );
        assert_eq!(
            settings.service.socket_path(),
            PathBuf::from("/tmp/playcache/playcached.sock")
        );
        assert_eq!(settings.widget.dir, PathBuf::from("/tmp/playcache/widget"));
        assert_eq!(settings.widget.kinds, WidgetKinds::all());
        assert_eq!(settings.remote.timeout, DEFAULT_REMOTE_TIMEOUT);
        assert_eq!(settings.connectivity.check_url, "http://127.0.0.1:8000/health");
        assert_eq!(settings.scoring.window, 10);
    }

    #[test]
    fn data_dir_override_moves_derived_widget_dir() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/var/lib/playcache"));
        settings.override_data_dir(PathBuf::from("/tmp/pc"));
        assert_eq!(settings.widget.dir, PathBuf::from("/tmp/pc/widget"));

        let mut raw = RawConfig::default();
        raw.service.data_dir = Some(PathBuf::from("/var/lib/playcache"));
        raw.widget.dir = Some(PathBuf::from("/run/widgets"));
        let mut settings = Settings::from_raw(raw);
        settings.override_data_dir(PathBuf::from("/tmp/pc"));
        assert_eq!(settings.widget.dir, PathBuf::from("/run/widgets"));
        assert_eq!(settings.service.database_path(), PathBuf::from("/tmp/pc/cache.db"));
        assert_eq!(settings.service.socket_path(), PathBuf::from("/tmp/pc/playcached.sock"));
    }

    #[test]
    fn widget_kinds_from_names() {
        let mut raw = RawConfig::default();
        raw.widget.kinds = Some(vec!["reward".into(), "notification".into()]);

        let settings = Settings::from_raw(raw);
        assert!(settings.widget.kinds.includes(RecordKind::Reward));
        assert!(settings.widget.kinds.includes(RecordKind::Notification));
        assert!(!settings.widget.kinds.includes(RecordKind::Telemetry));
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let mut raw = RawConfig::default();
        raw.remote.base_url = Some("https://coach.example.com/api/".into());

        let settings = Settings::from_raw(raw);
        assert_eq!(settings.remote.base_url, "https://coach.example.com/api");
        assert_eq!(
            settings.connectivity.check_url,
            "https://coach.example.com/api/health"
        );
    }

    #[test]
    fn explicit_check_url_wins() {
        let mut raw = RawConfig::default();
        raw.connectivity.check_url = Some("https://status.example.com/ping".into());
        raw.connectivity.check_interval_seconds = Some(10);

        let settings = Settings::from_raw(raw);
        assert_eq!(settings.connectivity.check_url, "https://status.example.com/ping");
        assert_eq!(settings.connectivity.check_interval, Duration::from_secs(10));
    }
}
