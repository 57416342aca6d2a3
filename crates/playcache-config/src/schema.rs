//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub service: RawServiceConfig,

    #[serde(default)]
    pub sync: RawSyncConfig,

    #[serde(default)]
    pub remote: RawRemoteConfig,

    #[serde(default)]
    pub connectivity: RawConnectivityConfig,

    #[serde(default)]
    pub widget: RawWidgetConfig,

    #[serde(default)]
    pub scoring: RawScoringConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            config_version: crate::CURRENT_CONFIG_VERSION,
            service: RawServiceConfig::default(),
            sync: RawSyncConfig::default(),
            remote: RawRemoteConfig::default(),
            connectivity: RawConnectivityConfig::default(),
            widget: RawWidgetConfig::default(),
            scoring: RawScoringConfig::default(),
        }
    }
}

/// Local storage settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the cache database (default: XDG data dir)
    pub data_dir: Option<PathBuf>,

    /// Database file name inside `data_dir` (default: cache.db)
    pub database: Option<String>,

    /// Command socket file name inside `data_dir` (default: playcached.sock)
    pub socket: Option<String>,
}

/// Sync scheduling
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSyncConfig {
    /// Seconds between periodic sync passes while online
    pub interval_seconds: Option<u64>,

    /// Trigger a sync pass right after a write when online
    pub fast_path: Option<bool>,
}

/// Remote gateway
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRemoteConfig {
    pub base_url: Option<String>,

    pub timeout_seconds: Option<u64>,

    /// Environment variable holding the bearer token
    pub auth_token_env: Option<String>,
}

/// Connectivity probe
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConnectivityConfig {
    /// URL to probe (default: `<base_url>/health`)
    pub check_url: Option<String>,

    pub check_interval_seconds: Option<u64>,

    pub check_timeout_seconds: Option<u64>,
}

/// Home-screen widget forwarding
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawWidgetConfig {
    pub enabled: Option<bool>,

    /// Kinds forwarded to the widget (default: every append-only kind)
    pub kinds: Option<Vec<String>>,

    /// Directory for widget snapshot files (default: `<data_dir>/widget`)
    pub dir: Option<PathBuf>,
}

/// Leaderboard composite score
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawScoringConfig {
    /// Number of most recent telemetry snapshots considered
    pub window: Option<usize>,
}
