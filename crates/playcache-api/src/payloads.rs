//! Kind-specific payload shapes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::RecordKind;

/// Stats snapshot captured at the end of a training or match session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Collector-assigned session identifier
    pub session_id: String,
    pub sport: String,
    /// Overall session score (0-100); feeds the composite score
    pub score: f64,
    pub duration_secs: u64,
    /// Free-form named metrics (e.g. "accuracy", "top_speed_kmh")
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// Metadata for a recorded highlight clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaHighlight {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Remote media URLs; empty while the clip only exists locally
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Performance stats attached to the clip
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,
}

/// Badge, XP grant, or similar reward earned by the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEvent {
    pub reward_type: String,
    pub name: String,
    #[serde(default)]
    pub points: i64,
    pub reason: Option<String>,
}

/// One logged drill run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillLog {
    pub drill_id: String,
    pub drill_name: String,
    #[serde(default)]
    pub reps: u32,
    #[serde(default)]
    pub duration_secs: u64,
    /// Fraction of successful reps in 0.0..=1.0
    pub success_rate: Option<f64>,
    pub notes: Option<String>,
}

/// A notification delivered to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub category: String,
    pub deep_link: Option<String>,
}

/// Cached user profile and preferences. Upserted, not appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub display_name: String,
    pub sport: Option<String>,
    pub skill_level: Option<String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, serde_json::Value>,
}

/// Tagged union over every record kind's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Telemetry(TelemetrySnapshot),
    Highlight(MediaHighlight),
    Reward(RewardEvent),
    DrillLog(DrillLog),
    Notification(Notification),
    Profile(ProfileSnapshot),
}

impl Payload {
    pub fn kind(&self) -> RecordKind {
        match self {
            Payload::Telemetry(_) => RecordKind::Telemetry,
            Payload::Highlight(_) => RecordKind::Highlight,
            Payload::Reward(_) => RecordKind::Reward,
            Payload::DrillLog(_) => RecordKind::DrillLog,
            Payload::Notification(_) => RecordKind::Notification,
            Payload::Profile(_) => RecordKind::Profile,
        }
    }

    pub fn as_telemetry(&self) -> Option<&TelemetrySnapshot> {
        match self {
            Payload::Telemetry(t) => Some(t),
            _ => None,
        }
    }
}

impl From<TelemetrySnapshot> for Payload {
    fn from(p: TelemetrySnapshot) -> Self {
        Payload::Telemetry(p)
    }
}

impl From<MediaHighlight> for Payload {
    fn from(p: MediaHighlight) -> Self {
        Payload::Highlight(p)
    }
}

impl From<RewardEvent> for Payload {
    fn from(p: RewardEvent) -> Self {
        Payload::Reward(p)
    }
}

impl From<DrillLog> for Payload {
    fn from(p: DrillLog) -> Self {
        Payload::DrillLog(p)
    }
}

impl From<Notification> for Payload {
    fn from(p: Notification) -> Self {
        Payload::Notification(p)
    }
}

impl From<ProfileSnapshot> for Payload {
    fn from(p: ProfileSnapshot) -> Self {
        Payload::Profile(p)
    }
}
