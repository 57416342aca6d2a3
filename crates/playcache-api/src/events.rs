//! Envelopes pushed outward to OS-level widget surfaces

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RecordKind, SyncRecord};

/// Latest-snapshot envelope handed to the widget layer after a put
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetEnvelope {
    pub kind: RecordKind,
    pub record: SyncRecord,
    pub timestamp: DateTime<Utc>,
}

impl WidgetEnvelope {
    pub fn new(record: SyncRecord) -> Self {
        Self {
            kind: record.kind(),
            record,
            timestamp: playcache_util::now(),
        }
    }
}

bitflags! {
    /// Set of kinds whose writes are forwarded to the widget layer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WidgetKinds: u8 {
        const TELEMETRY = 1 << 0;
        const HIGHLIGHT = 1 << 1;
        const REWARD = 1 << 2;
        const DRILL_LOG = 1 << 3;
        const NOTIFICATION = 1 << 4;
    }
}

impl WidgetKinds {
    /// Flag for a kind; profiles are never forwarded
    pub fn for_kind(kind: RecordKind) -> WidgetKinds {
        match kind {
            RecordKind::Telemetry => WidgetKinds::TELEMETRY,
            RecordKind::Highlight => WidgetKinds::HIGHLIGHT,
            RecordKind::Reward => WidgetKinds::REWARD,
            RecordKind::DrillLog => WidgetKinds::DRILL_LOG,
            RecordKind::Notification => WidgetKinds::NOTIFICATION,
            RecordKind::Profile => WidgetKinds::empty(),
        }
    }

    pub fn includes(&self, kind: RecordKind) -> bool {
        let flag = WidgetKinds::for_kind(kind);
        !flag.is_empty() && self.contains(flag)
    }
}

impl Default for WidgetKinds {
    fn default() -> Self {
        WidgetKinds::all()
    }
}

impl FromIterator<RecordKind> for WidgetKinds {
    fn from_iter<I: IntoIterator<Item = RecordKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(WidgetKinds::empty(), |acc, kind| acc | WidgetKinds::for_kind(kind))
    }
}
