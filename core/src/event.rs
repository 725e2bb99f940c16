//! The desk event log: an append-only record of what changed and when.
//!
//! RULE: every operation that mutates stored state appends one event.
//! Variants are added over time, never removed or reordered.

use crate::types::GymId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeskEvent {
    ImportCommitted {
        gym_id: GymId,
        file_hash: String,
        imported: usize,
        updated: usize,
        skipped: usize,
        error_count: usize,
    },
    MetricsRecomputed {
        gym_id: GymId,
        first_month: NaiveDate,
        last_month: NaiveDate,
        months: usize,
    },
    ContactLogged {
        gym_id: GymId,
        member_id: String,
    },
    RecommendationSnapshotted {
        gym_id: GymId,
        card_id: String,
        template_id: String,
    },
    LearningUpdated {
        gym_id: GymId,
        card_id: String,
        window_days: i64,
        impact_score: f64,
    },
    SyncCompleted {
        gym_id: GymId,
        fetched: usize,
        transformed: usize,
        imported: usize,
        updated: usize,
    },
}

impl DeskEvent {
    pub fn gym_id(&self) -> &str {
        match self {
            Self::ImportCommitted { gym_id, .. }
            | Self::MetricsRecomputed { gym_id, .. }
            | Self::ContactLogged { gym_id, .. }
            | Self::RecommendationSnapshotted { gym_id, .. }
            | Self::LearningUpdated { gym_id, .. }
            | Self::SyncCompleted { gym_id, .. } => gym_id,
        }
    }

    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ImportCommitted { .. } => "import_committed",
            Self::MetricsRecomputed { .. } => "metrics_recomputed",
            Self::ContactLogged { .. } => "contact_logged",
            Self::RecommendationSnapshotted { .. } => "recommendation_snapshotted",
            Self::LearningUpdated { .. } => "learning_updated",
            Self::SyncCompleted { .. } => "sync_completed",
        }
    }
}

/// A persisted event log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub gym_id: GymId,
    pub event_type: String,
    pub payload: String,
    pub created_at: String,
}

impl EventLogEntry {
    pub fn decode(&self) -> serde_json::Result<DeskEvent> {
        serde_json::from_str(&self.payload)
    }
}
