//! Supporting-sentence retrieval for brief recommendations.
//!
//! The brief never owns a knowledge base. It asks an `InsightSource` for
//! sentences about a pillar and topic. Retrieval is guarded by an explicit
//! `CircuitState` passed in by the caller: while the circuit is open and
//! inside its cool-down, no retrieval is attempted.

use crate::{brief::Pillar, error::DeskResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub trait InsightSource {
    fn retrieve(&self, pillar: Pillar, topic: &str) -> DeskResult<Vec<String>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CircuitState {
    pub open: bool,
    pub opened_at: Option<DateTime<Utc>>,
}

impl CircuitState {
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn tripped(now: DateTime<Utc>) -> Self {
        Self {
            open: true,
            opened_at: Some(now),
        }
    }

    /// Retrieval is allowed when closed, or once the cool-down has elapsed.
    pub fn allows_retrieval(&self, now: DateTime<Utc>, cooldown_secs: i64) -> bool {
        match (self.open, self.opened_at) {
            (false, _) => true,
            (true, None) => true,
            (true, Some(at)) => now - at >= Duration::seconds(cooldown_secs),
        }
    }
}

/// Canned sentences keyed by pillar. The default source.
#[derive(Debug, Clone, Default)]
pub struct StaticPlaybook;

impl InsightSource for StaticPlaybook {
    fn retrieve(&self, pillar: Pillar, _topic: &str) -> DeskResult<Vec<String>> {
        let sentences: &[&str] = match pillar {
            Pillar::Retention => &[
                "Members who attend eight or more classes in their first month are far more likely to stay past ninety days.",
                "A personal call from a coach outperforms automated email for members who have gone quiet.",
            ],
            Pillar::Acquisition => &[
                "Referrals from members convert better than any paid channel for small gyms.",
                "A time-boxed intro offer with a clear start date fills the first class.",
            ],
            Pillar::CommunityDepth => &[
                "Members with at least one friend in class stay longer than those who train alone.",
                "In-house competitions give newer members a reason to show up on the same day as regulars.",
            ],
            Pillar::CoachingQuality => &[
                "Coaches who learn every member's name and goal see steadier attendance.",
                "Short goal reviews every quarter keep training purposeful.",
            ],
        };
        Ok(sentences.iter().map(|s| s.to_string()).collect())
    }
}
