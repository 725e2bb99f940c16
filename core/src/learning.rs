//! Learning feedback loop: did the recommendations the owner acted on
//! actually move the numbers?
//!
//! A brief recommendation is snapshotted as a `RecommendationCard` with its
//! checklist and a baseline (members, MRR, churn) from the stored metrics.
//! Once enough of the checklist is done the card is eligible, and
//! `run_learning_update` evaluates it at 30, 60 and 90 days against the
//! metrics of the month each window lands in. Outcomes feed two running
//! averages per intervention type: one for the gym, one global.
//!
//! RULES:
//!   - Each (card, window) is evaluated at most once. Re-running the update
//!     on the same day changes nothing.
//!   - Windows whose date has not passed, or whose month has no stored
//!     metrics yet, are skipped and retried on a later run.

use crate::{
    brief::BriefRecommendation,
    config::{LearningConfig, ScoringConfig},
    error::{DeskError, DeskResult},
    event::DeskEvent,
    interventions::InterventionType,
    store::DeskStore,
    types::{month_start, GymId},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GLOBAL_SCOPE: &str = "global";

pub fn gym_scope(gym_id: &str) -> String {
    format!("gym:{gym_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationCard {
    pub card_id: String,
    pub gym_id: GymId,
    pub template_id: String,
    pub intervention_type: InterventionType,
    pub title: String,
    pub created_on: NaiveDate,
    pub baseline_members: i64,
    pub baseline_mrr: f64,
    pub baseline_churn: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItem {
    pub card_id: String,
    pub item_index: i64,
    pub label: String,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningEvent {
    pub card_id: String,
    pub window_days: i64,
    pub gym_id: GymId,
    pub intervention_type: InterventionType,
    pub evaluated_on: NaiveDate,
    pub delta_mrr: f64,
    pub delta_members: i64,
    pub delta_churn: f64,
    pub overlap_factor: f64,
    pub impact_score: f64,
}

/// Running estimate for one intervention type in one scope
/// (`gym:<id>`, or `GLOBAL_SCOPE`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningStat {
    pub intervention_type: InterventionType,
    pub scope: String,
    pub expected_impact: f64,
    pub confidence: f64,
    pub samples: i64,
    pub updated_on: NaiveDate,
}

impl LearningStat {
    fn fresh(kind: InterventionType, scope: &str, cfg: &LearningConfig, today: NaiveDate) -> Self {
        Self {
            intervention_type: kind,
            scope: scope.to_string(),
            expected_impact: 0.0,
            confidence: cfg.initial_confidence,
            samples: 0,
            updated_on: today,
        }
    }

    fn absorb(&mut self, impact: f64, rate: f64, today: NaiveDate) {
        self.expected_impact += rate * (impact - self.expected_impact);
        self.confidence += rate * (1.0 - self.confidence);
        self.samples += 1;
        self.updated_on = today;
    }

    /// Multiplier applied to brief scores and intervention confidence.
    pub fn weight(&self, cfg: &LearningConfig) -> f64 {
        (1.0 + self.expected_impact / cfg.weight_scale * self.confidence)
            .clamp(cfg.weight_min, cfg.weight_max)
    }
}

// ── Cards ─────────────────────────────────────────────────────────

/// Snapshot a brief recommendation as a trackable card. The baseline comes
/// from the latest stored month on or before `created_on`; without any
/// stored metrics the baseline is zero.
pub fn snapshot_card(
    store: &DeskStore,
    gym_id: &str,
    recommendation: &BriefRecommendation,
    created_on: NaiveDate,
) -> DeskResult<RecommendationCard> {
    let baseline = store
        .recent_metrics(gym_id, month_start(created_on), 1)?
        .pop();
    let card = RecommendationCard {
        card_id: uuid::Uuid::new_v4().to_string(),
        gym_id: gym_id.to_string(),
        template_id: recommendation.template_id.clone(),
        intervention_type: recommendation.intervention_type,
        title: recommendation.title.clone(),
        created_on,
        baseline_members: baseline.as_ref().map(|m| m.active_members).unwrap_or(0),
        baseline_mrr: baseline.as_ref().map(|m| m.mrr).unwrap_or(0.0),
        baseline_churn: baseline.as_ref().map(|m| m.churn_rate).unwrap_or(0.0),
        score: recommendation.score,
    };
    store.insert_card(&card, &recommendation.checklist)?;
    store.append_event(&DeskEvent::RecommendationSnapshotted {
        gym_id: gym_id.to_string(),
        card_id: card.card_id.clone(),
        template_id: card.template_id.clone(),
    })?;
    log::info!(
        "snapshotted card {} ({}) for gym {gym_id}",
        card.card_id,
        card.template_id
    );
    Ok(card)
}

/// Mark a checklist item done (`Some(at)`) or not done (`None`).
pub fn set_checklist_item(
    store: &DeskStore,
    card_id: &str,
    item_index: i64,
    completed_at: Option<DateTime<Utc>>,
) -> DeskResult<()> {
    if !store.set_checklist_completed(card_id, item_index, completed_at)? {
        return Err(DeskError::NotFound {
            what: "checklist item",
            id: format!("{card_id}#{item_index}"),
        });
    }
    Ok(())
}

/// Share of checklist items completed. A card without a checklist has no
/// execution to measure.
pub fn execution_strength(items: &[ChecklistItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let done = items.iter().filter(|i| i.completed_at.is_some()).count();
    done as f64 / items.len() as f64
}

pub fn is_eligible(strength: f64, cfg: &LearningConfig) -> bool {
    strength >= cfg.execution_threshold.max(0.6)
}

fn overlap_factor(count: usize, cfg: &LearningConfig) -> f64 {
    match count {
        0 | 1 => cfg.overlap_factors[0],
        2 => cfg.overlap_factors[1],
        _ => cfg.overlap_factors[2],
    }
}

// ── Update ────────────────────────────────────────────────────────

/// Evaluate every eligible card against every due window. Returns the
/// number of new learning events recorded.
pub fn run_learning_update(
    store: &DeskStore,
    config: &ScoringConfig,
    as_of: NaiveDate,
) -> DeskResult<usize> {
    let cfg = &config.learning;

    let mut eligible: Vec<RecommendationCard> = Vec::new();
    for card in store.all_cards()? {
        let strength = execution_strength(&store.checklist_for_card(&card.card_id)?);
        if is_eligible(strength, cfg) {
            eligible.push(card);
        } else {
            log::debug!("card {} not eligible (execution {strength:.2})", card.card_id);
        }
    }

    let mut recorded = 0;
    for card in &eligible {
        let concurrent = eligible
            .iter()
            .filter(|other| {
                other.gym_id == card.gym_id
                    && (other.created_on - card.created_on).num_days().abs()
                        <= cfg.overlap_window_days
            })
            .count();
        let overlap = overlap_factor(concurrent, cfg);
        let quality = (card.baseline_members as f64 / cfg.quality_roster_divisor)
            .clamp(cfg.quality_min, cfg.quality_max);

        for &window in &cfg.evaluation_windows {
            let due = card.created_on + Duration::days(window);
            if due > as_of || store.learning_event_exists(&card.card_id, window)? {
                continue;
            }
            let Some(outcome) = store.monthly_metrics(&card.gym_id, month_start(due))? else {
                log::debug!(
                    "no metrics for {} yet; card {} window {window} deferred",
                    month_start(due),
                    card.card_id
                );
                continue;
            };

            let delta_mrr = outcome.mrr - card.baseline_mrr;
            let delta_members = outcome.active_members - card.baseline_members;
            let delta_churn = card.baseline_churn - outcome.churn_rate;
            let raw = delta_mrr * cfg.mrr_weight
                + delta_members as f64 * cfg.member_weight
                + delta_churn * cfg.churn_weight;
            let impact = raw * overlap;

            let event = LearningEvent {
                card_id: card.card_id.clone(),
                window_days: window,
                gym_id: card.gym_id.clone(),
                intervention_type: card.intervention_type,
                evaluated_on: as_of,
                delta_mrr,
                delta_members,
                delta_churn,
                overlap_factor: overlap,
                impact_score: impact,
            };
            if !store.insert_learning_event(&event)? {
                continue;
            }

            for (scope, rate) in [
                (gym_scope(&card.gym_id), cfg.gym_learning_rate * quality),
                (GLOBAL_SCOPE.to_string(), cfg.global_learning_rate * quality),
            ] {
                let mut stat = store
                    .learning_stat(card.intervention_type, &scope)?
                    .unwrap_or_else(|| {
                        LearningStat::fresh(card.intervention_type, &scope, cfg, as_of)
                    });
                stat.absorb(impact, rate, as_of);
                store.upsert_learning_stat(&stat)?;
            }

            store.append_event(&DeskEvent::LearningUpdated {
                gym_id: card.gym_id.clone(),
                card_id: card.card_id.clone(),
                window_days: window,
                impact_score: impact,
            })?;
            recorded += 1;
        }
    }

    log::info!(
        "learning update as of {as_of}: {} eligible cards, {recorded} new outcomes",
        eligible.len()
    );
    Ok(recorded)
}

// ── Weights ───────────────────────────────────────────────────────

/// The gym's own estimate once it has enough samples, otherwise the
/// global one. 1.0 when nothing has been learned.
pub fn learned_weight(
    store: &DeskStore,
    cfg: &LearningConfig,
    gym_id: &str,
    kind: InterventionType,
) -> DeskResult<f64> {
    let stat = match store.learning_stat(kind, &gym_scope(gym_id))? {
        Some(gym) if gym.samples >= cfg.min_gym_samples => Some(gym),
        _ => store.learning_stat(kind, GLOBAL_SCOPE)?,
    };
    Ok(stat.map(|s| s.weight(cfg)).unwrap_or(1.0))
}

pub fn learned_weights(
    store: &DeskStore,
    cfg: &LearningConfig,
    gym_id: &str,
) -> DeskResult<BTreeMap<InterventionType, f64>> {
    InterventionType::ALL
        .iter()
        .map(|&kind| Ok((kind, learned_weight(store, cfg, gym_id, kind)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(done: usize, total: usize) -> Vec<ChecklistItem> {
        (0..total)
            .map(|i| ChecklistItem {
                card_id: "c".into(),
                item_index: i as i64,
                label: format!("step {i}"),
                completed_at: (i < done).then(Utc::now),
            })
            .collect()
    }

    #[test]
    fn eligibility_needs_sixty_percent() {
        let cfg = LearningConfig::default();
        assert_eq!(execution_strength(&[]), 0.0);
        assert!(!is_eligible(execution_strength(&items(1, 2)), &cfg));
        assert!(is_eligible(execution_strength(&items(3, 5)), &cfg));
        let lax = LearningConfig { execution_threshold: 0.2, ..LearningConfig::default() };
        assert!(!is_eligible(0.5, &lax));
    }

    #[test]
    fn stat_update_moves_toward_impact() {
        let cfg = LearningConfig::default();
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut stat = LearningStat::fresh(InterventionType::WinBack, GLOBAL_SCOPE, &cfg, today);
        stat.absorb(500.0, 0.06, today);
        assert!((stat.expected_impact - 30.0).abs() < 1e-9);
        assert!((stat.confidence - 0.342).abs() < 1e-9);
        assert_eq!(stat.samples, 1);
    }

    #[test]
    fn weight_is_clamped() {
        let cfg = LearningConfig::default();
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut stat = LearningStat::fresh(InterventionType::WinBack, GLOBAL_SCOPE, &cfg, today);
        stat.expected_impact = 100_000.0;
        stat.confidence = 1.0;
        assert_eq!(stat.weight(&cfg), 1.25);
        stat.expected_impact = -100_000.0;
        assert_eq!(stat.weight(&cfg), 0.75);
        stat.expected_impact = 200.0;
        stat.confidence = 0.5;
        assert!((stat.weight(&cfg) - 1.1).abs() < 1e-9);
    }

    #[test]
    fn overlap_factors_step_down() {
        let cfg = LearningConfig::default();
        assert_eq!(overlap_factor(1, &cfg), 1.0);
        assert_eq!(overlap_factor(2, &cfg), 0.7);
        assert_eq!(overlap_factor(5, &cfg), 0.5);
    }
}
