//! Scoring configuration. Every hand-tuned constant in one versioned place.
//!
//! RULE: scoring code never inlines a threshold. RSI/RES tiers, risk rule
//! weights, intervention base rates, template priors and learning rates are
//! all read from `ScoringConfig`, so a behaviour change is a config diff.
//!
//! `ScoringConfig::default()` is the shipped model. `ScoringConfig::load()`
//! reads a JSON file; any section left out of the file keeps its default.

use crate::{interventions::InterventionType, risk_engine::GymArchetype};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CONFIG_VERSION: &str = "2026.10-1";

// ── Tier tables ────────────────────────────────────────────────────

/// One row of a tiered score table. Tables are evaluated top-down and the
/// first matching row wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreTier {
    pub min: f64,
    pub points: f64,
}

impl ScoreTier {
    pub fn new(min: f64, points: f64) -> Self {
        Self { min, points }
    }
}

/// First tier whose `min` is ≤ value (inclusive lower bound).
pub fn tier_at_or_above(tiers: &[ScoreTier], value: f64) -> Option<f64> {
    tiers.iter().find(|t| value >= t.min).map(|t| t.points)
}

/// First tier whose `min` is strictly below value.
pub fn tier_above(tiers: &[ScoreTier], value: f64) -> Option<f64> {
    tiers.iter().find(|t| value > t.min).map(|t| t.points)
}

// ── Import ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLimits {
    pub sample_rows: usize,
    pub preview_errors: usize,
    /// Errors kept per row once past the sample window.
    pub errors_per_row_truncated: usize,
    pub response_errors: usize,
    pub persisted_errors: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            sample_rows: 20,
            preview_errors: 100,
            errors_per_row_truncated: 3,
            response_errors: 50,
            persisted_errors: 200,
        }
    }
}

// ── RSI ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsiConfig {
    pub base: f64,
    /// Churn-rate penalties, inclusive lower bounds (percent).
    pub churn_penalties: Vec<ScoreTier>,
    /// Cancels ÷ active at month start penalties, strict lower bounds (percent).
    pub early_churn_penalties: Vec<ScoreTier>,
    /// Average-tenure bonuses, inclusive lower bounds (months).
    pub tenure_bonuses: Vec<ScoreTier>,
    pub short_tenure_months: f64,
    pub short_tenure_penalty: f64,
    pub growth_rate_pct: f64,
    pub growth_bonus: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            base: 100.0,
            churn_penalties: vec![
                ScoreTier::new(10.0, -40.0),
                ScoreTier::new(7.0, -25.0),
                ScoreTier::new(5.0, -15.0),
                ScoreTier::new(3.0, -5.0),
            ],
            early_churn_penalties: vec![
                ScoreTier::new(10.0, -15.0),
                ScoreTier::new(5.0, -8.0),
            ],
            tenure_bonuses: vec![ScoreTier::new(12.0, 10.0), ScoreTier::new(6.0, 5.0)],
            short_tenure_months: 3.0,
            short_tenure_penalty: -10.0,
            growth_rate_pct: 5.0,
            growth_bonus: 5.0,
        }
    }
}

// ── RES ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResConfig {
    pub arm_tiers: Vec<ScoreTier>,
    pub arm_floor: f64,
    pub member_tiers: Vec<ScoreTier>,
    pub member_floor: f64,
    pub mrr_tiers: Vec<ScoreTier>,
    pub mrr_floor: f64,
    pub cap: f64,
}

impl Default for ResConfig {
    fn default() -> Self {
        Self {
            arm_tiers: vec![
                ScoreTier::new(150.0, 40.0),
                ScoreTier::new(100.0, 30.0),
                ScoreTier::new(75.0, 20.0),
            ],
            arm_floor: 10.0,
            member_tiers: vec![
                ScoreTier::new(200.0, 30.0),
                ScoreTier::new(100.0, 20.0),
                ScoreTier::new(50.0, 10.0),
            ],
            member_floor: 5.0,
            mrr_tiers: vec![
                ScoreTier::new(30_000.0, 30.0),
                ScoreTier::new(15_000.0, 20.0),
                ScoreTier::new(5_000.0, 10.0),
            ],
            mrr_floor: 5.0,
            cap: 100.0,
        }
    }
}

// ── Metrics ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Churn assumed when a month shows none, to keep LTV finite.
    pub default_churn_decimal: f64,
    pub risk_window_days: i64,
    /// LTV-impact ceiling, as a multiple of ARM.
    pub ltv_ceiling_multiple: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            default_churn_decimal: 0.05,
            risk_window_days: 60,
            ltv_ceiling_multiple: 100.0,
        }
    }
}

// ── Member risk ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenureBand {
    pub max_days: i64,
    pub impact: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRuleConfig {
    pub never_new_days: i64,
    pub never_new_impact: f64,
    pub never_mid_days: i64,
    pub never_mid_impact: f64,
    pub onboarding_window_days: i64,
    pub onboarding_gap_days: i64,
    pub onboarding_gap_impact: f64,
    pub stale_gap_days: i64,
    pub stale_gap_impact: f64,
    pub recent_gap_days: i64,
    pub recent_impact: f64,
}

impl Default for ContactRuleConfig {
    fn default() -> Self {
        Self {
            never_new_days: 60,
            never_new_impact: 0.20,
            never_mid_days: 180,
            never_mid_impact: 0.10,
            onboarding_window_days: 90,
            onboarding_gap_days: 30,
            onboarding_gap_impact: 0.15,
            stale_gap_days: 60,
            stale_gap_impact: 0.08,
            recent_gap_days: 14,
            recent_impact: -0.06,
        }
    }
}

/// Gym archetype thresholds and the per-archetype member adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeConfig {
    pub turnaround_churn_pct: f64,
    pub boutique_arm: f64,
    pub anchor_churn_pct: f64,
    pub turnaround_new_days: i64,
    pub turnaround_new_impact: f64,
    pub turnaround_other_impact: f64,
    pub boutique_contact_gap_days: i64,
    pub boutique_uncontacted_impact: f64,
    pub boutique_contacted_impact: f64,
    pub anchor_established_days: i64,
    pub anchor_established_impact: f64,
    pub anchor_other_impact: f64,
    pub growth_new_days: i64,
    pub growth_new_impact: f64,
    pub growth_other_impact: f64,
}

impl Default for ArchetypeConfig {
    fn default() -> Self {
        Self {
            turnaround_churn_pct: 6.0,
            boutique_arm: 150.0,
            anchor_churn_pct: 3.0,
            turnaround_new_days: 90,
            turnaround_new_impact: 0.04,
            turnaround_other_impact: 0.02,
            boutique_contact_gap_days: 30,
            boutique_uncontacted_impact: 0.03,
            boutique_contacted_impact: -0.01,
            anchor_established_days: 180,
            anchor_established_impact: -0.02,
            anchor_other_impact: 0.01,
            growth_new_days: 60,
            growth_new_impact: 0.03,
            growth_other_impact: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModelConfig {
    pub base_probability: f64,
    pub min_probability: f64,
    pub max_probability: f64,
    pub tenure_bands: Vec<TenureBand>,
    pub contact: ContactRuleConfig,
    pub archetype: ArchetypeConfig,
    pub gym_churn_high_pct: f64,
    pub gym_churn_high_impact: f64,
    pub gym_churn_elevated_pct: f64,
    pub gym_churn_elevated_impact: f64,
    pub below_average_ratio: f64,
    pub below_average_impact: f64,
    pub early_cancel_share: f64,
    pub early_cancel_days: i64,
    pub cancel_window_multiplier: f64,
    pub cancel_window_impact: f64,
    pub high_value_percentile: f64,
    pub high_value_min_tenure: i64,
    pub high_value_impact: f64,
    pub loyalty_days: i64,
    pub loyalty_impact: f64,
    pub urgency_threshold: f64,
    pub urgency_max_impact: f64,
    pub onboarding_decay_days: f64,
    pub contact_decay_days: f64,
    pub core_max_probability: f64,
    pub core_min_tenure: i64,
    pub drifter_max_probability: f64,
    pub at_risk_max_probability: f64,
    /// Drifters at or under this tenure count as new-member drift.
    pub new_drifter_days: i64,
    pub max_expected_months: f64,
    pub revenue_at_risk_months: f64,
    /// Tenure marks (days) that count as milestones; each later year too.
    pub milestone_days: Vec<i64>,
}

impl Default for RiskModelConfig {
    fn default() -> Self {
        Self {
            base_probability: 0.03,
            min_probability: 0.01,
            max_probability: 0.95,
            tenure_bands: vec![
                TenureBand { max_days: 14, impact: 0.34 },
                TenureBand { max_days: 30, impact: 0.26 },
                TenureBand { max_days: 60, impact: 0.18 },
                TenureBand { max_days: 90, impact: 0.12 },
                TenureBand { max_days: 180, impact: 0.08 },
                TenureBand { max_days: 270, impact: 0.05 },
                TenureBand { max_days: 365, impact: 0.03 },
            ],
            contact: ContactRuleConfig::default(),
            archetype: ArchetypeConfig::default(),
            gym_churn_high_pct: 7.0,
            gym_churn_high_impact: 0.06,
            gym_churn_elevated_pct: 5.0,
            gym_churn_elevated_impact: 0.03,
            below_average_ratio: 0.7,
            below_average_impact: 0.04,
            early_cancel_share: 0.4,
            early_cancel_days: 90,
            cancel_window_multiplier: 1.2,
            cancel_window_impact: 0.05,
            high_value_percentile: 0.8,
            high_value_min_tenure: 90,
            high_value_impact: -0.03,
            loyalty_days: 365,
            loyalty_impact: -0.05,
            urgency_threshold: 0.5,
            urgency_max_impact: 0.08,
            onboarding_decay_days: 90.0,
            contact_decay_days: 60.0,
            core_max_probability: 0.15,
            core_min_tenure: 90,
            drifter_max_probability: 0.30,
            at_risk_max_probability: 0.55,
            new_drifter_days: 90,
            max_expected_months: 60.0,
            revenue_at_risk_months: 12.0,
            milestone_days: vec![30, 90, 180, 365],
        }
    }
}

// ── Interventions ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrgencyMultipliers {
    pub immediate: f64,
    pub this_week: f64,
    pub this_month: f64,
    pub monitor: f64,
}

impl Default for UrgencyMultipliers {
    fn default() -> Self {
        Self { immediate: 1.5, this_week: 1.25, this_month: 1.0, monitor: 0.8 }
    }
}

/// Probability cut points shared by member urgency and the selection table.
/// Each is a strict lower bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityBands {
    pub immediate: f64,
    pub this_week: f64,
    pub this_month: f64,
}

impl Default for ProbabilityBands {
    fn default() -> Self {
        Self { immediate: 0.55, this_week: 0.30, this_month: 0.15 }
    }
}

/// Tenure limits (days) read by the selection table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub bands: ProbabilityBands,
    pub new_member_days: i64,
    pub onboarding_days: i64,
    pub integration_days: i64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            bands: ProbabilityBands::default(),
            new_member_days: 60,
            onboarding_days: 90,
            integration_days: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeModifier {
    pub archetype: GymArchetype,
    pub intervention: InterventionType,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionConfig {
    pub base_churn_delta: BTreeMap<InterventionType, f64>,
    pub confidence_prior: BTreeMap<InterventionType, f64>,
    pub archetype_modifiers: Vec<ArchetypeModifier>,
    pub repeat_window_days: i64,
    pub repeat_penalty: f64,
    pub stale_contact_days: i64,
    pub stale_boost: f64,
    pub confidence_cap: f64,
    pub urgency: UrgencyMultipliers,
    pub selection: SelectionConfig,
    pub high_value_weight: f64,
    pub revenue_horizon_months: f64,
    pub top_n: usize,
    /// Days either side of a tenure anniversary that count as "near".
    pub milestone_window_days: i64,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        use GymArchetype as A;
        use InterventionType as I;

        let base_churn_delta = BTreeMap::from([
            (I::OnboardingAcceleration, 0.12),
            (I::PersonalOutreach, 0.10),
            (I::WinBack, 0.08),
            (I::CoachConnection, 0.09),
            (I::GoalSetting, 0.07),
            (I::CommunityIntegration, 0.06),
            (I::MilestoneCelebration, 0.04),
            (I::PricingReview, 0.05),
        ]);
        let confidence_prior = BTreeMap::from([
            (I::OnboardingAcceleration, 0.72),
            (I::PersonalOutreach, 0.68),
            (I::WinBack, 0.45),
            (I::CoachConnection, 0.64),
            (I::GoalSetting, 0.60),
            (I::CommunityIntegration, 0.58),
            (I::MilestoneCelebration, 0.55),
            (I::PricingReview, 0.50),
        ]);
        let m = |archetype, intervention, multiplier| ArchetypeModifier {
            archetype,
            intervention,
            multiplier,
        };
        Self {
            base_churn_delta,
            confidence_prior,
            archetype_modifiers: vec![
                m(A::GrowthAccelerator, I::OnboardingAcceleration, 1.2),
                m(A::GrowthAccelerator, I::CommunityIntegration, 1.1),
                m(A::CommunityAnchor, I::CommunityIntegration, 1.2),
                m(A::CommunityAnchor, I::MilestoneCelebration, 1.15),
                m(A::PremiumBoutique, I::CoachConnection, 1.2),
                m(A::PremiumBoutique, I::PricingReview, 0.8),
                m(A::TurnaroundLab, I::PersonalOutreach, 1.15),
                m(A::TurnaroundLab, I::WinBack, 1.15),
                m(A::TurnaroundLab, I::MilestoneCelebration, 0.85),
            ],
            repeat_window_days: 30,
            repeat_penalty: 0.6,
            stale_contact_days: 30,
            stale_boost: 1.15,
            confidence_cap: 0.95,
            urgency: UrgencyMultipliers::default(),
            selection: SelectionConfig::default(),
            high_value_weight: 1.3,
            revenue_horizon_months: 12.0,
            top_n: 3,
            milestone_window_days: 14,
        }
    }
}

// ── Strategic brief ────────────────────────────────────────────────

/// Trigger thresholds for the brief templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateTriggers {
    /// 30-day early-loss rate, strict.
    pub early_loss_rate: f64,
    pub churn_spike_pct: f64,
    pub referral_max_churn_pct: f64,
    pub referral_min_active: f64,
    /// New joins below this share of the roster trigger an intro refresh.
    pub intro_min_join_share: f64,
    pub challenge_min_active: f64,
    pub goal_review_min_flagged: f64,
    pub premium_max_arm: f64,
    pub premium_min_active: f64,
}

impl Default for TemplateTriggers {
    fn default() -> Self {
        Self {
            early_loss_rate: 0.15,
            churn_spike_pct: 5.0,
            referral_max_churn_pct: 5.0,
            referral_min_active: 20.0,
            intro_min_join_share: 0.05,
            challenge_min_active: 10.0,
            goal_review_min_flagged: 3.0,
            premium_max_arm: 150.0,
            premium_min_active: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefConfig {
    /// Per-template confidence overrides, keyed by template id.
    pub template_confidence: BTreeMap<String, f64>,
    pub trend_threshold_pts: f64,
    pub rising_urgency: f64,
    pub improving_urgency: f64,
    pub open_season_urgency: f64,
    pub january_acquisition_urgency: f64,
    pub roi_success_rate: f64,
    pub cohort_alert_survival: f64,
    pub cohort_alert_min_members: usize,
    pub triggers: TemplateTriggers,
    pub circuit_cooldown_secs: i64,
}

impl Default for BriefConfig {
    fn default() -> Self {
        Self {
            template_confidence: BTreeMap::new(),
            trend_threshold_pts: 0.5,
            rising_urgency: 1.3,
            improving_urgency: 0.9,
            open_season_urgency: 1.4,
            january_acquisition_urgency: 1.2,
            roi_success_rate: 0.30,
            cohort_alert_survival: 0.60,
            cohort_alert_min_members: 3,
            triggers: TemplateTriggers::default(),
            circuit_cooldown_secs: 300,
        }
    }
}

// ── Learning ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    pub execution_threshold: f64,
    pub evaluation_windows: Vec<i64>,
    pub mrr_weight: f64,
    pub member_weight: f64,
    pub churn_weight: f64,
    /// Overlap down-weighting for 1, 2 and 3+ concurrent cards.
    pub overlap_factors: [f64; 3],
    pub overlap_window_days: i64,
    pub gym_learning_rate: f64,
    pub global_learning_rate: f64,
    pub quality_roster_divisor: f64,
    pub quality_min: f64,
    pub quality_max: f64,
    pub initial_confidence: f64,
    pub min_gym_samples: i64,
    pub weight_scale: f64,
    pub weight_min: f64,
    pub weight_max: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            execution_threshold: 0.6,
            evaluation_windows: vec![30, 60, 90],
            mrr_weight: 0.65,
            member_weight: 35.0,
            churn_weight: 120.0,
            overlap_factors: [1.0, 0.7, 0.5],
            overlap_window_days: 90,
            gym_learning_rate: 0.06,
            global_learning_rate: 0.03,
            quality_roster_divisor: 100.0,
            quality_min: 0.2,
            quality_max: 1.0,
            initial_confidence: 0.3,
            min_gym_samples: 3,
            weight_scale: 1000.0,
            weight_min: 0.75,
            weight_max: 1.25,
        }
    }
}

// ── Scenario ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub history_months: usize,
    pub horizon_months: usize,
    pub upside_sigma: f64,
    pub downside_churn_sigma: f64,
    pub downside_new_sigma: f64,
    pub critical_ratio: f64,
    pub high_ratio: f64,
    pub moderate_ratio: f64,
    pub monte_carlo_runs: usize,
    pub monte_carlo_seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            history_months: 3,
            horizon_months: 6,
            upside_sigma: 1.0,
            downside_churn_sigma: 1.5,
            downside_new_sigma: 1.0,
            critical_ratio: 0.60,
            high_ratio: 0.80,
            moderate_ratio: 0.95,
            monte_carlo_runs: 500,
            monte_carlo_seed: 0x6D5E_ED01,
        }
    }
}

// ── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub version: String,
    pub import: ImportLimits,
    pub metrics: MetricsConfig,
    pub rsi: RsiConfig,
    pub res: ResConfig,
    pub risk: RiskModelConfig,
    pub interventions: InterventionConfig,
    pub brief: BriefConfig,
    pub learning: LearningConfig,
    pub scenario: ScenarioConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            import: ImportLimits::default(),
            metrics: MetricsConfig::default(),
            rsi: RsiConfig::default(),
            res: ResConfig::default(),
            risk: RiskModelConfig::default(),
            interventions: InterventionConfig::default(),
            brief: BriefConfig::default(),
            learning: LearningConfig::default(),
            scenario: ScenarioConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// Load from a JSON file. Sections missing from the file keep defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ScoringConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        log::info!("loaded scoring config version {} from {path}", config.version);
        Ok(config)
    }

    pub fn base_churn_delta(&self, kind: InterventionType) -> f64 {
        self.interventions.base_churn_delta.get(&kind).copied().unwrap_or(0.05)
    }

    pub fn confidence_prior(&self, kind: InterventionType) -> f64 {
        self.interventions.confidence_prior.get(&kind).copied().unwrap_or(0.5)
    }

    /// Product of every archetype modifier registered for this pair.
    pub fn archetype_multiplier(&self, archetype: GymArchetype, kind: InterventionType) -> f64 {
        self.interventions
            .archetype_modifiers
            .iter()
            .filter(|m| m.archetype == archetype && m.intervention == kind)
            .map(|m| m.multiplier)
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_tiers_take_the_boundary() {
        let rsi = RsiConfig::default();
        assert_eq!(tier_at_or_above(&rsi.churn_penalties, 5.0), Some(-15.0));
        assert_eq!(tier_at_or_above(&rsi.churn_penalties, 5.01), Some(-15.0));
        assert_eq!(tier_at_or_above(&rsi.churn_penalties, 2.99), None);
    }

    #[test]
    fn strict_tiers_skip_the_boundary() {
        let rsi = RsiConfig::default();
        assert_eq!(tier_above(&rsi.early_churn_penalties, 10.0), Some(-8.0));
        assert_eq!(tier_above(&rsi.early_churn_penalties, 5.0), None);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ScoringConfig =
            serde_json::from_str(r#"{"version":"test-1"}"#).unwrap();
        assert_eq!(cfg.version, "test-1");
        assert_eq!(cfg.import.sample_rows, 20);
        assert_eq!(cfg.risk.tenure_bands.len(), 7);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = ScoringConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ScoringConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.base_churn_delta(InterventionType::WinBack),
            cfg.base_churn_delta(InterventionType::WinBack)
        );
    }
}
