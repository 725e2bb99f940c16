//! Composite scores attached to every monthly metrics row.
//!
//!   RSI: Retention Stability Index, 0–100 integer
//!   RES: Revenue Efficiency Score, 0–100
//!   LTV impact: annual value of cutting churn by one point
//!
//! All tiers come from `ScoringConfig`; nothing here holds a constant.

use crate::config::{tier_above, tier_at_or_above, ResConfig, RsiConfig};
use serde::{Deserialize, Serialize};

/// Everything RSI reads from one month.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RsiInputs {
    pub churn_rate: f64,
    pub active_start: i64,
    pub new_members: i64,
    /// Cancels dated inside the month.
    pub cancels: i64,
    /// Mean tenure of members active at month end, in 30-day months.
    /// `None` when nobody is active.
    pub avg_tenure_months: Option<f64>,
}

pub fn compute_rsi(inputs: &RsiInputs, cfg: &RsiConfig) -> i64 {
    let mut score = cfg.base;

    score += tier_at_or_above(&cfg.churn_penalties, inputs.churn_rate).unwrap_or(0.0);

    if inputs.active_start > 0 {
        let base = inputs.active_start as f64;
        let cancel_pct = inputs.cancels as f64 / base * 100.0;
        score += tier_above(&cfg.early_churn_penalties, cancel_pct).unwrap_or(0.0);

        let growth_pct = inputs.new_members as f64 / base * 100.0;
        if growth_pct > cfg.growth_rate_pct {
            score += cfg.growth_bonus;
        }
    }

    if let Some(months) = inputs.avg_tenure_months {
        match tier_at_or_above(&cfg.tenure_bonuses, months) {
            Some(bonus) => score += bonus,
            None if months < cfg.short_tenure_months => score += cfg.short_tenure_penalty,
            None => {}
        }
    }

    score.clamp(0.0, 100.0).round() as i64
}

pub fn compute_res(arm: f64, active_members: i64, mrr: f64, cfg: &ResConfig) -> f64 {
    let arm_pts = tier_at_or_above(&cfg.arm_tiers, arm).unwrap_or(cfg.arm_floor);
    let member_pts =
        tier_at_or_above(&cfg.member_tiers, active_members as f64).unwrap_or(cfg.member_floor);
    let mrr_pts = tier_at_or_above(&cfg.mrr_tiers, mrr).unwrap_or(cfg.mrr_floor);
    (arm_pts + member_pts + mrr_pts).min(cfg.cap)
}

/// Annualized LTV gain from lowering monthly churn by one percentage point.
/// `churn_rate` is a percentage.
pub fn ltv_improvement_impact(arm: f64, churn_rate: f64, ceiling_multiple: f64) -> f64 {
    if churn_rate <= 1.0 || arm <= 0.0 {
        return 0.0;
    }
    let c = churn_rate / 100.0;
    let current = arm / c;
    let improved_churn = c - 0.01;
    let improved = if improved_churn <= 0.0 {
        arm * ceiling_multiple
    } else {
        arm / improved_churn
    };
    (improved - current) * 12.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsi(inputs: RsiInputs) -> i64 {
        compute_rsi(&inputs, &RsiConfig::default())
    }

    #[test]
    fn churn_penalty_boundary_is_inclusive() {
        let at = rsi(RsiInputs { churn_rate: 5.0, ..Default::default() });
        let above = rsi(RsiInputs { churn_rate: 5.01, ..Default::default() });
        assert_eq!(at, 85);
        assert_eq!(above, 85);
        assert_eq!(rsi(RsiInputs { churn_rate: 2.99, ..Default::default() }), 100);
        assert_eq!(rsi(RsiInputs { churn_rate: 12.0, ..Default::default() }), 60);
    }

    #[test]
    fn early_churn_and_growth_use_active_start() {
        // Cancel ratio 6% (-8), 10% growth (+5), churn 6% (-15).
        let score = rsi(RsiInputs {
            churn_rate: 6.0,
            active_start: 100,
            new_members: 10,
            cancels: 6,
            avg_tenure_months: None,
        });
        assert_eq!(score, 82);
    }

    #[test]
    fn tenure_bands() {
        let with = |m: f64| rsi(RsiInputs { avg_tenure_months: Some(m), ..Default::default() });
        assert_eq!(with(14.0), 100);
        assert_eq!(with(7.0), 100);
        assert_eq!(with(4.0), 100);
        assert_eq!(with(1.0), 90);
    }

    #[test]
    fn penalties_stack() {
        let score = rsi(RsiInputs {
            churn_rate: 40.0,
            active_start: 10,
            cancels: 4,
            avg_tenure_months: Some(0.5),
            ..Default::default()
        });
        assert_eq!(score, 35);
    }

    #[test]
    fn res_tiers_sum_and_floor() {
        let cfg = ResConfig::default();
        assert_eq!(compute_res(175.0, 2, 350.0, &cfg), 50.0);
        assert_eq!(compute_res(160.0, 250, 40_000.0, &cfg), 100.0);
        assert_eq!(compute_res(0.0, 0, 0.0, &cfg), 20.0);
    }

    #[test]
    fn ltv_impact_zero_at_low_churn() {
        assert_eq!(ltv_improvement_impact(100.0, 1.0, 100.0), 0.0);
        assert_eq!(ltv_improvement_impact(0.0, 8.0, 100.0), 0.0);
        // churn 5%: 100/0.04 - 100/0.05 = 500, annualized 6000.
        let v = ltv_improvement_impact(100.0, 5.0, 100.0);
        assert!((v - 6000.0).abs() < 1e-6);
    }
}
