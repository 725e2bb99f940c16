//! Six-month revenue scenarios from recent monthly metrics.
//!
//! Three deterministic paths (expected, upside, downside) compound
//! `members = members × (1 − churn) + new` each month at constant ARM.
//! Monte-Carlo bands sample churn and new members from normal
//! distributions around the same means and report p10/p50/p90 MRR.

use crate::{
    config::ScenarioConfig,
    metrics::MonthlyMetrics,
    rng::{SampleRng, SampleStream},
    types::{nearest_rank, round2},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioPoint {
    /// Months ahead, starting at 1.
    pub month: usize,
    pub members: f64,
    pub mrr: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioPath {
    /// Monthly churn percent used for the path.
    pub churn_rate: f64,
    pub new_members: f64,
    pub points: Vec<ScenarioPoint>,
}

impl ScenarioPath {
    pub fn final_mrr(&self) -> f64 {
        self.points.last().map(|p| p.mrr).unwrap_or(0.0)
    }

    pub fn final_members(&self) -> f64 {
        self.points.last().map(|p| p.members).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BreakEvenRisk {
    Low,
    Moderate,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonteCarloBand {
    pub month: usize,
    pub p10_mrr: f64,
    pub p50_mrr: f64,
    pub p90_mrr: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioProjection {
    pub current_members: i64,
    pub current_mrr: f64,
    pub arm: f64,
    pub churn_mean: f64,
    pub churn_sigma: f64,
    pub new_mean: f64,
    pub new_sigma: f64,
    pub expected: ScenarioPath,
    pub upside: ScenarioPath,
    pub downside: ScenarioPath,
    pub break_even_risk: BreakEvenRisk,
    /// Expected-path MRR at the horizon minus current MRR.
    pub expected_mrr_delta: f64,
    pub bands: Vec<MonteCarloBand>,
}

/// Mean and population standard deviation.
fn mean_sigma(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn project_path(members: f64, arm: f64, churn_pct: f64, new: f64, horizon: usize) -> ScenarioPath {
    let churn_pct = churn_pct.max(0.0);
    let new = new.max(0.0);
    let mut current = members;
    let points = (1..=horizon)
        .map(|month| {
            current = (current * (1.0 - churn_pct / 100.0) + new).max(0.0);
            ScenarioPoint {
                month,
                members: round2(current),
                mrr: round2(current * arm),
            }
        })
        .collect();
    ScenarioPath {
        churn_rate: round2(churn_pct),
        new_members: round2(new),
        points,
    }
}

/// `history` is oldest first; only the last `history_months` rows are used.
/// Returns `None` without any history.
pub fn project_scenarios(
    history: &[MonthlyMetrics],
    cfg: &ScenarioConfig,
) -> Option<ScenarioProjection> {
    let window = &history[history.len().saturating_sub(cfg.history_months)..];
    let latest = window.last()?;

    let churns: Vec<f64> = window.iter().map(|m| m.churn_rate).collect();
    let news: Vec<f64> = window.iter().map(|m| m.new_members as f64).collect();
    let (churn_mean, churn_sigma) = mean_sigma(&churns);
    let (new_mean, new_sigma) = mean_sigma(&news);

    let members = latest.active_members as f64;
    let arm = latest.arm;
    let horizon = cfg.horizon_months;

    let expected = project_path(members, arm, churn_mean, new_mean, horizon);
    let upside = project_path(
        members,
        arm,
        churn_mean - cfg.upside_sigma * churn_sigma,
        new_mean + cfg.upside_sigma * new_sigma,
        horizon,
    );
    let downside = project_path(
        members,
        arm,
        churn_mean + cfg.downside_churn_sigma * churn_sigma,
        new_mean - cfg.downside_new_sigma * new_sigma,
        horizon,
    );

    let break_even_risk = if latest.mrr <= 0.0 {
        BreakEvenRisk::Low
    } else {
        let ratio = downside.final_mrr() / latest.mrr;
        if ratio < cfg.critical_ratio {
            BreakEvenRisk::Critical
        } else if ratio < cfg.high_ratio {
            BreakEvenRisk::High
        } else if ratio < cfg.moderate_ratio {
            BreakEvenRisk::Moderate
        } else {
            BreakEvenRisk::Low
        }
    };

    let bands = monte_carlo_bands(
        members,
        arm,
        (churn_mean, churn_sigma),
        (new_mean, new_sigma),
        cfg,
    );

    Some(ScenarioProjection {
        current_members: latest.active_members,
        current_mrr: latest.mrr,
        arm,
        churn_mean: round2(churn_mean),
        churn_sigma: round2(churn_sigma),
        new_mean: round2(new_mean),
        new_sigma: round2(new_sigma),
        expected_mrr_delta: round2(expected.final_mrr() - latest.mrr),
        expected,
        upside,
        downside,
        break_even_risk,
        bands,
    })
}

fn monte_carlo_bands(
    members: f64,
    arm: f64,
    churn: (f64, f64),
    new: (f64, f64),
    cfg: &ScenarioConfig,
) -> Vec<MonteCarloBand> {
    if cfg.monte_carlo_runs == 0 {
        return Vec::new();
    }
    let mut churn_rng = SampleRng::new(cfg.monte_carlo_seed, SampleStream::Churn);
    let mut new_rng = SampleRng::new(cfg.monte_carlo_seed, SampleStream::NewMembers);
    let mut by_month: Vec<Vec<f64>> =
        vec![Vec::with_capacity(cfg.monte_carlo_runs); cfg.horizon_months];

    for _ in 0..cfg.monte_carlo_runs {
        let mut current = members;
        for samples in by_month.iter_mut() {
            let churn_pct = churn_rng.normal(churn.0, churn.1).max(0.0);
            let joins = new_rng.normal(new.0, new.1).max(0.0);
            current = (current * (1.0 - churn_pct / 100.0) + joins).max(0.0);
            samples.push(current * arm);
        }
    }

    by_month
        .into_iter()
        .enumerate()
        .map(|(i, mut samples)| {
            samples.sort_by(|a, b| a.total_cmp(b));
            MonteCarloBand {
                month: i + 1,
                p10_mrr: round2(nearest_rank(&samples, 0.10).unwrap_or(0.0)),
                p50_mrr: round2(nearest_rank(&samples, 0.50).unwrap_or(0.0)),
                p90_mrr: round2(nearest_rank(&samples, 0.90).unwrap_or(0.0)),
            }
        })
        .collect()
}
