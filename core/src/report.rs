//! Monthly owner report.
//!
//! Six metric reports explain the month in plain language. Each carries
//! its current value, a target, the dollar impact of the gap, and a
//! 90-day trend against the earliest of up to three prior stored months.

use crate::{
    config::ScoringConfig,
    error::DeskResult,
    member::Member,
    metrics::{compute_monthly_metrics, MonthlyMetrics},
    scenario::{project_scenarios, ScenarioProjection},
    store::DeskStore,
    types::{month_end, month_start, round2, GymId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
    /// No prior month to compare against.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricReport {
    pub key: String,
    pub label: String,
    pub value: f64,
    pub target: f64,
    pub dollar_impact: f64,
    pub meaning: String,
    pub rationale: String,
    pub action: String,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskWindowMember {
    pub member_id: String,
    pub name: String,
    pub email: Option<String>,
    pub tenure_days: i64,
    pub monthly_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyReport {
    pub gym_id: GymId,
    pub month_start: NaiveDate,
    pub metrics: MonthlyMetrics,
    pub reports: Vec<MetricReport>,
    pub risk_window_members: Vec<RiskWindowMember>,
    pub scenario: Option<ScenarioProjection>,
}

const FLAT_EPSILON: f64 = 0.005;

fn trend(current: f64, baseline: Option<f64>) -> TrendDirection {
    match baseline {
        None => TrendDirection::None,
        Some(b) if (current - b).abs() < FLAT_EPSILON => TrendDirection::Flat,
        Some(b) if current > b => TrendDirection::Up,
        Some(_) => TrendDirection::Down,
    }
}

struct ReportDef {
    key: &'static str,
    label: &'static str,
    target: f64,
    meaning: &'static str,
    rationale: &'static str,
    value: fn(&MonthlyMetrics) -> f64,
    dollar_impact: fn(&MonthlyMetrics, f64) -> f64,
    action: fn(&MonthlyMetrics, f64) -> &'static str,
}

const REPORTS: &[ReportDef] = &[
    ReportDef {
        key: "churn_rate",
        label: "Monthly churn",
        target: 5.0,
        meaning: "Share of members active at the start of the month who cancelled during it.",
        rationale: "Every point of monthly churn shortens the average membership and has to be replaced by new sales.",
        value: |m| m.churn_rate,
        dollar_impact: |m, target| {
            ((m.churn_rate - target).max(0.0) / 100.0)
                * m.active_start_of_month as f64
                * m.arm
                * 12.0
        },
        action: |m, target| {
            if m.churn_rate > target {
                "Call every member who joined in the last 60 days this week."
            } else {
                "Keep the current onboarding and check-in routine."
            }
        },
    },
    ReportDef {
        key: "rsi",
        label: "Retention Stability Index",
        target: 80.0,
        meaning: "0-100 score combining churn, early cancellations, tenure and growth.",
        rationale: "A falling index shows retention weakening before revenue does.",
        value: |m| m.rsi as f64,
        dollar_impact: |m, _| m.ltv_impact,
        action: |m, target| {
            if (m.rsi as f64) < target {
                "Focus on the first 90 days: most lost points come from early cancellations."
            } else {
                "Retention is stable. Shift attention to growth."
            }
        },
    },
    ReportDef {
        key: "res",
        label: "Revenue Efficiency Score",
        target: 60.0,
        meaning: "0-100 score from revenue per member, roster size and total MRR.",
        rationale: "Low efficiency means the gym works hard for each dollar it bills.",
        value: |m| m.res,
        dollar_impact: |m, _| m.active_members as f64 * 10.0 * 12.0,
        action: |m, target| {
            if m.res < target {
                "Review pricing tiers and add a premium coaching option."
            } else {
                "Pricing is healthy. Protect it when running promotions."
            }
        },
    },
    ReportDef {
        key: "arm",
        label: "Average revenue per member",
        target: 150.0,
        meaning: "MRR divided by active members.",
        rationale: "Small increases in average rate compound across the whole roster.",
        value: |m| m.arm,
        dollar_impact: |m, target| (target - m.arm).max(0.0) * m.active_members as f64 * 12.0,
        action: |m, target| {
            if m.arm < target {
                "Offer personal-training add-ons to members in goal reviews."
            } else {
                "Revenue per member is on target."
            }
        },
    },
    ReportDef {
        key: "ltv",
        label: "Member lifetime value",
        target: 3000.0,
        meaning: "Average revenue per member divided by monthly churn.",
        rationale: "Lifetime value caps what the gym can spend to win a member.",
        value: |m| m.ltv,
        dollar_impact: |m, _| m.ltv_impact,
        action: |m, target| {
            if m.ltv < target {
                "Lowering churn by one point is the fastest way to raise lifetime value."
            } else {
                "Lifetime value supports paid acquisition if the roster needs it."
            }
        },
    },
    ReportDef {
        key: "new_members",
        label: "New members",
        target: 5.0,
        meaning: "Members who joined during the month.",
        rationale: "New joins must at least replace cancellations for the roster to hold.",
        value: |m| m.new_members as f64,
        dollar_impact: |m, _| (m.cancels - m.new_members).max(0) as f64 * m.arm * 12.0,
        action: |m, _| {
            if m.new_members < m.cancels {
                "Run a bring-a-friend week to close the gap with cancellations."
            } else {
                "Joins are covering cancellations."
            }
        },
    },
];

fn build_reports(current: &MonthlyMetrics, baseline: Option<&MonthlyMetrics>) -> Vec<MetricReport> {
    REPORTS
        .iter()
        .map(|row| {
            let value = (row.value)(current);
            MetricReport {
                key: row.key.to_string(),
                label: row.label.to_string(),
                value: round2(value),
                target: row.target,
                dollar_impact: round2((row.dollar_impact)(current, row.target)),
                meaning: row.meaning.to_string(),
                rationale: row.rationale.to_string(),
                action: (row.action)(current, row.target).to_string(),
                trend: trend(value, baseline.map(row.value)),
            }
        })
        .collect()
}

fn risk_window(members: Vec<Member>, on: NaiveDate, window_days: i64) -> Vec<RiskWindowMember> {
    let mut at_risk: Vec<RiskWindowMember> = members
        .into_iter()
        .filter_map(|m| {
            let tenure = m.tenure_days(on);
            (tenure <= window_days).then(|| RiskWindowMember {
                member_id: m.member_id,
                name: m.name,
                email: m.email,
                tenure_days: tenure,
                monthly_rate: m.monthly_rate,
            })
        })
        .collect();
    at_risk.sort_by(|a, b| a.tenure_days.cmp(&b.tenure_days).then_with(|| a.name.cmp(&b.name)));
    at_risk
}

/// Build the report for the month containing `month`. The metrics row is
/// recomputed so the report never shows a stale cache.
pub fn monthly_report(
    store: &DeskStore,
    config: &ScoringConfig,
    gym_id: &str,
    month: NaiveDate,
    as_of: NaiveDate,
) -> DeskResult<MonthlyReport> {
    let start = month_start(month);
    let metrics = compute_monthly_metrics(store, config, gym_id, start)?;
    let prior = store.metrics_before(gym_id, start, 3)?;
    let reports = build_reports(&metrics, prior.first());

    let on = as_of.min(month_end(start));
    let risk_window_members = risk_window(
        store.active_members_as_of(gym_id, on)?,
        on,
        config.metrics.risk_window_days,
    );

    let mut history = prior;
    history.push(metrics.clone());
    let scenario = project_scenarios(&history, &config.scenario);

    log::info!(
        "report for {gym_id} {start}: {} metrics, {} members in risk window",
        reports.len(),
        risk_window_members.len()
    );

    Ok(MonthlyReport {
        gym_id: gym_id.to_string(),
        month_start: start,
        metrics,
        reports,
        risk_window_members,
        scenario,
    })
}
