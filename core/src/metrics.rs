//! Monthly metrics engine.
//!
//! One row per (gym, month). The month window is [first day, last day],
//! inclusive on both ends. "Active at start" is measured on the day before
//! the window opens, so a member cancelling on the 1st counts against the
//! month they cancelled in.
//!
//! Recomputation always upserts; running it twice leaves the same row.

use crate::{
    config::ScoringConfig,
    error::DeskResult,
    event::DeskEvent,
    scores::{compute_res, compute_rsi, ltv_improvement_impact, RsiInputs},
    store::DeskStore,
    types::{month_end, month_start, next_month, prev_month, round2, GymId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyMetrics {
    pub gym_id: GymId,
    pub month_start: NaiveDate,
    pub active_members: i64,
    pub active_start_of_month: i64,
    pub new_members: i64,
    pub cancels: i64,
    /// Percent, two decimals.
    pub churn_rate: f64,
    pub rolling_churn_3m: Option<f64>,
    pub mrr: f64,
    pub arm: f64,
    pub ltv: f64,
    pub rsi: i64,
    pub res: f64,
    pub ltv_impact: f64,
    pub risk_members: i64,
}

/// Compute and store the metrics row for the month containing `month`.
pub fn compute_monthly_metrics(
    store: &DeskStore,
    config: &ScoringConfig,
    gym_id: &str,
    month: NaiveDate,
) -> DeskResult<MonthlyMetrics> {
    let start = month_start(month);
    let end = month_end(start);
    let day_before = start.pred_opt().unwrap_or(start);

    let active = store.active_members_as_of(gym_id, end)?;
    let active_members = active.len() as i64;
    let active_start = store.count_active_as_of(gym_id, day_before)?;
    let new_members = store.count_joins_between(gym_id, start, end)?;
    let cancelled = store.cancelled_between(gym_id, start, end)?;
    let cancels = cancelled.len() as i64;

    let churn_rate = if active_start > 0 {
        round2(cancels as f64 / active_start as f64 * 100.0)
    } else {
        0.0
    };

    let mrr = round2(active.iter().map(|m| m.monthly_rate).sum::<f64>());
    let arm = if active_members > 0 {
        round2(mrr / active_members as f64)
    } else {
        0.0
    };

    let churn_decimal = if churn_rate > 0.0 {
        churn_rate / 100.0
    } else {
        config.metrics.default_churn_decimal
    };
    let ltv = round2(arm / churn_decimal);

    let rolling_churn_3m = {
        let m1 = prev_month(start);
        let m2 = prev_month(m1);
        match (
            store.monthly_metrics(gym_id, m1)?,
            store.monthly_metrics(gym_id, m2)?,
        ) {
            (Some(a), Some(b)) => Some(round2((churn_rate + a.churn_rate + b.churn_rate) / 3.0)),
            _ => None,
        }
    };

    let tenures: Vec<i64> = active.iter().map(|m| m.tenure_days(end)).collect();
    let avg_tenure_months = if tenures.is_empty() {
        None
    } else {
        Some(tenures.iter().sum::<i64>() as f64 / tenures.len() as f64 / 30.0)
    };
    let risk_members = tenures
        .iter()
        .filter(|d| **d <= config.metrics.risk_window_days)
        .count() as i64;

    let rsi = compute_rsi(
        &RsiInputs {
            churn_rate,
            active_start,
            new_members,
            cancels,
            avg_tenure_months,
        },
        &config.rsi,
    );
    let res = compute_res(arm, active_members, mrr, &config.res);
    let ltv_impact = round2(ltv_improvement_impact(
        arm,
        churn_rate,
        config.metrics.ltv_ceiling_multiple,
    ));

    let metrics = MonthlyMetrics {
        gym_id: gym_id.to_string(),
        month_start: start,
        active_members,
        active_start_of_month: active_start,
        new_members,
        cancels,
        churn_rate,
        rolling_churn_3m,
        mrr,
        arm,
        ltv,
        rsi,
        res,
        ltv_impact,
        risk_members,
    };
    store.upsert_monthly_metrics(&metrics)?;
    log::debug!(
        "metrics {gym_id} {start}: active={active_members} churn={churn_rate} mrr={mrr} rsi={rsi}"
    );
    Ok(metrics)
}

/// Rebuild every month from the gym's earliest join or cancel date through
/// the month containing `today`. Returns the number of months written.
pub fn recompute_all_metrics(
    store: &DeskStore,
    config: &ScoringConfig,
    gym_id: &str,
    today: NaiveDate,
) -> DeskResult<usize> {
    let Some(earliest) = store.earliest_activity_date(gym_id)? else {
        log::info!("no roster for {gym_id}; nothing to recompute");
        return Ok(0);
    };

    let first = month_start(earliest);
    let last = month_start(today);
    let mut month = first;
    let mut months = 0;
    // Oldest first, so each month's rolling churn sees the two before it.
    while month <= last {
        compute_monthly_metrics(store, config, gym_id, month)?;
        months += 1;
        month = next_month(month);
    }

    store.append_event(&DeskEvent::MetricsRecomputed {
        gym_id: gym_id.to_string(),
        first_month: first,
        last_month: last,
        months,
    })?;
    log::info!("recomputed {months} months of metrics for {gym_id} ({first} .. {last})");
    Ok(months)
}
