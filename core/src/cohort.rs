//! Cohort intelligence: join-month cohorts, cancellation tenure windows,
//! the survival curve and the 30-day early-loss rate.
//!
//! Pure functions over a roster snapshot and an as-of date.

use crate::{
    member::Member,
    types::{days_between, month_label, month_start, round2},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinCohort {
    /// `YYYY-MM` of the join month.
    pub cohort: String,
    pub month_start: NaiveDate,
    pub total: usize,
    pub surviving: usize,
    pub survival_rate: f64,
    pub avg_survivor_tenure_days: f64,
    pub revenue_retained: f64,
    pub revenue_lost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenureWindow {
    pub label: String,
    pub count: usize,
    pub pct: f64,
    pub avg_rate: f64,
    pub monthly_revenue_lost: f64,
    pub insight: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurvivalPoint {
    pub day: i64,
    /// Members whose tenure could reach this mark by as-of.
    pub eligible: usize,
    pub surviving: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CohortIntelligence {
    pub cohorts: Vec<JoinCohort>,
    pub tenure_windows: Vec<TenureWindow>,
    pub survival_curve: Vec<SurvivalPoint>,
    pub early_loss_rate_30d: f64,
}

/// Cancelled-member tenure windows: (label, min days, max days inclusive, insight).
const TENURE_WINDOWS: &[(&str, i64, i64, &str)] = &[
    ("0-30", 0, 30, "First-month losses point at onboarding. Tighten the first two weeks."),
    ("31-60", 31, 60, "Second-month losses usually follow the intro offer ending. Check what happens on day 30."),
    ("61-90", 61, 90, "Members leaving before day 90 never formed a habit. Look at class-time consistency."),
    ("91-180", 91, 180, "Mid-term losses track plateaus. Goal reviews and retests help."),
    ("181-365", 181, 365, "Established members leaving often signals a coaching or schedule change."),
    ("365+", 366, i64::MAX, "Long-tenured losses are usually life events. Keep the door open."),
];

pub const SURVIVAL_MARKS: [i64; 12] = [0, 7, 14, 30, 60, 90, 120, 180, 270, 365, 545, 730];

pub fn analyze_cohorts(roster: &[Member], as_of: NaiveDate) -> CohortIntelligence {
    let known: Vec<&Member> = roster.iter().filter(|m| m.join_date <= as_of).collect();
    CohortIntelligence {
        cohorts: join_cohorts(&known, as_of),
        tenure_windows: tenure_windows(&known, as_of),
        survival_curve: survival_curve(&known, as_of),
        early_loss_rate_30d: early_loss_rate(&known, as_of),
    }
}

fn join_cohorts(roster: &[&Member], as_of: NaiveDate) -> Vec<JoinCohort> {
    let mut by_month: BTreeMap<NaiveDate, Vec<&Member>> = BTreeMap::new();
    for m in roster {
        by_month.entry(month_start(m.join_date)).or_default().push(*m);
    }

    by_month
        .into_iter()
        .map(|(month, members)| {
            let total = members.len();
            let (survivors, lost): (Vec<&Member>, Vec<&Member>) =
                members.into_iter().partition(|m| m.is_active_on(as_of));
            let avg_tenure = if survivors.is_empty() {
                0.0
            } else {
                survivors.iter().map(|m| m.tenure_days(as_of)).sum::<i64>() as f64
                    / survivors.len() as f64
            };
            JoinCohort {
                cohort: month_label(month),
                month_start: month,
                total,
                surviving: survivors.len(),
                survival_rate: round2(survivors.len() as f64 / total as f64),
                avg_survivor_tenure_days: round2(avg_tenure),
                revenue_retained: round2(survivors.iter().map(|m| m.monthly_rate).sum()),
                revenue_lost: round2(lost.iter().map(|m| m.monthly_rate).sum()),
            }
        })
        .collect()
}

fn tenure_windows(roster: &[&Member], as_of: NaiveDate) -> Vec<TenureWindow> {
    let lifetimes: Vec<(i64, f64)> = roster
        .iter()
        .filter(|m| !m.is_active_on(as_of))
        .filter_map(|m| m.lifetime_days().map(|d| (d, m.monthly_rate)))
        .collect();
    let total = lifetimes.len();

    TENURE_WINDOWS
        .iter()
        .map(|(label, lo, hi, insight)| {
            let rates: Vec<f64> = lifetimes
                .iter()
                .filter(|(d, _)| d >= lo && d <= hi)
                .map(|(_, r)| *r)
                .collect();
            let lost: f64 = rates.iter().sum();
            TenureWindow {
                label: label.to_string(),
                count: rates.len(),
                pct: if total > 0 {
                    round2(rates.len() as f64 / total as f64 * 100.0)
                } else {
                    0.0
                },
                avg_rate: if rates.is_empty() {
                    0.0
                } else {
                    round2(lost / rates.len() as f64)
                },
                monthly_revenue_lost: round2(lost),
                insight: insight.to_string(),
            }
        })
        .collect()
}

/// A member is eligible for a mark once they joined at least that many
/// days before as-of. They survive it if still active or if they cancelled
/// at or after the mark.
fn survival_curve(roster: &[&Member], as_of: NaiveDate) -> Vec<SurvivalPoint> {
    SURVIVAL_MARKS
        .iter()
        .map(|&day| {
            let eligible: Vec<&&Member> = roster
                .iter()
                .filter(|m| days_between(m.join_date, as_of) >= day)
                .collect();
            let surviving = eligible
                .iter()
                .filter(|m| {
                    m.is_active_on(as_of) || m.lifetime_days().is_some_and(|life| life >= day)
                })
                .count();
            SurvivalPoint {
                day,
                eligible: eligible.len(),
                surviving,
                rate: if eligible.is_empty() {
                    0.0
                } else {
                    round2(surviving as f64 / eligible.len() as f64)
                },
            }
        })
        .collect()
}

/// Members who cancelled within 30 days ÷ members who joined ≥ 30 days ago.
fn early_loss_rate(roster: &[&Member], as_of: NaiveDate) -> f64 {
    let matured: Vec<&&Member> = roster
        .iter()
        .filter(|m| days_between(m.join_date, as_of) >= 30)
        .collect();
    if matured.is_empty() {
        return 0.0;
    }
    let lost = matured
        .iter()
        .filter(|m| m.lifetime_days().is_some_and(|d| d <= 30) && !m.is_active_on(as_of))
        .count();
    round2(lost as f64 / matured.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberStatus;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn member(id: &str, join: NaiveDate, cancel: Option<NaiveDate>, rate: f64) -> Member {
        Member {
            member_id: id.into(),
            gym_id: "gym".into(),
            name: id.into(),
            email: None,
            status: if cancel.is_some() { MemberStatus::Cancelled } else { MemberStatus::Active },
            join_date: join,
            cancel_date: cancel,
            monthly_rate: rate,
        }
    }

    fn roster() -> Vec<Member> {
        vec![
            member("a", d(2026, 1, 5), None, 100.0),
            member("b", d(2026, 1, 20), Some(d(2026, 2, 10)), 80.0),
            member("c", d(2026, 1, 25), Some(d(2026, 6, 1)), 120.0),
            member("d", d(2026, 3, 1), None, 150.0),
        ]
    }

    #[test]
    fn cohorts_group_by_join_month() {
        let intel = analyze_cohorts(&roster(), d(2026, 10, 1));
        assert_eq!(intel.cohorts.len(), 2);
        let jan = &intel.cohorts[0];
        assert_eq!(jan.cohort, "2026-01");
        assert_eq!(jan.total, 3);
        assert_eq!(jan.surviving, 1);
        assert_eq!(jan.survival_rate, 0.33);
        assert_eq!(jan.revenue_retained, 100.0);
        assert_eq!(jan.revenue_lost, 200.0);
    }

    #[test]
    fn cancelled_members_fall_into_tenure_windows() {
        let intel = analyze_cohorts(&roster(), d(2026, 10, 1));
        let first = &intel.tenure_windows[0];
        assert_eq!(first.label, "0-30");
        assert_eq!(first.count, 1);
        assert_eq!(first.pct, 50.0);
        let mid = &intel.tenure_windows[3];
        assert_eq!(mid.label, "91-180");
        assert_eq!(mid.count, 1);
        assert_eq!(mid.monthly_revenue_lost, 120.0);
    }

    #[test]
    fn survival_curve_starts_at_full_and_declines() {
        let intel = analyze_cohorts(&roster(), d(2026, 10, 1));
        assert_eq!(intel.survival_curve[0].day, 0);
        assert_eq!(intel.survival_curve[0].rate, 1.0);
        let day30 = intel.survival_curve.iter().find(|p| p.day == 30).unwrap();
        assert_eq!(day30.eligible, 4);
        assert_eq!(day30.surviving, 3);
        assert_eq!(intel.early_loss_rate_30d, 0.25);
    }
}
