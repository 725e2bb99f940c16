//! Two desks, same roster, same dates.
//! Every derived number must match: metrics, predictions, scenario bands
//! and brief ranking. Only generated ids may differ.

use chrono::{NaiveDate, TimeZone, Utc};
use gymdesk_core::{engine::GymDesk, field_mapper::MappingOverride};

const ROSTER: &str = "\
Name,Email,Status,Join Date,Cancel Date,Monthly Rate
Fresh Start,fresh@example.com,active,2026-10-01,,140
Second Month,second@example.com,active,2026-08-25,,140
Quarter Way,quarter@example.com,active,2026-07-01,,120
Half Year,half@example.com,active,2026-04-10,,150
Long Timer,long@example.com,active,2024-01-15,,220
Early Quit,quit@example.com,cancelled,2026-06-01,2026-07-10,130
Late Quit,late@example.com,cancelled,2025-01-10,2026-09-05,160
";

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn build_desk() -> GymDesk {
    let desk = GymDesk::build_test().expect("in-memory desk");
    let mapping = desk
        .preview_import("gym-1", ROSTER, &MappingOverride::new())
        .expect("preview")
        .detected
        .mapping;
    desk.commit_import("gym-1", ROSTER, &mapping, as_of()).expect("commit");
    desk
}

#[test]
fn same_roster_produces_identical_analytics() {
    let mut desk_a = build_desk();
    let mut desk_b = build_desk();
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

    assert_eq!(
        desk_a.metrics_history("gym-1").unwrap(),
        desk_b.metrics_history("gym-1").unwrap(),
        "monthly metrics diverged"
    );

    let view_a = desk_a.predictive_intelligence("gym-1", as_of(), now).unwrap();
    let view_b = desk_b.predictive_intelligence("gym-1", as_of(), now).unwrap();

    assert_eq!(view_a.scenario, view_b.scenario, "scenario bands diverged");

    let probabilities = |view: &gymdesk_core::predictive::PredictiveIntelligence| {
        let mut v: Vec<(Option<String>, f64)> = view
            .predictions
            .iter()
            .map(|p| (p.email.clone(), p.churn_probability))
            .collect();
        v.sort_by(|a, b| a.0.cmp(&b.0));
        v
    };
    assert_eq!(probabilities(&view_a), probabilities(&view_b));

    let ranking = |view: &gymdesk_core::predictive::PredictiveIntelligence| {
        view.brief
            .recommendations
            .iter()
            .map(|r| (r.template_id.clone(), r.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(ranking(&view_a), ranking(&view_b), "brief ranking diverged");
}

#[test]
fn repeated_views_are_stable() {
    let mut desk = build_desk();
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
    let first = desk.predictive_intelligence("gym-1", as_of(), now).unwrap();
    let second = desk.predictive_intelligence("gym-1", as_of(), now).unwrap();
    assert_eq!(first.scenario, second.scenario);
    assert_eq!(first.summary.total_revenue_at_risk, second.summary.total_revenue_at_risk);
}
