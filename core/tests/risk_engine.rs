use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use gymdesk_core::{
    engine::GymDesk,
    error::DeskError,
    field_mapper::MappingOverride,
    risk_engine::MemberPrediction,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
}

const ROSTER: &str = "\
Name,Email,Status,Join Date,Cancel Date,Monthly Rate
Fresh Start,fresh@example.com,active,2026-10-01,,140
Second Month,second@example.com,active,2026-08-25,,140
Quarter Way,quarter@example.com,active,2026-07-01,,120
Half Year,half@example.com,active,2026-04-10,,150
Long Timer,long@example.com,active,2024-01-15,,220
Old Guard,guard@example.com,active,2023-06-01,,180
Budget Plan,budget@example.com,active,2025-12-01,,45
Early Quit,quit@example.com,cancelled,2026-06-01,2026-07-10,130
Late Quit,late@example.com,cancelled,2025-01-10,2026-09-05,160
";

fn seeded_desk() -> GymDesk {
    let desk = GymDesk::build_test().unwrap();
    let mapping = desk
        .preview_import("gym-1", ROSTER, &MappingOverride::new())
        .unwrap()
        .detected
        .mapping;
    desk.commit_import("gym-1", ROSTER, &mapping, as_of()).unwrap();
    desk
}

fn by_email<'a>(predictions: &'a [MemberPrediction], email: &str) -> &'a MemberPrediction {
    predictions
        .iter()
        .find(|p| p.email.as_deref() == Some(email))
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Only members active on the as-of date are scored, and every probability
/// stays inside the configured clamp.
#[test]
fn predictions_cover_active_members_within_bounds() {
    let desk = seeded_desk();
    let predictions = desk.predict_members("gym-1", as_of()).unwrap();

    assert_eq!(predictions.len(), 7);
    for p in &predictions {
        assert!(
            (0.01..=0.95).contains(&p.churn_probability),
            "{} has probability {}",
            p.name,
            p.churn_probability
        );
        assert!(p.revenue_at_risk >= 0.0);
        assert!(p.candidates.len() <= 3);
        assert!(!p.primary_driver.is_empty());
        for pair in p.factors.windows(2) {
            assert!(pair[0].impact >= pair[1].impact, "factors out of order for {}", p.name);
        }
    }
}

/// A brand-new, never-contacted member is riskier than a multi-year one.
#[test]
fn new_members_outrank_veterans() {
    let desk = seeded_desk();
    let predictions = desk.predict_members("gym-1", as_of()).unwrap();

    let fresh = by_email(&predictions, "fresh@example.com");
    let veteran = by_email(&predictions, "long@example.com");
    assert!(fresh.churn_probability > veteran.churn_probability);
    assert_eq!(fresh.tenure_days, 18);
    assert_eq!(fresh.days_since_contact, None);
}

/// Logging a contact today lowers that member's probability.
#[test]
fn recent_contact_lowers_probability() {
    let desk = seeded_desk();
    let before = desk.predict_members("gym-1", as_of()).unwrap();
    let fresh = by_email(&before, "fresh@example.com");

    desk.record_contact("gym-1", &fresh.member_id, now(), Some("Booked a goal session"))
        .unwrap();

    let after = desk.predict_members("gym-1", as_of()).unwrap();
    let fresh_after = by_email(&after, "fresh@example.com");
    assert_eq!(fresh_after.days_since_contact, Some(0));
    assert!(fresh_after.churn_probability < fresh.churn_probability);

    let events = desk.events("gym-1").unwrap();
    assert!(events.iter().any(|e| e.event_type == "contact_logged"));
}

/// Contacts are scoped to the member's own gym.
#[test]
fn contact_for_unknown_member_is_rejected() {
    let desk = seeded_desk();
    let err = desk.record_contact("gym-1", "no-such-member", now(), None).unwrap_err();
    assert!(matches!(err, DeskError::NotFound { what: "member", .. }));

    let member_id = desk.members("gym-1").unwrap()[0].member_id.clone();
    let err = desk.record_contact("gym-2", &member_id, now(), None).unwrap_err();
    assert!(matches!(err, DeskError::NotFound { .. }));
}

/// The predictive view ties predictions, cohorts, scenario and brief together.
#[test]
fn predictive_view_is_consistent() {
    let mut desk = seeded_desk();
    let view = desk.predictive_intelligence("gym-1", as_of(), now()).unwrap();

    let s = &view.summary;
    assert_eq!(s.total_members, 7);
    assert_eq!(s.core + s.drifter + s.at_risk + s.ghost, 7);
    assert!(s.top_at_risk.len() <= 10);
    for pair in view.predictions.windows(2) {
        assert!(pair[0].revenue_at_risk >= pair[1].revenue_at_risk);
    }

    assert!(!view.cohorts.cohorts.is_empty());
    assert!(view.scenario.is_some());
    assert!(!view.brief.recommendations.is_empty());
    assert_eq!(
        view.brief.focus_recommendation.as_ref().map(|r| &r.template_id),
        view.brief.recommendations.first().map(|r| &r.template_id)
    );
    assert!(!desk.circuit().open);
}
