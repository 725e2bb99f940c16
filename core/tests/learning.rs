use chrono::{NaiveDate, TimeZone, Utc};
use gymdesk_core::{
    brief::{BriefRecommendation, Pillar, PriorityLabel},
    engine::GymDesk,
    error::DeskError,
    field_mapper::MappingOverride,
    interventions::InterventionType,
    learning::{gym_scope, learned_weights, RecommendationCard, GLOBAL_SCOPE},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn as_of() -> NaiveDate {
    date(2026, 10, 19)
}

/// July and August hold steady at two members; September loses one.
fn seeded_desk() -> GymDesk {
    let desk = GymDesk::build_test().unwrap();
    let text = "\
Name,Email,Status,Join Date,Cancel Date,Monthly Rate
New Member,new@example.com,active,2026-10-09,,150
Gone Member,gone@example.com,cancelled,2026-04-02,2026-09-19,100
Veteran Member,vet@example.com,active,2025-09-14,,200
";
    let mapping = desk
        .preview_import("gym-1", text, &MappingOverride::new())
        .unwrap()
        .detected
        .mapping;
    desk.commit_import("gym-1", text, &mapping, as_of()).unwrap();
    desk
}

fn recommendation(kind: InterventionType) -> BriefRecommendation {
    BriefRecommendation {
        template_id: "at-risk-outreach".into(),
        pillar: Pillar::Retention,
        intervention_type: kind,
        title: "Personally contact every at-risk member this week".into(),
        rationale: "test".into(),
        checklist: vec!["Pull the list".into(), "Call".into(), "Log notes".into()],
        impact: 1000.0,
        confidence: 0.72,
        urgency: 1.0,
        learned_weight: 1.0,
        score: 720.0,
        priority: PriorityLabel::Critical,
        supporting: vec![],
    }
}

fn snapshot_done(desk: &GymDesk, kind: InterventionType, on: NaiveDate) -> RecommendationCard {
    let card = desk.snapshot_recommendation("gym-1", &recommendation(kind), on).unwrap();
    let done = Utc.with_ymd_and_hms(2026, 7, 3, 12, 0, 0).unwrap();
    for i in 0..3 {
        desk.set_checklist_item(&card.card_id, i, Some(done)).unwrap();
    }
    card
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// The card's baseline comes from the stored month it was created in.
#[test]
fn snapshot_captures_baseline() {
    let desk = seeded_desk();
    let rec = recommendation(InterventionType::PersonalOutreach);
    let card = desk.snapshot_recommendation("gym-1", &rec, date(2026, 7, 1)).unwrap();

    assert_eq!(card.baseline_members, 2);
    assert_eq!(card.baseline_mrr, 300.0);
    assert_eq!(card.baseline_churn, 0.0);
    assert_eq!(desk.store().checklist_for_card(&card.card_id).unwrap().len(), 3);
    assert_eq!(desk.execution_strength(&card.card_id).unwrap(), 0.0);
    assert!(desk
        .events("gym-1")
        .unwrap()
        .iter()
        .any(|e| e.event_type == "recommendation_snapshotted"));
}

/// Unknown checklist items and cards are reported, not ignored.
#[test]
fn missing_checklist_item_is_not_found() {
    let desk = seeded_desk();
    let rec = recommendation(InterventionType::WinBack);
    let card = desk.snapshot_recommendation("gym-1", &rec, date(2026, 7, 1)).unwrap();
    let err = desk.set_checklist_item(&card.card_id, 7, Some(Utc::now())).unwrap_err();
    assert!(matches!(err, DeskError::NotFound { what: "checklist item", .. }));
    assert!(matches!(
        desk.execution_strength("nope").unwrap_err(),
        DeskError::NotFound { .. }
    ));
}

/// Cards below the execution threshold teach nothing.
#[test]
fn unexecuted_cards_are_not_evaluated() {
    let desk = seeded_desk();
    let rec = recommendation(InterventionType::PersonalOutreach);
    let card = desk.snapshot_recommendation("gym-1", &rec, date(2026, 7, 1)).unwrap();
    desk.set_checklist_item(&card.card_id, 0, Some(Utc::now())).unwrap();

    assert_eq!(desk.run_learning_update(as_of()).unwrap(), 0);
    assert!(desk.store().learning_stats().unwrap().is_empty());
}

/// An executed card is evaluated once per window; re-running adds nothing.
#[test]
fn learning_update_is_idempotent() {
    let desk = seeded_desk();
    snapshot_done(&desk, InterventionType::PersonalOutreach, date(2026, 7, 1));

    assert_eq!(desk.run_learning_update(as_of()).unwrap(), 3);
    let stats_after_first = desk.store().learning_stats().unwrap();
    assert_eq!(desk.run_learning_update(as_of()).unwrap(), 0);
    assert_eq!(desk.store().learning_stats().unwrap(), stats_after_first);

    let events = desk.store().learning_events_for_gym("gym-1").unwrap();
    assert_eq!(events.len(), 3);
    let windows: Vec<i64> = events.iter().map(|e| e.window_days).collect();
    assert!(windows.contains(&30) && windows.contains(&60) && windows.contains(&90));
}

/// The 90-day window lands in September: one member and $100 lost, churn up
/// fifty points. Impact = -100×0.65 - 35 - 50×120.
#[test]
fn outcome_impact_and_stats() {
    let desk = seeded_desk();
    snapshot_done(&desk, InterventionType::PersonalOutreach, date(2026, 7, 1));
    desk.run_learning_update(as_of()).unwrap();

    let events = desk.store().learning_events_for_gym("gym-1").unwrap();
    let w90 = events.iter().find(|e| e.window_days == 90).unwrap();
    assert_eq!(w90.delta_members, -1);
    assert!((w90.delta_mrr + 100.0).abs() < 1e-9);
    assert!((w90.impact_score + 6100.0).abs() < 1e-6);
    let w30 = events.iter().find(|e| e.window_days == 30).unwrap();
    assert_eq!(w30.impact_score, 0.0);

    let gym = desk
        .store()
        .learning_stat(InterventionType::PersonalOutreach, &gym_scope("gym-1"))
        .unwrap()
        .unwrap();
    assert_eq!(gym.samples, 3);
    // Quality 0.2 (two members), gym rate 0.06 × 0.2.
    assert!((gym.expected_impact + 73.2).abs() < 1e-6);

    let global = desk
        .store()
        .learning_stat(InterventionType::PersonalOutreach, GLOBAL_SCOPE)
        .unwrap()
        .unwrap();
    assert_eq!(global.samples, 3);
    assert!((global.expected_impact + 36.6).abs() < 1e-6);

    let weights = learned_weights(desk.store(), &desk.config().learning, "gym-1").unwrap();
    let w = weights[&InterventionType::PersonalOutreach];
    assert!(w < 1.0 && w >= 0.75, "weight {w}");
    assert_eq!(weights[&InterventionType::WinBack], 1.0);
}

/// Windows not yet due are left for a later run.
#[test]
fn future_windows_wait() {
    let desk = seeded_desk();
    snapshot_done(&desk, InterventionType::CoachConnection, date(2026, 9, 1));

    // Only the 30-day window (Oct 1) has passed by Oct 19.
    assert_eq!(desk.run_learning_update(as_of()).unwrap(), 1);
}

/// Two executed cards within 90 days share credit.
#[test]
fn overlapping_cards_are_down_weighted() {
    let desk = seeded_desk();
    snapshot_done(&desk, InterventionType::PersonalOutreach, date(2026, 7, 1));
    snapshot_done(&desk, InterventionType::GoalSetting, date(2026, 7, 15));
    desk.run_learning_update(as_of()).unwrap();

    let events = desk.store().learning_events_for_gym("gym-1").unwrap();
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.overlap_factor == 0.7));
}
