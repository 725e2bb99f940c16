use chrono::NaiveDate;
use gymdesk_core::{
    engine::GymDesk,
    error::DeskError,
    event::DeskEvent,
    field_mapper::{CanonicalField, ColumnMapping, MappingConfidence, MappingOverride},
    member::MemberStatus,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

const ROSTER: &str = "\
Name,Email,Status,Join Date,Cancel Date,Monthly Rate
Ana Rivera,ana@example.com,Active,2026-01-05,,$150.00
Ben Okafor,BEN@example.com,Cancelled,2025-11-01,2026-03-15,120
\"Lopez, Carla\",,active,03/02/2026,,99
Bad Row,bad@example.com,active,not-a-date,,100
";

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn detected_mapping(desk: &GymDesk, text: &str) -> ColumnMapping {
    desk.preview_import("gym-1", text, &MappingOverride::new())
        .unwrap()
        .detected
        .mapping
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Preview detects every column, validates all rows and never writes.
#[test]
fn preview_detects_mapping_and_reports_errors() {
    let desk = GymDesk::build_test().unwrap();
    let preview = desk.preview_import("gym-1", ROSTER, &MappingOverride::new()).unwrap();

    assert_eq!(preview.total_rows, 4);
    assert_eq!(preview.sample_rows.len(), 4);
    assert_eq!(preview.detected.mapping.join_date, Some(3));
    assert_eq!(preview.detected.confidence[&CanonicalField::Name], MappingConfidence::High);
    assert_eq!(preview.validation.valid_rows, 3);
    assert_eq!(preview.validation.invalid_rows, 1);
    assert_eq!(preview.validation.errors[0].line, 5);
    assert_eq!(preview.validation.errors[0].field, CanonicalField::JoinDate);
    assert!(!preview.duplicate_import);
    assert!(desk.members("gym-1").unwrap().is_empty(), "preview must not write");
}

/// Overrides win over detection and report as manual.
#[test]
fn preview_overrides_are_manual() {
    let desk = GymDesk::build_test().unwrap();
    let mut overrides = MappingOverride::new();
    overrides.insert(CanonicalField::MonthlyRate, None);
    overrides.insert(CanonicalField::Status, Some(2));
    let preview = desk.preview_import("gym-1", ROSTER, &overrides).unwrap();
    assert_eq!(preview.detected.mapping.monthly_rate, None);
    assert_eq!(preview.detected.confidence[&CanonicalField::Status], MappingConfidence::Manual);
    assert_eq!(
        preview.detected.confidence[&CanonicalField::MonthlyRate],
        MappingConfidence::Unmapped
    );
}

/// Commit imports the valid rows, reports the invalid one, and records
/// the import and its event.
#[test]
fn commit_imports_valid_rows() {
    let desk = GymDesk::build_test().unwrap();
    let mapping = detected_mapping(&desk, ROSTER);
    let outcome = desk.commit_import("gym-1", ROSTER, &mapping, as_of()).unwrap();

    assert!(outcome.refresh.is_none(), "in-memory desks refresh inline");
    let summary = outcome.summary;
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.error_count, 1);

    let members = desk.members("gym-1").unwrap();
    assert_eq!(members.len(), 3);
    let ben = members.iter().find(|m| m.name == "Ben Okafor").unwrap();
    assert_eq!(ben.email.as_deref(), Some("ben@example.com"));
    assert_eq!(ben.status, MemberStatus::Cancelled);
    let carla = members.iter().find(|m| m.name == "Lopez, Carla").unwrap();
    assert_eq!(carla.email, None);
    assert_eq!(carla.join_date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());

    let imports = desk.recent_imports("gym-1", 10).unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].error_count, 1);

    let events = desk.events("gym-1").unwrap();
    assert!(events.iter().any(|e| e.event_type == "import_committed"));
    assert!(events.iter().any(|e| e.event_type == "metrics_recomputed"));
    assert!(!desk.metrics_history("gym-1").unwrap().is_empty());
}

/// Re-importing the same file updates emailed members in place, inserts
/// the no-email row again, and flags the duplicate upload.
#[test]
fn reimport_dedups_by_email_only() {
    let desk = GymDesk::build_test().unwrap();
    let mapping = detected_mapping(&desk, ROSTER);
    desk.commit_import("gym-1", ROSTER, &mapping, as_of()).unwrap();

    let preview = desk.preview_import("gym-1", ROSTER, &MappingOverride::new()).unwrap();
    assert!(preview.duplicate_import);

    let summary = desk.commit_import("gym-1", ROSTER, &mapping, as_of()).unwrap().summary;
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.imported, 1);
    assert_eq!(desk.members("gym-1").unwrap().len(), 4);

    // Another gym sees neither the members nor the hash.
    assert!(!desk
        .preview_import("gym-2", ROSTER, &MappingOverride::new())
        .unwrap()
        .duplicate_import);
    assert!(desk.members("gym-2").unwrap().is_empty());
}

/// An updated row overwrites the stored member, including re-activation.
#[test]
fn updated_row_overwrites_member() {
    let desk = GymDesk::build_test().unwrap();
    let first = "Name,Email,Status,Join Date,Cancel Date,Monthly Rate\n\
                 Ben Okafor,ben@example.com,cancelled,2025-11-01,2026-03-15,120\n";
    let second = "Name,Email,Status,Join Date,Cancel Date,Monthly Rate\n\
                  Ben Okafor,ben@example.com,active,2025-11-01,,140\n";
    let mapping = detected_mapping(&desk, first);
    desk.commit_import("gym-1", first, &mapping, as_of()).unwrap();
    let summary = desk.commit_import("gym-1", second, &mapping, as_of()).unwrap().summary;
    assert_eq!(summary.updated, 1);

    let members = desk.members("gym-1").unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].status, MemberStatus::Active);
    assert_eq!(members[0].cancel_date, None);
    assert_eq!(members[0].monthly_rate, 140.0);
}

/// Structural problems fail before anything is written.
#[test]
fn structural_errors_write_nothing() {
    let desk = GymDesk::build_test().unwrap();

    let err = desk
        .commit_import("gym-1", "", &ColumnMapping::default(), as_of())
        .err()
        .unwrap();
    assert!(matches!(err, DeskError::EmptyFile));

    let mut no_join = detected_mapping(&desk, ROSTER);
    no_join.join_date = None;
    let err = desk.commit_import("gym-1", ROSTER, &no_join, as_of()).err().unwrap();
    assert!(matches!(err, DeskError::MissingRequiredMapping { ref field } if field == "joinDate"));

    let mut out_of_range = detected_mapping(&desk, ROSTER);
    out_of_range.monthly_rate = Some(9);
    let err = desk.commit_import("gym-1", ROSTER, &out_of_range, as_of()).err().unwrap();
    assert!(matches!(err, DeskError::MappingOutOfRange { index: 9, columns: 6, .. }));

    assert!(desk.members("gym-1").unwrap().is_empty());
    assert!(desk.recent_imports("gym-1", 10).unwrap().is_empty());
    assert!(desk.events("gym-1").unwrap().is_empty());
}

/// Quoted fields may span lines; the row keeps the line it starts on.
#[test]
fn embedded_newlines_keep_starting_line() {
    let desk = GymDesk::build_test().unwrap();
    let text = concat!(
        "Name,Email,Join Date\n",
        "\"Dana\nSmith\",dana@example.com,2026-02-01\n",
        "Eve,eve@,2026-02-01\n",
    );
    let preview = desk.preview_import("gym-1", text, &MappingOverride::new()).unwrap();
    assert_eq!(preview.total_rows, 2);
    assert_eq!(preview.validation.valid_rows, 1);
    assert_eq!(preview.validation.errors[0].line, 4);
    assert_eq!(preview.validation.errors[0].field, CanonicalField::Email);
}

/// The import event payload round-trips through the event log.
#[test]
fn import_event_payload_is_typed() {
    let desk = GymDesk::build_test().unwrap();
    let mapping = detected_mapping(&desk, ROSTER);
    desk.commit_import("gym-1", ROSTER, &mapping, as_of()).unwrap();

    let entry = desk
        .events("gym-1")
        .unwrap()
        .into_iter()
        .find(|e| e.event_type == "import_committed")
        .unwrap();
    let event: DeskEvent = serde_json::from_str(&entry.payload).unwrap();
    assert!(matches!(
        event,
        DeskEvent::ImportCommitted { imported: 3, error_count: 1, .. }
    ));
}
