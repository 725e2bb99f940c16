use chrono::NaiveDate;
use gymdesk_core::{
    engine::GymDesk,
    error::DeskError,
    member::MemberStatus,
    sync::{FitnessPlatform, PlatformError, RetryPolicy, VendorClient, VendorMembership},
};
use std::{cell::Cell, time::Duration};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

/// In-process platform that fails `flaky` times with a 503 before answering.
struct FakePlatform {
    authorized: bool,
    flaky: Cell<u32>,
    clients: Vec<VendorClient>,
    memberships: Vec<VendorMembership>,
}

impl FitnessPlatform for FakePlatform {
    fn test_connection(&self, _api_key: &str) -> Result<bool, PlatformError> {
        Ok(self.authorized)
    }

    fn fetch_all_clients(&self, _api_key: &str) -> Result<Vec<VendorClient>, PlatformError> {
        if self.flaky.get() > 0 {
            self.flaky.set(self.flaky.get() - 1);
            return Err(PlatformError::Http(503));
        }
        Ok(self.clients.clone())
    }

    fn fetch_all_memberships(
        &self,
        _api_key: &str,
    ) -> Result<Vec<VendorMembership>, PlatformError> {
        Ok(self.memberships.clone())
    }
}

fn client(id: &str, first: &str, email: &str) -> VendorClient {
    VendorClient {
        id: id.into(),
        first_name: first.into(),
        last_name: "Tester".into(),
        email: Some(email.into()),
        created_at: Some("2025-06-01".into()),
    }
}

fn membership(
    client_id: &str,
    status: &str,
    start: &str,
    end: Option<&str>,
    price: f64,
) -> VendorMembership {
    VendorMembership {
        client_id: client_id.into(),
        status: status.into(),
        start_date: Some(start.into()),
        end_date: end.map(String::from),
        price,
        billing_frequency: Some("monthly".into()),
    }
}

fn platform(flaky: u32) -> FakePlatform {
    FakePlatform {
        authorized: true,
        flaky: Cell::new(flaky),
        clients: vec![
            client("1", "Ana", "ana@example.com"),
            client("2", "Ben", "ben@example.com"),
            VendorClient { created_at: None, ..client("3", "Nodate", "nodate@example.com") },
        ],
        memberships: vec![
            // Ben's older cancelled membership loses to the newer active one.
            membership("2", "cancelled", "2025-01-01", Some("2025-05-01"), 90.0),
            membership("2", "active", "2025-07-01", None, 110.0),
            membership("1", "active", "2026-02-01", None, 150.0),
        ],
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Sync reconciles the roster, keeps the newest membership per client,
/// and rebuilds metrics.
#[test]
fn sync_imports_roster_and_recomputes() {
    let desk = GymDesk::build_test().unwrap();
    let summary = desk
        .sync_gym("gym-1", &platform(0), "key", &RetryPolicy::default(), &mut |_| {}, today())
        .unwrap();

    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.transformed, 2);
    assert_eq!(summary.imported, 2);

    let members = desk.members("gym-1").unwrap();
    let ben = members.iter().find(|m| m.name == "Ben Tester").unwrap();
    assert_eq!(ben.status, MemberStatus::Active);
    assert_eq!(ben.monthly_rate, 110.0);

    assert!(!desk.metrics_history("gym-1").unwrap().is_empty());
    assert!(desk
        .events("gym-1")
        .unwrap()
        .iter()
        .any(|e| e.event_type == "sync_completed"));
}

/// A second sync updates by email instead of duplicating.
#[test]
fn resync_updates_in_place() {
    let desk = GymDesk::build_test().unwrap();
    let policy = RetryPolicy::default();
    desk.sync_gym("gym-1", &platform(0), "key", &policy, &mut |_| {}, today()).unwrap();
    let again = desk
        .sync_gym("gym-1", &platform(0), "key", &policy, &mut |_| {}, today())
        .unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.updated, 2);
    assert_eq!(desk.members("gym-1").unwrap().len(), 2);
}

/// Transient failures are retried with backoff.
#[test]
fn transient_errors_are_retried() {
    let desk = GymDesk::build_test().unwrap();
    let mut slept = Vec::new();
    let policy = RetryPolicy::default();
    desk.sync_gym("gym-1", &platform(2), "key", &policy, &mut |d| slept.push(d), today()).unwrap();
    assert_eq!(slept, vec![Duration::from_millis(500), Duration::from_millis(1000)]);
}

/// A rejected key stops the sync before anything is written.
#[test]
fn unauthorized_key_writes_nothing() {
    let desk = GymDesk::build_test().unwrap();
    let rejected = FakePlatform { authorized: false, ..platform(0) };
    let err = desk
        .sync_gym("gym-1", &rejected, "bad", &RetryPolicy::default(), &mut |_| {}, today())
        .unwrap_err();
    assert!(matches!(err, DeskError::Platform(_)));
    assert!(desk.members("gym-1").unwrap().is_empty());
}
