//! Fitness-platform sync.
//!
//! A vendor connector implements `FitnessPlatform` and returns raw client
//! and membership records. `transform_vendor_member` maps one client and
//! its current membership into the same `ParsedMember` the CSV pipeline
//! produces, so everything downstream is source-agnostic.
//!
//! Vendor calls go through `RetryPolicy`: 429 and 5xx responses are
//! retried with exponential backoff, anything else fails immediately.
//! The sleep is injected so callers (and tests) control time.

use crate::{
    error::{DeskError, DeskResult},
    event::DeskEvent,
    member::{bucket_status, MemberStatus, ParsedMember},
    normalize::{clean_name, is_valid_email, parse_date},
    reconciler::{reconcile_members, ReconcileStats},
    store::DeskStore,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

// ── Vendor contract ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorClient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    /// Account creation date; used when no membership start is known.
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorMembership {
    pub client_id: String,
    pub status: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub price: f64,
    /// `weekly`, `biweekly`, `monthly`, `quarterly`, `semiannual`, `annual`.
    pub billing_frequency: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("platform returned HTTP {0}")]
    Http(u16),
    #[error("platform transport failure: {0}")]
    Transport(String),
    #[error("platform rejected the API key")]
    Unauthorized,
}

impl PlatformError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(status) => *status == 429 || (500..600).contains(status),
            Self::Transport(_) => true,
            Self::Unauthorized => false,
        }
    }
}

impl From<PlatformError> for DeskError {
    fn from(e: PlatformError) -> Self {
        DeskError::Platform(e.to_string())
    }
}

pub trait FitnessPlatform {
    fn test_connection(&self, api_key: &str) -> Result<bool, PlatformError>;
    fn fetch_all_clients(&self, api_key: &str) -> Result<Vec<VendorClient>, PlatformError>;
    fn fetch_all_memberships(&self, api_key: &str) -> Result<Vec<VendorMembership>, PlatformError>;
}

// ── Transform ─────────────────────────────────────────────────────

fn monthly_equivalent(price: f64, frequency: Option<&str>) -> f64 {
    let per_month = match frequency.map(|f| f.trim().to_lowercase()).as_deref() {
        Some("weekly") => price * 52.0 / 12.0,
        Some("biweekly") | Some("fortnightly") => price * 26.0 / 12.0,
        Some("quarterly") => price / 3.0,
        Some("semiannual") | Some("semi-annual") => price / 6.0,
        Some("annual") | Some("annually") | Some("yearly") => price / 12.0,
        _ => price,
    };
    (per_month.max(0.0) * 100.0).round() / 100.0
}

/// Map a vendor client and its membership to the canonical member shape.
/// Returns `None` when the client has no usable name or join date.
pub fn transform_vendor_member(
    client: &VendorClient,
    membership: Option<&VendorMembership>,
) -> Option<ParsedMember> {
    let name = clean_name(&format!("{} {}", client.first_name.trim(), client.last_name.trim()));
    if name.is_empty() {
        return None;
    }
    let email = client
        .email
        .as_deref()
        .filter(|e| is_valid_email(e))
        .map(|e| e.trim().to_lowercase());

    let join_date = membership
        .and_then(|m| m.start_date.as_deref())
        .and_then(parse_date)
        .or_else(|| client.created_at.as_deref().and_then(parse_date))?;

    let status = membership
        .map(|m| bucket_status(&m.status))
        .unwrap_or(MemberStatus::Cancelled);
    let cancel_date = match status {
        MemberStatus::Cancelled => membership
            .and_then(|m| m.end_date.as_deref())
            .and_then(parse_date)
            .map(|d| d.max(join_date)),
        MemberStatus::Active => None,
    };

    Some(ParsedMember {
        name,
        email,
        status,
        join_date,
        cancel_date,
        monthly_rate: membership
            .map(|m| monthly_equivalent(m.price, m.billing_frequency.as_deref()))
            .unwrap_or(0.0),
    })
}

// ── Retry ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(exponent)
                .min(self.max_backoff_ms),
        )
    }

    pub fn run<T>(
        &self,
        label: &str,
        sleep: &mut dyn FnMut(Duration),
        mut op: impl FnMut() -> Result<T, PlatformError>,
    ) -> Result<T, PlatformError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.delay(attempt);
                    log::warn!("{label} retry {attempt}/{attempts} after {e} (sleep {delay:?})");
                    sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ── Sync ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSummary {
    pub fetched: usize,
    pub transformed: usize,
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Pull the full roster from the platform and reconcile it into the gym.
/// When a client has several memberships the one with the latest start
/// date wins.
pub fn sync_gym(
    store: &DeskStore,
    platform: &dyn FitnessPlatform,
    api_key: &str,
    gym_id: &str,
    policy: &RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> DeskResult<SyncSummary> {
    if !policy.run("test_connection", sleep, || platform.test_connection(api_key))? {
        return Err(PlatformError::Unauthorized.into());
    }
    let clients = policy.run("fetch_all_clients", sleep, || platform.fetch_all_clients(api_key))?;
    let memberships =
        policy.run("fetch_all_memberships", sleep, || platform.fetch_all_memberships(api_key))?;

    let mut current: HashMap<&str, &VendorMembership> = HashMap::new();
    for m in &memberships {
        let start = m.start_date.as_deref().and_then(parse_date);
        current
            .entry(m.client_id.as_str())
            .and_modify(|existing| {
                if start > existing.start_date.as_deref().and_then(parse_date) {
                    *existing = m;
                }
            })
            .or_insert(m);
    }

    let parsed: Vec<ParsedMember> = clients
        .iter()
        .filter_map(|c| {
            let member = transform_vendor_member(c, current.get(c.id.as_str()).copied());
            if member.is_none() {
                log::debug!("vendor client {} has no usable name or join date", c.id);
            }
            member
        })
        .collect();

    let ReconcileStats { imported, updated, skipped } = reconcile_members(store, gym_id, &parsed);
    let summary = SyncSummary {
        fetched: clients.len(),
        transformed: parsed.len(),
        imported,
        updated,
        skipped,
    };
    store.append_event(&DeskEvent::SyncCompleted {
        gym_id: gym_id.to_string(),
        fetched: summary.fetched,
        transformed: summary.transformed,
        imported,
        updated,
    })?;
    log::info!(
        "synced {gym_id}: fetched={} transformed={} imported={imported} updated={updated}",
        summary.fetched,
        summary.transformed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn client(first: &str, email: Option<&str>) -> VendorClient {
        VendorClient {
            id: format!("c-{first}"),
            first_name: first.into(),
            last_name: "Rivera".into(),
            email: email.map(String::from),
            created_at: Some("2025-01-02".into()),
        }
    }

    fn membership(status: &str, price: f64, freq: &str) -> VendorMembership {
        VendorMembership {
            client_id: "c-Ana".into(),
            status: status.into(),
            start_date: Some("2025-03-01".into()),
            end_date: Some("2025-02-01".into()),
            price,
            billing_frequency: Some(freq.into()),
        }
    }

    #[test]
    fn rate_is_normalized_to_monthly() {
        let m = transform_vendor_member(
            &client("Ana", Some("ANA@Example.com")),
            Some(&membership("active", 30.0, "weekly")),
        )
        .unwrap();
        assert_eq!(m.monthly_rate, 130.0);
        assert_eq!(m.email.as_deref(), Some("ana@example.com"));
        assert_eq!(m.cancel_date, None);
        assert_eq!(monthly_equivalent(1200.0, Some("annual")), 100.0);
        assert_eq!(monthly_equivalent(99.0, None), 99.0);
    }

    #[test]
    fn cancel_date_never_precedes_join() {
        let m = transform_vendor_member(
            &client("Ana", None),
            Some(&membership("expired", 100.0, "monthly")),
        )
        .unwrap();
        assert_eq!(m.status, MemberStatus::Cancelled);
        assert_eq!(m.join_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(m.cancel_date, Some(m.join_date));
    }

    #[test]
    fn nameless_clients_are_dropped() {
        let blank = VendorClient {
            first_name: " ".into(),
            last_name: String::new(),
            ..client("Ana", None)
        };
        assert!(transform_vendor_member(&blank, None).is_none());
        let undated = VendorClient { created_at: None, ..client("Ana", None) };
        assert!(transform_vendor_member(&undated, None).is_none());
    }

    #[test]
    fn retries_only_transient_failures() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);
        let mut slept = Vec::new();
        let result = policy.run("fetch", &mut |d| slept.push(d), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(PlatformError::Http(503)) } else { Ok(7) }
        });
        assert_eq!(result, Ok(7));
        assert_eq!(slept, vec![Duration::from_millis(500), Duration::from_millis(1000)]);

        calls.set(0);
        let result: Result<(), _> = policy.run("fetch", &mut |_| {}, || {
            calls.set(calls.get() + 1);
            Err(PlatformError::Http(404))
        });
        assert_eq!(result, Err(PlatformError::Http(404)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let policy = RetryPolicy { max_attempts: 3, ..RetryPolicy::default() };
        let calls = Cell::new(0);
        let result: Result<(), _> = policy.run("fetch", &mut |_| {}, || {
            calls.set(calls.get() + 1);
            Err(PlatformError::Http(429))
        });
        assert_eq!(result, Err(PlatformError::Http(429)));
        assert_eq!(calls.get(), 3);
    }
}
