//! Import reconciler: folds validated rows into the stored roster.
//!
//! Rows with an email are upserted on (gym, email); rows without one are
//! always inserted. A row the store rejects is logged and counted as
//! skipped, and the loop moves on.

use crate::{
    error::DeskResult,
    member::{MemberStatus, ParsedMember},
    store::DeskStore,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileStats {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub fn reconcile_members(
    store: &DeskStore,
    gym_id: &str,
    members: &[ParsedMember],
) -> ReconcileStats {
    let mut stats = ReconcileStats::default();

    for member in members {
        match reconcile_one(store, gym_id, member) {
            Ok(true) => stats.updated += 1,
            Ok(false) => stats.imported += 1,
            Err(e) => {
                log::warn!("skipping member '{}' for {gym_id}: {e}", member.name);
                stats.skipped += 1;
            }
        }
    }

    log::info!(
        "reconciled {} rows for {gym_id}: imported={} updated={} skipped={}",
        members.len(),
        stats.imported,
        stats.updated,
        stats.skipped
    );
    stats
}

/// Returns true when an existing member was overwritten.
fn reconcile_one(store: &DeskStore, gym_id: &str, member: &ParsedMember) -> DeskResult<bool> {
    let Some(email) = member.email.as_deref() else {
        store.insert_member(gym_id, member)?;
        return Ok(false);
    };

    let existing = match store.find_member_id_by_email(gym_id, email)? {
        Some(id) => store.get_member(&id)?,
        None => None,
    };
    let member_id = store.upsert_member_by_email(gym_id, email, member)?;

    match existing {
        Some(previous) => {
            if previous.status == MemberStatus::Cancelled && member.status == MemberStatus::Active {
                log::info!("member {member_id} re-activated by import for {gym_id}");
            }
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn store() -> DeskStore {
        let store = DeskStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    fn parsed(name: &str, email: Option<&str>, rate: f64) -> ParsedMember {
        ParsedMember {
            name: name.into(),
            email: email.map(str::to_string),
            status: MemberStatus::Active,
            join_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            cancel_date: None,
            monthly_rate: rate,
        }
    }

    #[test]
    fn same_email_updates_in_place() {
        let store = store();
        let first = reconcile_members(&store, "g1", &[parsed("Pat", Some("pat@gym.io"), 99.0)]);
        assert_eq!(first, ReconcileStats { imported: 1, updated: 0, skipped: 0 });

        let second = reconcile_members(&store, "g1", &[parsed("Pat L", Some("pat@gym.io"), 120.0)]);
        assert_eq!(second, ReconcileStats { imported: 0, updated: 1, skipped: 0 });

        let members = store.members_for_gym("g1").unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "Pat L");
        assert_eq!(members[0].monthly_rate, 120.0);
    }

    #[test]
    fn rows_without_email_always_insert() {
        let store = store();
        let rows = [parsed("Sam", None, 50.0), parsed("Sam", None, 50.0)];
        let stats = reconcile_members(&store, "g1", &rows);
        assert_eq!(stats.imported, 2);
        assert_eq!(store.member_count("g1").unwrap(), 2);
    }

    #[test]
    fn email_dedup_is_scoped_per_gym() {
        let store = store();
        reconcile_members(&store, "g1", &[parsed("Pat", Some("pat@gym.io"), 99.0)]);
        let stats = reconcile_members(&store, "g2", &[parsed("Pat", Some("pat@gym.io"), 99.0)]);
        assert_eq!(stats.imported, 1);
        assert_eq!(store.gym_ids().unwrap(), vec!["g1".to_string(), "g2".to_string()]);
    }

    #[test]
    fn reactivation_clears_the_cancel_date() {
        let store = store();
        let mut cancelled = parsed("Lee", Some("lee@gym.io"), 80.0);
        cancelled.status = MemberStatus::Cancelled;
        cancelled.cancel_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        reconcile_members(&store, "g1", &[cancelled]);

        reconcile_members(&store, "g1", &[parsed("Lee", Some("lee@gym.io"), 80.0)]);
        let lee = &store.members_for_gym("g1").unwrap()[0];
        assert_eq!(lee.status, MemberStatus::Active);
        assert_eq!(lee.cancel_date, None);
    }
}
