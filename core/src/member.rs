//! Member roster types shared by the import pipeline, the sync connector
//! and every analyzer downstream of the store.

use crate::types::{days_between, GymId, MemberId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Cancelled,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db(value: &str) -> Self {
        if value == "cancelled" {
            Self::Cancelled
        } else {
            Self::Active
        }
    }
}

/// Free-text status values that mean the membership has ended.
/// Everything else counts as active, including frozen, paused and on-hold.
pub const CANCELLED_STATUS_WORDS: &[&str] = &[
    "cancelled",
    "canceled",
    "inactive",
    "former",
    "dropped",
    "expired",
    "terminated",
    "left",
    "churned",
];

/// Bucket a free-text status into the two stored states.
pub fn bucket_status(raw: &str) -> MemberStatus {
    let value = raw.trim().to_lowercase();
    if CANCELLED_STATUS_WORDS.contains(&value.as_str()) {
        MemberStatus::Cancelled
    } else {
        MemberStatus::Active
    }
}

/// The canonical member shape produced by both the CSV pipeline and the
/// fitness-platform transform. The reconciler accepts nothing else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedMember {
    pub name: String,
    pub email: Option<String>,
    pub status: MemberStatus,
    pub join_date: NaiveDate,
    pub cancel_date: Option<NaiveDate>,
    pub monthly_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub member_id: MemberId,
    pub gym_id: GymId,
    pub name: String,
    pub email: Option<String>,
    pub status: MemberStatus,
    pub join_date: NaiveDate,
    pub cancel_date: Option<NaiveDate>,
    pub monthly_rate: f64,
}

impl Member {
    /// Active as of `date`: joined on or before it and not yet cancelled.
    /// A cancelled member without a cancel date is never active.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        if self.join_date > date {
            return false;
        }
        match self.cancel_date {
            Some(cancel) => cancel > date,
            None => self.status == MemberStatus::Active,
        }
    }

    /// Days of membership as of `date`, stopping at the cancel date.
    pub fn tenure_days(&self, date: NaiveDate) -> i64 {
        let end = match self.cancel_date {
            Some(cancel) if cancel < date => cancel,
            _ => date,
        };
        days_between(self.join_date, end)
    }

    /// Days between joining and cancelling, for cancelled members.
    pub fn lifetime_days(&self) -> Option<i64> {
        self.cancel_date.map(|c| days_between(self.join_date, c))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberContact {
    pub member_id: MemberId,
    pub gym_id: GymId,
    pub contacted_at: DateTime<Utc>,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(join: (i32, u32, u32), cancel: Option<(i32, u32, u32)>) -> Member {
        let d = |(y, m, dd): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, dd).unwrap();
        Member {
            member_id: "m-1".into(),
            gym_id: "gym".into(),
            name: "Sam".into(),
            email: None,
            status: if cancel.is_some() { MemberStatus::Cancelled } else { MemberStatus::Active },
            join_date: d(join),
            cancel_date: cancel.map(d),
            monthly_rate: 100.0,
        }
    }

    #[test]
    fn frozen_and_paused_stay_active() {
        assert_eq!(bucket_status("Frozen"), MemberStatus::Active);
        assert_eq!(bucket_status("paused"), MemberStatus::Active);
        assert_eq!(bucket_status(" Terminated "), MemberStatus::Cancelled);
        assert_eq!(bucket_status("CANCELED"), MemberStatus::Cancelled);
    }

    #[test]
    fn cancel_day_is_not_active() {
        let m = member((2024, 1, 10), Some((2024, 3, 1)));
        let d = |y, mo, dd| NaiveDate::from_ymd_opt(y, mo, dd).unwrap();
        assert!(!m.is_active_on(d(2024, 1, 9)));
        assert!(m.is_active_on(d(2024, 2, 29)));
        assert!(!m.is_active_on(d(2024, 3, 1)));
        assert_eq!(m.tenure_days(d(2025, 1, 1)), 51);
    }
}
