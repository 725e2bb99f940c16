use super::{date_col, fmt_date, opt_date_col, DeskStore};
use crate::{
    error::DeskResult,
    member::{Member, MemberStatus, ParsedMember},
};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

/// "Active as of ?2" for the member table, shared by every roster query.
const ACTIVE_AS_OF: &str = "join_date <= ?2 AND (CASE WHEN cancel_date IS NOT NULL
         THEN cancel_date > ?2 ELSE status = 'active' END)";

const MEMBER_COLUMNS: &str =
    "member_id, gym_id, name, email, status, join_date, cancel_date, monthly_rate";

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        member_id: row.get(0)?,
        gym_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        status: MemberStatus::from_db(&row.get::<_, String>(4)?),
        join_date: date_col(row, 5)?,
        cancel_date: opt_date_col(row, 6)?,
        monthly_rate: row.get(7)?,
    })
}

impl DeskStore {
    // ── Roster writes ─────────────────────────────────────────────

    pub fn find_member_id_by_email(&self, gym_id: &str, email: &str) -> DeskResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT member_id FROM member WHERE gym_id = ?1 AND email = ?2",
                params![gym_id, email],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert a member with no dedup key. Returns the new member id.
    pub fn insert_member(&self, gym_id: &str, m: &ParsedMember) -> DeskResult<String> {
        let member_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO member (
                member_id, gym_id, name, email, status, join_date, cancel_date,
                monthly_rate, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                member_id,
                gym_id,
                m.name,
                m.email,
                m.status.as_str(),
                fmt_date(m.join_date),
                m.cancel_date.map(fmt_date),
                m.monthly_rate,
                now,
            ],
        )?;
        Ok(member_id)
    }

    /// Insert-or-overwrite keyed by (gym, email). The conflict is resolved
    /// by SQLite, so two concurrent imports of one email still yield one row.
    pub fn upsert_member_by_email(
        &self,
        gym_id: &str,
        email: &str,
        m: &ParsedMember,
    ) -> DeskResult<String> {
        let now = Utc::now().to_rfc3339();
        let member_id: String = self.conn.query_row(
            "INSERT INTO member (
                member_id, gym_id, name, email, status, join_date, cancel_date,
                monthly_rate, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT (gym_id, email) WHERE email IS NOT NULL DO UPDATE SET
                name         = excluded.name,
                status       = excluded.status,
                join_date    = excluded.join_date,
                cancel_date  = excluded.cancel_date,
                monthly_rate = excluded.monthly_rate,
                updated_at   = excluded.updated_at
            RETURNING member_id",
            params![
                uuid::Uuid::new_v4().to_string(),
                gym_id,
                m.name,
                email,
                m.status.as_str(),
                fmt_date(m.join_date),
                m.cancel_date.map(fmt_date),
                m.monthly_rate,
                now,
            ],
            |row| row.get(0),
        )?;
        Ok(member_id)
    }

    // ── Roster reads ──────────────────────────────────────────────

    pub fn get_member(&self, member_id: &str) -> DeskResult<Option<Member>> {
        self.conn
            .query_row(
                &format!("SELECT {MEMBER_COLUMNS} FROM member WHERE member_id = ?1"),
                params![member_id],
                member_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn members_for_gym(&self, gym_id: &str) -> DeskResult<Vec<Member>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM member WHERE gym_id = ?1
             ORDER BY join_date ASC, member_id ASC"
        ))?;
        let rows = stmt.query_map(params![gym_id], member_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn active_members_as_of(&self, gym_id: &str, date: NaiveDate) -> DeskResult<Vec<Member>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM member
             WHERE gym_id = ?1 AND {ACTIVE_AS_OF}
             ORDER BY join_date ASC, member_id ASC"
        ))?;
        let rows = stmt.query_map(params![gym_id, fmt_date(date)], member_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_active_as_of(&self, gym_id: &str, date: NaiveDate) -> DeskResult<i64> {
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM member WHERE gym_id = ?1 AND {ACTIVE_AS_OF}"),
                params![gym_id, fmt_date(date)],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn count_joins_between(
        &self,
        gym_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DeskResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM member
                 WHERE gym_id = ?1 AND join_date >= ?2 AND join_date <= ?3",
                params![gym_id, fmt_date(start), fmt_date(end)],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Members whose cancel date falls in [start, end].
    pub fn cancelled_between(
        &self,
        gym_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DeskResult<Vec<Member>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM member
             WHERE gym_id = ?1 AND cancel_date IS NOT NULL
               AND cancel_date >= ?2 AND cancel_date <= ?3
             ORDER BY cancel_date ASC"
        ))?;
        let rows = stmt.query_map(
            params![gym_id, fmt_date(start), fmt_date(end)],
            member_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Earliest join or cancel date on record for the gym.
    pub fn earliest_activity_date(&self, gym_id: &str) -> DeskResult<Option<NaiveDate>> {
        let raw: Option<String> = self.conn.query_row(
            "SELECT MIN(d) FROM (
                SELECT join_date AS d FROM member WHERE gym_id = ?1
                UNION ALL
                SELECT cancel_date AS d FROM member
                 WHERE gym_id = ?1 AND cancel_date IS NOT NULL
             )",
            params![gym_id],
            |row| row.get(0),
        )?;
        Ok(raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
    }

    pub fn member_count(&self, gym_id: &str) -> DeskResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM member WHERE gym_id = ?1",
                params![gym_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Every gym with at least one member.
    pub fn gym_ids(&self) -> DeskResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT gym_id FROM member ORDER BY gym_id ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
