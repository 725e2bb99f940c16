use super::{timestamp_col, DeskStore};
use crate::{error::DeskResult, member::MemberContact};
use rusqlite::{params, Row};

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<MemberContact> {
    Ok(MemberContact {
        member_id: row.get(0)?,
        gym_id: row.get(1)?,
        contacted_at: timestamp_col(row, 2)?,
        note: row.get(3)?,
    })
}

impl DeskStore {
    // ── Outreach log ──────────────────────────────────────────────

    pub fn insert_contact(&self, contact: &MemberContact) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO member_contact (member_id, gym_id, contacted_at, note)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                contact.member_id,
                contact.gym_id,
                contact.contacted_at.to_rfc3339(),
                contact.note,
            ],
        )?;
        Ok(())
    }

    /// Every contact for the gym, oldest first.
    pub fn contacts_for_gym(&self, gym_id: &str) -> DeskResult<Vec<MemberContact>> {
        let mut stmt = self.conn.prepare(
            "SELECT member_id, gym_id, contacted_at, note
             FROM member_contact WHERE gym_id = ?1
             ORDER BY contacted_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![gym_id], contact_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn contacts_for_member(&self, member_id: &str) -> DeskResult<Vec<MemberContact>> {
        let mut stmt = self.conn.prepare(
            "SELECT member_id, gym_id, contacted_at, note
             FROM member_contact WHERE member_id = ?1
             ORDER BY contacted_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![member_id], contact_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
