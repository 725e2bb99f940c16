use super::{date_col, fmt_date, opt_timestamp_col, DeskStore};
use crate::{
    error::DeskResult,
    interventions::InterventionType,
    learning::{ChecklistItem, LearningEvent, LearningStat, RecommendationCard},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

fn intervention_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<InterventionType> {
    let raw: String = row.get(idx)?;
    InterventionType::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown intervention type '{raw}'").into(),
        )
    })
}

const CARD_COLUMNS: &str = "card_id, gym_id, template_id, intervention_type, title,
    created_on, baseline_members, baseline_mrr, baseline_churn, score";

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<RecommendationCard> {
    Ok(RecommendationCard {
        card_id: row.get(0)?,
        gym_id: row.get(1)?,
        template_id: row.get(2)?,
        intervention_type: intervention_col(row, 3)?,
        title: row.get(4)?,
        created_on: date_col(row, 5)?,
        baseline_members: row.get(6)?,
        baseline_mrr: row.get(7)?,
        baseline_churn: row.get(8)?,
        score: row.get(9)?,
    })
}

fn stat_from_row(row: &Row<'_>) -> rusqlite::Result<LearningStat> {
    Ok(LearningStat {
        intervention_type: intervention_col(row, 0)?,
        scope: row.get(1)?,
        expected_impact: row.get(2)?,
        confidence: row.get(3)?,
        samples: row.get(4)?,
        updated_on: date_col(row, 5)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl DeskStore {
    // ── Recommendation cards ──────────────────────────────────────

    /// Persist a card and its checklist together.
    pub fn insert_card(&self, card: &RecommendationCard, checklist: &[String]) -> DeskResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO recommendation_card ({CARD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                card.card_id,
                card.gym_id,
                card.template_id,
                card.intervention_type.as_str(),
                card.title,
                fmt_date(card.created_on),
                card.baseline_members,
                card.baseline_mrr,
                card.baseline_churn,
                card.score,
            ],
        )?;
        for (index, label) in checklist.iter().enumerate() {
            tx.execute(
                "INSERT INTO checklist_item (card_id, item_index, label, completed_at)
                 VALUES (?1, ?2, ?3, NULL)",
                params![card.card_id, index as i64, label],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_card(&self, card_id: &str) -> DeskResult<Option<RecommendationCard>> {
        self.conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM recommendation_card WHERE card_id = ?1"),
                params![card_id],
                card_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Every card ever snapshotted, oldest first.
    pub fn all_cards(&self) -> DeskResult<Vec<RecommendationCard>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM recommendation_card ORDER BY created_on ASC, card_id ASC"
        ))?;
        let rows = stmt.query_map([], card_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn cards_for_gym(&self, gym_id: &str) -> DeskResult<Vec<RecommendationCard>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM recommendation_card
             WHERE gym_id = ?1 ORDER BY created_on ASC, card_id ASC"
        ))?;
        let rows = stmt.query_map(params![gym_id], card_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Checklists ────────────────────────────────────────────────

    pub fn checklist_for_card(&self, card_id: &str) -> DeskResult<Vec<ChecklistItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT card_id, item_index, label, completed_at
             FROM checklist_item WHERE card_id = ?1 ORDER BY item_index ASC",
        )?;
        let rows = stmt.query_map(params![card_id], |row| {
            Ok(ChecklistItem {
                card_id: row.get(0)?,
                item_index: row.get(1)?,
                label: row.get(2)?,
                completed_at: opt_timestamp_col(row, 3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Mark (or clear) one checklist item. Returns false if no such item.
    pub fn set_checklist_completed(
        &self,
        card_id: &str,
        item_index: i64,
        completed_at: Option<DateTime<Utc>>,
    ) -> DeskResult<bool> {
        let changed = self.conn.execute(
            "UPDATE checklist_item SET completed_at = ?3
             WHERE card_id = ?1 AND item_index = ?2",
            params![card_id, item_index, completed_at.map(|t| t.to_rfc3339())],
        )?;
        Ok(changed > 0)
    }

    // ── Learning events ───────────────────────────────────────────

    pub fn learning_event_exists(&self, card_id: &str, window_days: i64) -> DeskResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM learning_event WHERE card_id = ?1 AND window_days = ?2",
                params![card_id, window_days],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert an evaluated outcome. A second insert for the same
    /// (card, window) is a no-op and returns false.
    pub fn insert_learning_event(&self, event: &LearningEvent) -> DeskResult<bool> {
        let result = self.conn.execute(
            "INSERT INTO learning_event (
                card_id, window_days, gym_id, intervention_type, evaluated_on,
                delta_mrr, delta_members, delta_churn, overlap_factor, impact_score
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.card_id,
                event.window_days,
                event.gym_id,
                event.intervention_type.as_str(),
                fmt_date(event.evaluated_on),
                event.delta_mrr,
                event.delta_members,
                event.delta_churn,
                event.overlap_factor,
                event.impact_score,
            ],
        );
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => {
                log::debug!(
                    "learning event for card {} window {} already recorded",
                    event.card_id,
                    event.window_days
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn learning_events_for_gym(&self, gym_id: &str) -> DeskResult<Vec<LearningEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT card_id, window_days, gym_id, intervention_type, evaluated_on,
                    delta_mrr, delta_members, delta_churn, overlap_factor, impact_score
             FROM learning_event WHERE gym_id = ?1
             ORDER BY evaluated_on ASC, card_id ASC, window_days ASC",
        )?;
        let rows = stmt.query_map(params![gym_id], |row| {
            Ok(LearningEvent {
                card_id: row.get(0)?,
                window_days: row.get(1)?,
                gym_id: row.get(2)?,
                intervention_type: intervention_col(row, 3)?,
                evaluated_on: date_col(row, 4)?,
                delta_mrr: row.get(5)?,
                delta_members: row.get(6)?,
                delta_churn: row.get(7)?,
                overlap_factor: row.get(8)?,
                impact_score: row.get(9)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Learning stats ────────────────────────────────────────────

    pub fn learning_stat(
        &self,
        kind: InterventionType,
        scope: &str,
    ) -> DeskResult<Option<LearningStat>> {
        self.conn
            .query_row(
                "SELECT intervention_type, scope, expected_impact, confidence, samples, updated_on
                 FROM learning_stat WHERE intervention_type = ?1 AND scope = ?2",
                params![kind.as_str(), scope],
                stat_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn upsert_learning_stat(&self, stat: &LearningStat) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO learning_stat (
                intervention_type, scope, expected_impact, confidence, samples, updated_on
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(intervention_type, scope) DO UPDATE SET
                expected_impact = excluded.expected_impact,
                confidence      = excluded.confidence,
                samples         = excluded.samples,
                updated_on      = excluded.updated_on",
            params![
                stat.intervention_type.as_str(),
                stat.scope,
                stat.expected_impact,
                stat.confidence,
                stat.samples,
                fmt_date(stat.updated_on),
            ],
        )?;
        Ok(())
    }

    pub fn learning_stats(&self) -> DeskResult<Vec<LearningStat>> {
        let mut stmt = self.conn.prepare(
            "SELECT intervention_type, scope, expected_impact, confidence, samples, updated_on
             FROM learning_stat ORDER BY scope ASC, intervention_type ASC",
        )?;
        let rows = stmt.query_map([], stat_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
