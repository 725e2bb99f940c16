use super::{date_col, fmt_date, DeskStore};
use crate::{error::DeskResult, metrics::MonthlyMetrics};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

const METRIC_COLUMNS: &str = "gym_id, month_start, active_members, active_start_of_month,
    new_members, cancels, churn_rate, rolling_churn_3m, mrr, arm, ltv, rsi, res,
    ltv_impact, risk_members";

fn metrics_from_row(row: &Row<'_>) -> rusqlite::Result<MonthlyMetrics> {
    Ok(MonthlyMetrics {
        gym_id: row.get(0)?,
        month_start: date_col(row, 1)?,
        active_members: row.get(2)?,
        active_start_of_month: row.get(3)?,
        new_members: row.get(4)?,
        cancels: row.get(5)?,
        churn_rate: row.get(6)?,
        rolling_churn_3m: row.get(7)?,
        mrr: row.get(8)?,
        arm: row.get(9)?,
        ltv: row.get(10)?,
        rsi: row.get(11)?,
        res: row.get(12)?,
        ltv_impact: row.get(13)?,
        risk_members: row.get(14)?,
    })
}

impl DeskStore {
    // ── Monthly metrics ───────────────────────────────────────────

    pub fn upsert_monthly_metrics(&self, m: &MonthlyMetrics) -> DeskResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO monthly_metrics ({METRIC_COLUMNS})
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)
                 ON CONFLICT(gym_id, month_start) DO UPDATE SET
                    active_members        = excluded.active_members,
                    active_start_of_month = excluded.active_start_of_month,
                    new_members           = excluded.new_members,
                    cancels               = excluded.cancels,
                    churn_rate            = excluded.churn_rate,
                    rolling_churn_3m      = excluded.rolling_churn_3m,
                    mrr                   = excluded.mrr,
                    arm                   = excluded.arm,
                    ltv                   = excluded.ltv,
                    rsi                   = excluded.rsi,
                    res                   = excluded.res,
                    ltv_impact            = excluded.ltv_impact,
                    risk_members          = excluded.risk_members"
            ),
            params![
                m.gym_id,
                fmt_date(m.month_start),
                m.active_members,
                m.active_start_of_month,
                m.new_members,
                m.cancels,
                m.churn_rate,
                m.rolling_churn_3m,
                m.mrr,
                m.arm,
                m.ltv,
                m.rsi,
                m.res,
                m.ltv_impact,
                m.risk_members,
            ],
        )?;
        Ok(())
    }

    pub fn monthly_metrics(
        &self,
        gym_id: &str,
        month_start: NaiveDate,
    ) -> DeskResult<Option<MonthlyMetrics>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {METRIC_COLUMNS} FROM monthly_metrics
                     WHERE gym_id = ?1 AND month_start = ?2"
                ),
                params![gym_id, fmt_date(month_start)],
                metrics_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Full history, oldest month first.
    pub fn metrics_history(&self, gym_id: &str) -> DeskResult<Vec<MonthlyMetrics>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {METRIC_COLUMNS} FROM monthly_metrics
             WHERE gym_id = ?1 ORDER BY month_start ASC"
        ))?;
        let rows = stmt.query_map(params![gym_id], metrics_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Up to `limit` stored months strictly before `month_start`, oldest first.
    pub fn metrics_before(
        &self,
        gym_id: &str,
        month_start: NaiveDate,
        limit: usize,
    ) -> DeskResult<Vec<MonthlyMetrics>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {METRIC_COLUMNS} FROM monthly_metrics
             WHERE gym_id = ?1 AND month_start < ?2
             ORDER BY month_start DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![gym_id, fmt_date(month_start), limit as i64],
            metrics_from_row,
        )?;
        let mut months = rows.collect::<Result<Vec<_>, _>>()?;
        months.reverse();
        Ok(months)
    }

    /// Up to `limit` most recent stored months on or before `month_start`,
    /// oldest first.
    pub fn recent_metrics(
        &self,
        gym_id: &str,
        month_start: NaiveDate,
        limit: usize,
    ) -> DeskResult<Vec<MonthlyMetrics>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {METRIC_COLUMNS} FROM monthly_metrics
             WHERE gym_id = ?1 AND month_start <= ?2
             ORDER BY month_start DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![gym_id, fmt_date(month_start), limit as i64],
            metrics_from_row,
        )?;
        let mut months = rows.collect::<Result<Vec<_>, _>>()?;
        months.reverse();
        Ok(months)
    }
}
