//! The desk: one gym-analytics facade over the store.
//!
//! Every external operation goes through `GymDesk`. It owns the store and
//! the scoring config; domain modules stay pure functions of their inputs.
//!
//! RULES:
//!   - Structural import failures (empty file, required field unmapped,
//!     mapped column out of range) return `Err` before any write.
//!   - The post-import metrics rebuild never fails the import. On a
//!     file-backed store it runs on its own connection and thread; on a
//!     private in-memory store it runs inline. Either way failures are
//!     logged only.
//!   - Every mutation appends a desk event.

use crate::{
    brief::BriefRecommendation,
    config::ScoringConfig,
    csv_parser::{parse_all_rows, parse_headers, preview_csv, PreviewResult},
    error::{DeskError, DeskResult},
    event::{DeskEvent, EventLogEntry},
    field_mapper::{CanonicalField, ColumnMapping, MappingOverride},
    insights::{CircuitState, InsightSource, StaticPlaybook},
    learning::{
        execution_strength, learned_weights, run_learning_update, set_checklist_item,
        snapshot_card, RecommendationCard,
    },
    member::{Member, MemberContact},
    metrics::{compute_monthly_metrics, recompute_all_metrics, MonthlyMetrics},
    normalize::ValidationError,
    predictive::{predictive_intelligence, PredictiveIntelligence},
    reconciler::reconcile_members,
    report::{monthly_report, MonthlyReport},
    risk_engine::{predict_gym, MemberPrediction},
    store::{DeskStore, ImportRecord},
    sync::{sync_gym, FitnessPlatform, RetryPolicy, SyncSummary},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{thread::JoinHandle, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportSummary {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub error_count: usize,
    /// First errors only; the full count is `error_count`.
    pub errors: Vec<ValidationError>,
}

/// Result of a committed import. `refresh` is set when the metrics rebuild
/// was handed to a background thread; join it to wait for fresh metrics.
pub struct CommitOutcome {
    pub summary: ImportSummary,
    pub refresh: Option<JoinHandle<()>>,
}

pub struct GymDesk {
    store: DeskStore,
    config: ScoringConfig,
    insights: Box<dyn InsightSource>,
    circuit: CircuitState,
}

impl GymDesk {
    pub fn new(store: DeskStore, config: ScoringConfig) -> Self {
        Self {
            store,
            config,
            insights: Box::new(StaticPlaybook),
            circuit: CircuitState::closed(),
        }
    }

    /// Open (or create) a database file, migrate it, and wrap it.
    pub fn open(path: &str, config: ScoringConfig) -> DeskResult<Self> {
        let store = DeskStore::open(path)?;
        store.migrate()?;
        Ok(Self::new(store, config))
    }

    /// Private in-memory desk with the shipped config. Used by tests.
    pub fn build_test() -> DeskResult<Self> {
        let store = DeskStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, ScoringConfig::default()))
    }

    pub fn with_insights(mut self, insights: Box<dyn InsightSource>) -> Self {
        self.insights = insights;
        self
    }

    pub fn store(&self) -> &DeskStore {
        &self.store
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn circuit(&self) -> &CircuitState {
        &self.circuit
    }

    // ── Import ────────────────────────────────────────────────────

    pub fn preview_import(
        &self,
        gym_id: &str,
        text: &str,
        overrides: &MappingOverride,
    ) -> DeskResult<PreviewResult> {
        let mut preview = preview_csv(text, overrides, &self.config.import)?;
        preview.duplicate_import = self.store.import_hash_exists(gym_id, &preview.file_hash)?;
        if preview.duplicate_import {
            log::info!("preview for {gym_id}: file {} was imported before", preview.file_hash);
        }
        Ok(preview)
    }

    pub fn commit_import(
        &self,
        gym_id: &str,
        text: &str,
        mapping: &ColumnMapping,
        as_of: NaiveDate,
    ) -> DeskResult<CommitOutcome> {
        let columns = parse_headers(text)?.headers.len();
        for field in [CanonicalField::Name, CanonicalField::JoinDate] {
            if mapping.get(field).is_none() {
                return Err(DeskError::MissingRequiredMapping {
                    field: field.as_str().to_string(),
                });
            }
        }
        for field in CanonicalField::ALL {
            if let Some(index) = mapping.get(field) {
                if index >= columns {
                    return Err(DeskError::MappingOutOfRange {
                        field: field.as_str().to_string(),
                        index,
                        columns,
                    });
                }
            }
        }

        let parsed = parse_all_rows(text, mapping)?;
        let stats = reconcile_members(&self.store, gym_id, &parsed.members);
        let file_hash = crate::csv_parser::compute_file_hash(text);
        let error_count = parsed.errors.len();

        let persisted: Vec<&ValidationError> =
            parsed.errors.iter().take(self.config.import.persisted_errors).collect();
        self.store.insert_import_record(&ImportRecord {
            import_id: uuid::Uuid::new_v4().to_string(),
            gym_id: gym_id.to_string(),
            file_hash: file_hash.clone(),
            total_rows: parsed.total_rows,
            imported: stats.imported,
            updated: stats.updated,
            skipped: stats.skipped,
            error_count,
            errors_json: serde_json::to_string(&persisted)?,
            created_at: Utc::now(),
        })?;
        self.store.append_event(&DeskEvent::ImportCommitted {
            gym_id: gym_id.to_string(),
            file_hash,
            imported: stats.imported,
            updated: stats.updated,
            skipped: stats.skipped,
            error_count,
        })?;
        log::info!(
            "import for {gym_id}: {} rows, imported={} updated={} skipped={} errors={error_count}",
            parsed.total_rows,
            stats.imported,
            stats.updated,
            stats.skipped
        );

        let refresh = self.refresh_metrics(gym_id, as_of);
        let errors = parsed
            .errors
            .into_iter()
            .take(self.config.import.response_errors)
            .collect();
        Ok(CommitOutcome {
            summary: ImportSummary {
                imported: stats.imported,
                updated: stats.updated,
                skipped: stats.skipped,
                error_count,
                errors,
            },
            refresh,
        })
    }

    /// Rebuild all metrics for the gym without failing the caller.
    fn refresh_metrics(&self, gym_id: &str, as_of: NaiveDate) -> Option<JoinHandle<()>> {
        let second = match self.store.reopen() {
            Ok(Some(store)) => store,
            Ok(None) => {
                if let Err(e) = recompute_all_metrics(&self.store, &self.config, gym_id, as_of) {
                    log::error!("metrics refresh for {gym_id} failed: {e}");
                }
                return None;
            }
            Err(e) => {
                log::error!("metrics refresh for {gym_id} could not open a connection: {e}");
                return None;
            }
        };
        let config = self.config.clone();
        let gym = gym_id.to_string();
        Some(std::thread::spawn(move || {
            if let Err(e) = recompute_all_metrics(&second, &config, &gym, as_of) {
                log::error!("metrics refresh for {gym} failed: {e}");
            }
        }))
    }

    // ── Roster and contacts ───────────────────────────────────────

    pub fn members(&self, gym_id: &str) -> DeskResult<Vec<Member>> {
        self.store.members_for_gym(gym_id)
    }

    pub fn record_contact(
        &self,
        gym_id: &str,
        member_id: &str,
        contacted_at: DateTime<Utc>,
        note: Option<&str>,
    ) -> DeskResult<()> {
        match self.store.get_member(member_id)? {
            Some(m) if m.gym_id == gym_id => {}
            _ => {
                return Err(DeskError::NotFound {
                    what: "member",
                    id: member_id.to_string(),
                })
            }
        }
        self.store.insert_contact(&MemberContact {
            member_id: member_id.to_string(),
            gym_id: gym_id.to_string(),
            contacted_at,
            note: note.map(str::to_string),
        })?;
        self.store.append_event(&DeskEvent::ContactLogged {
            gym_id: gym_id.to_string(),
            member_id: member_id.to_string(),
        })?;
        log::debug!("contact logged for {member_id} in {gym_id}");
        Ok(())
    }

    // ── Metrics and report ────────────────────────────────────────

    pub fn compute_monthly_metrics(
        &self,
        gym_id: &str,
        month: NaiveDate,
    ) -> DeskResult<MonthlyMetrics> {
        compute_monthly_metrics(&self.store, &self.config, gym_id, month)
    }

    pub fn recompute_all_metrics(&self, gym_id: &str, today: NaiveDate) -> DeskResult<usize> {
        recompute_all_metrics(&self.store, &self.config, gym_id, today)
    }

    pub fn metrics_history(&self, gym_id: &str) -> DeskResult<Vec<MonthlyMetrics>> {
        self.store.metrics_history(gym_id)
    }

    pub fn monthly_report(
        &self,
        gym_id: &str,
        month: NaiveDate,
        as_of: NaiveDate,
    ) -> DeskResult<MonthlyReport> {
        monthly_report(&self.store, &self.config, gym_id, month, as_of)
    }

    // ── Predictions and brief ─────────────────────────────────────

    pub fn predict_members(
        &self,
        gym_id: &str,
        as_of: NaiveDate,
    ) -> DeskResult<Vec<MemberPrediction>> {
        let weights = learned_weights(&self.store, &self.config.learning, gym_id)?;
        Ok(predict_gym(&self.store, &self.config, gym_id, as_of, weights)?.1)
    }

    /// Full predictive view. The insight circuit state carries over to the
    /// next call.
    pub fn predictive_intelligence(
        &mut self,
        gym_id: &str,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> DeskResult<PredictiveIntelligence> {
        let view = predictive_intelligence(
            &self.store,
            &self.config,
            gym_id,
            as_of,
            now,
            self.circuit.clone(),
            self.insights.as_ref(),
        )?;
        self.circuit = view.brief.circuit.clone();
        Ok(view)
    }

    // ── Learning ──────────────────────────────────────────────────

    pub fn snapshot_recommendation(
        &self,
        gym_id: &str,
        recommendation: &BriefRecommendation,
        created_on: NaiveDate,
    ) -> DeskResult<RecommendationCard> {
        snapshot_card(&self.store, gym_id, recommendation, created_on)
    }

    pub fn set_checklist_item(
        &self,
        card_id: &str,
        item_index: i64,
        completed_at: Option<DateTime<Utc>>,
    ) -> DeskResult<()> {
        set_checklist_item(&self.store, card_id, item_index, completed_at)
    }

    pub fn execution_strength(&self, card_id: &str) -> DeskResult<f64> {
        if self.store.get_card(card_id)?.is_none() {
            return Err(DeskError::NotFound {
                what: "recommendation card",
                id: card_id.to_string(),
            });
        }
        Ok(execution_strength(&self.store.checklist_for_card(card_id)?))
    }

    pub fn run_learning_update(&self, as_of: NaiveDate) -> DeskResult<usize> {
        run_learning_update(&self.store, &self.config, as_of)
    }

    // ── Sync ──────────────────────────────────────────────────────

    /// Pull the roster from a fitness platform, then rebuild metrics.
    pub fn sync_gym(
        &self,
        gym_id: &str,
        platform: &dyn FitnessPlatform,
        api_key: &str,
        policy: &RetryPolicy,
        sleep: &mut dyn FnMut(Duration),
        today: NaiveDate,
    ) -> DeskResult<SyncSummary> {
        let summary = sync_gym(&self.store, platform, api_key, gym_id, policy, sleep)?;
        if let Err(e) = recompute_all_metrics(&self.store, &self.config, gym_id, today) {
            log::error!("metrics refresh after sync for {gym_id} failed: {e}");
        }
        Ok(summary)
    }

    // ── Audit ─────────────────────────────────────────────────────

    pub fn events(&self, gym_id: &str) -> DeskResult<Vec<EventLogEntry>> {
        self.store.events_for_gym(gym_id)
    }

    pub fn recent_imports(&self, gym_id: &str, limit: usize) -> DeskResult<Vec<ImportRecord>> {
        self.store.recent_imports(gym_id, limit)
    }
}
