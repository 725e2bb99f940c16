//! Predictive intelligence: everything the owner dashboard shows in one
//! call. Member predictions and their summary, cohort intelligence, the
//! six-month scenario, and a strategic brief re-ranked by what the
//! learning loop has observed.

use crate::{
    brief::{generate_brief, BriefInputs, StrategicBrief},
    cohort::{analyze_cohorts, CohortIntelligence},
    config::ScoringConfig,
    error::DeskResult,
    insights::{CircuitState, InsightSource},
    learning::learned_weights,
    risk_engine::{
        predict_gym, summarize_predictions, GymAggregate, MemberPrediction, PredictionSummary,
    },
    scenario::{project_scenarios, ScenarioProjection},
    store::DeskStore,
    types::{month_start, GymId},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveIntelligence {
    pub gym_id: GymId,
    pub as_of: NaiveDate,
    pub aggregate: GymAggregate,
    pub predictions: Vec<MemberPrediction>,
    pub summary: PredictionSummary,
    pub cohorts: CohortIntelligence,
    pub scenario: Option<ScenarioProjection>,
    pub brief: StrategicBrief,
}

pub fn predictive_intelligence(
    store: &DeskStore,
    config: &ScoringConfig,
    gym_id: &str,
    as_of: NaiveDate,
    now: DateTime<Utc>,
    circuit: CircuitState,
    insights: &dyn InsightSource,
) -> DeskResult<PredictiveIntelligence> {
    let weights = learned_weights(store, &config.learning, gym_id)?;
    let (aggregate, mut predictions) = predict_gym(store, config, gym_id, as_of, weights.clone())?;
    predictions.sort_by(|a, b| {
        b.revenue_at_risk
            .total_cmp(&a.revenue_at_risk)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
    let summary = summarize_predictions(&predictions, &config.risk);

    let roster = store.members_for_gym(gym_id)?;
    let cohorts = analyze_cohorts(&roster, as_of);

    let history = store.recent_metrics(gym_id, month_start(as_of), config.scenario.history_months)?;
    let scenario = project_scenarios(&history, &config.scenario);

    let brief = generate_brief(
        &BriefInputs {
            gym_id,
            as_of,
            history: &history,
            summary: &summary,
            cohorts: &cohorts,
            scenario: scenario.as_ref(),
            archetype: aggregate.archetype,
            learned_weights: &weights,
            circuit,
            now,
        },
        config,
        insights,
    );

    Ok(PredictiveIntelligence {
        gym_id: gym_id.to_string(),
        as_of,
        aggregate,
        predictions,
        summary,
        cohorts,
        scenario,
        brief,
    })
}
