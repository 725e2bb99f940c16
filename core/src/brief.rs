//! Strategic brief: gym-wide recommendations ranked for the owner.
//!
//! TEMPLATES holds every recommendation the brief can make. Each template
//! has a trigger, a pillar, the member-level intervention type it learns
//! under, a checklist, a confidence prior and an impact formula:
//!
//!   retention     = members × ARM × months × lift
//!   acquisition   = expected new members × ARM × 6
//!   ARM expansion = participating members × ARM increase × 6
//!
//! score = impact × confidence × urgency × learned weight
//!
//! Priority labels are relative to the cycle: a brief always has its own
//! critical tier, whatever the absolute dollar amounts are.

use crate::{
    cohort::CohortIntelligence,
    config::{BriefConfig, ScoringConfig, TemplateTriggers},
    insights::{CircuitState, InsightSource},
    interventions::InterventionType,
    metrics::MonthlyMetrics,
    risk_engine::{GymArchetype, PredictionSummary},
    scenario::ScenarioProjection,
    scope_rules::sentence_violates_scope,
    types::{nearest_rank, round2, GymId},
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Retention,
    Acquisition,
    CommunityDepth,
    CoachingQuality,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChurnTrend {
    Rising,
    Stable,
    Improving,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLabel {
    Low,
    Medium,
    High,
    Critical,
}

// ── Inputs ────────────────────────────────────────────────────────

pub struct BriefInputs<'a> {
    pub gym_id: &'a str,
    pub as_of: NaiveDate,
    /// Recent monthly metrics, oldest first. The last row is "now".
    pub history: &'a [MonthlyMetrics],
    pub summary: &'a PredictionSummary,
    pub cohorts: &'a CohortIntelligence,
    pub scenario: Option<&'a ScenarioProjection>,
    pub archetype: GymArchetype,
    pub learned_weights: &'a BTreeMap<InterventionType, f64>,
    pub circuit: CircuitState,
    pub now: DateTime<Utc>,
}

/// The numbers every trigger and impact formula reads.
#[derive(Debug, Clone, Default)]
struct TemplateContext {
    active: f64,
    arm: f64,
    churn_rate: f64,
    new_members: f64,
    cancels: f64,
    risk_members: f64,
    at_risk: f64,
    drifters: f64,
    /// Drifters still inside their first 90 days.
    new_drifters: f64,
    core: f64,
    early_loss_rate: f64,
}

fn retention(members: f64, arm: f64, months: f64, lift: f64) -> f64 {
    members * arm * months * lift
}

fn acquisition(expected_new: f64, arm: f64) -> f64 {
    expected_new * arm * 6.0
}

fn arm_expansion(participating: f64, increase: f64) -> f64 {
    participating * increase * 6.0
}

// ── Templates ─────────────────────────────────────────────────────

struct Template {
    id: &'static str,
    pillar: Pillar,
    kind: InterventionType,
    title: &'static str,
    rationale: &'static str,
    checklist: &'static [&'static str],
    confidence: f64,
    /// Community events get the Open-season boost.
    community_event: bool,
    trigger: fn(&TemplateContext, &TemplateTriggers) -> bool,
    impact: fn(&TemplateContext) -> f64,
}

const TEMPLATES: &[Template] = &[
    // Retention
    Template {
        id: "onboarding-sprint",
        pillar: Pillar::Retention,
        kind: InterventionType::OnboardingAcceleration,
        title: "Run a 30-day onboarding sprint for new members",
        rationale: "New members are drifting while the roster already shows early losses.",
        checklist: &[
            "List every drifting member who joined in the last 90 days",
            "Assign each one a coach",
            "Book a goal session in week one",
            "Call anyone who misses two scheduled classes",
        ],
        confidence: 0.78,
        community_event: false,
        trigger: |c, t| {
            c.new_drifters > 0.0 && (c.at_risk > 0.0 || c.early_loss_rate > t.early_loss_rate)
        },
        impact: |c| retention(c.risk_members.max(c.new_drifters), c.arm, 3.0, 0.25),
    },
    Template {
        id: "at-risk-outreach",
        pillar: Pillar::Retention,
        kind: InterventionType::PersonalOutreach,
        title: "Personally contact every at-risk member this week",
        rationale: "At-risk and ghost members respond to a personal call far better than to email.",
        checklist: &[
            "Pull the at-risk list",
            "Split calls between owner and coaches",
            "Log every contact with a note",
        ],
        confidence: 0.72,
        community_event: false,
        trigger: |c, _| c.at_risk > 0.0,
        impact: |c| retention(c.at_risk, c.arm, 6.0, 0.30),
    },
    Template {
        id: "win-back-campaign",
        pillar: Pillar::Retention,
        kind: InterventionType::WinBack,
        title: "Invite last month's cancellations back",
        rationale: "Recently cancelled members still know the coaches and the schedule.",
        checklist: &[
            "List members who cancelled in the last 60 days",
            "Send a personal invite to one specific class",
            "Follow up once by phone",
        ],
        confidence: 0.55,
        community_event: false,
        trigger: |c, _| c.cancels > 0.0,
        impact: |c| retention(c.cancels, c.arm, 6.0, 0.15),
    },
    Template {
        id: "churn-spike-review",
        pillar: Pillar::Retention,
        kind: InterventionType::GoalSetting,
        title: "Review why churn jumped this month",
        rationale: "Churn above 5% a month halves the average member lifetime.",
        checklist: &[
            "Read every cancellation reason",
            "Group reasons into schedule, price, results, life",
            "Pick one fix for the largest group",
        ],
        confidence: 0.62,
        community_event: false,
        trigger: |c, t| c.churn_rate > t.churn_spike_pct,
        impact: |c| retention(c.active, c.arm, 3.0, 0.02),
    },
    // Acquisition
    Template {
        id: "referral-program",
        pillar: Pillar::Acquisition,
        kind: InterventionType::CommunityIntegration,
        title: "Launch a member referral month",
        rationale: "A stable, happy roster is the cheapest source of new members.",
        checklist: &[
            "Pick a reward members actually want",
            "Announce it in every class for a week",
            "Track who referred whom",
        ],
        confidence: 0.66,
        community_event: false,
        trigger: |c, t| {
            c.churn_rate < t.referral_max_churn_pct && c.active >= t.referral_min_active
        },
        impact: |c| acquisition(c.active * 0.05, c.arm),
    },
    Template {
        id: "intro-offer-refresh",
        pillar: Pillar::Acquisition,
        kind: InterventionType::OnboardingAcceleration,
        title: "Refresh the intro offer",
        rationale: "New joins are under 5% of the roster, below a healthy replacement rate.",
        checklist: &[
            "Review the current intro offer and its conversion",
            "Set a start date for the next intro group",
            "Have a coach own intro follow-up",
        ],
        confidence: 0.60,
        community_event: false,
        trigger: |c, t| c.active > 0.0 && c.new_members < c.active * t.intro_min_join_share,
        impact: |c| acquisition((c.active * 0.03).max(1.0), c.arm),
    },
    Template {
        id: "bring-a-friend-week",
        pillar: Pillar::Acquisition,
        kind: InterventionType::CommunityIntegration,
        title: "Host a bring-a-friend week",
        rationale: "Joins are not keeping up with cancellations.",
        checklist: &[
            "Pick the week and the classes",
            "Give every member a guest pass",
            "Collect guest contact details at the door",
        ],
        confidence: 0.58,
        community_event: true,
        trigger: |c, _| c.active > 0.0 && c.new_members <= c.cancels,
        impact: |c| acquisition(c.cancels.max(1.0), c.arm),
    },
    // Community depth
    Template {
        id: "community-event-series",
        pillar: Pillar::CommunityDepth,
        kind: InterventionType::CommunityIntegration,
        title: "Start a monthly community event",
        rationale: "Drifting members re-engage when they know people in class.",
        checklist: &[
            "Pick a recurring date",
            "Invite drifting members by name",
            "Pair newer members with regulars",
        ],
        confidence: 0.70,
        community_event: true,
        trigger: |c, _| c.drifters > 0.0,
        impact: |c| retention(c.drifters, c.arm, 6.0, 0.15),
    },
    Template {
        id: "in-house-challenge",
        pillar: Pillar::CommunityDepth,
        kind: InterventionType::CommunityIntegration,
        title: "Run an in-house competition",
        rationale: "A shared event gives the whole roster a reason to train together.",
        checklist: &[
            "Pick workouts every level can complete",
            "Form mixed-ability teams",
            "Celebrate results on the whiteboard",
        ],
        confidence: 0.64,
        community_event: true,
        trigger: |c, t| c.active >= t.challenge_min_active,
        impact: |c| retention(c.active, c.arm, 3.0, 0.03),
    },
    Template {
        id: "milestone-recognition",
        pillar: Pillar::CommunityDepth,
        kind: InterventionType::MilestoneCelebration,
        title: "Recognize membership milestones",
        rationale: "Public recognition at 90 days, 6 months and each anniversary reinforces the habit.",
        checklist: &[
            "Add milestone dates to the front-desk view",
            "Post a weekly shout-out",
        ],
        confidence: 0.60,
        community_event: false,
        trigger: |c, _| c.core > 0.0,
        impact: |c| retention(c.core, c.arm, 6.0, 0.05),
    },
    // Coaching quality
    Template {
        id: "coach-check-in-cadence",
        pillar: Pillar::CoachingQuality,
        kind: InterventionType::CoachConnection,
        title: "Give every coach a weekly check-in list",
        rationale: "Members with one coach who knows them train more consistently.",
        checklist: &[
            "Split at-risk and drifting members across coaches",
            "Review the lists in the weekly staff meeting",
        ],
        confidence: 0.74,
        community_event: false,
        trigger: |c, _| c.at_risk + c.drifters > 0.0,
        impact: |c| retention(c.at_risk + c.drifters, c.arm, 6.0, 0.10),
    },
    Template {
        id: "goal-review-sessions",
        pillar: Pillar::CoachingQuality,
        kind: InterventionType::GoalSetting,
        title: "Offer quarterly goal reviews",
        rationale: "Goal reviews surface members ready for personal training.",
        checklist: &[
            "Block 15-minute review slots",
            "Invite drifting members first",
            "Offer a personal-training block where it fits",
        ],
        confidence: 0.65,
        community_event: false,
        trigger: |c, t| c.at_risk + c.drifters >= t.goal_review_min_flagged,
        impact: |c| arm_expansion(c.active * 0.10, 20.0),
    },
    Template {
        id: "premium-tier",
        pillar: Pillar::CoachingQuality,
        kind: InterventionType::PricingReview,
        title: "Add a premium coaching tier",
        rationale: "Average revenue per member is below boutique levels.",
        checklist: &[
            "Define what the premium tier includes",
            "Price it against local boutiques",
            "Offer it first to long-standing members",
        ],
        confidence: 0.56,
        community_event: false,
        trigger: |c, t| {
            c.arm > 0.0 && c.arm < t.premium_max_arm && c.active >= t.premium_min_active
        },
        impact: |c| arm_expansion(c.active * 0.15, 25.0),
    },
];

// ── Output ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BriefRecommendation {
    pub template_id: String,
    pub pillar: Pillar,
    pub intervention_type: InterventionType,
    pub title: String,
    pub rationale: String,
    pub checklist: Vec<String>,
    pub impact: f64,
    pub confidence: f64,
    pub urgency: f64,
    pub learned_weight: f64,
    pub score: f64,
    pub priority: PriorityLabel,
    pub supporting: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CohortAlert {
    pub cohort: String,
    pub total: usize,
    pub survival_rate: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoiProjection {
    pub at_risk_members: usize,
    pub success_rate: f64,
    pub members_saved: f64,
    pub monthly_revenue_saved: f64,
    pub annual_revenue_saved: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategicBrief {
    pub gym_id: GymId,
    pub as_of: NaiveDate,
    pub archetype: GymArchetype,
    pub churn_trend: ChurnTrend,
    pub recommendations: Vec<BriefRecommendation>,
    pub focus_recommendation: Option<BriefRecommendation>,
    pub cohort_alert: Option<CohortAlert>,
    pub revenue_outlook: String,
    pub roi_projection: RoiProjection,
    /// Circuit state after this cycle's retrieval; persist it for the next.
    pub circuit: CircuitState,
}

// ── Generation ────────────────────────────────────────────────────

pub fn churn_trend(history: &[MonthlyMetrics], cfg: &BriefConfig) -> ChurnTrend {
    let window = &history[history.len().saturating_sub(3)..];
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return ChurnTrend::Stable;
    };
    let change = last.churn_rate - first.churn_rate;
    if change > cfg.trend_threshold_pts {
        ChurnTrend::Rising
    } else if change < -cfg.trend_threshold_pts {
        ChurnTrend::Improving
    } else {
        ChurnTrend::Stable
    }
}

fn urgency_for(template: &Template, trend: ChurnTrend, month: u32, cfg: &BriefConfig) -> f64 {
    let mut urgency = 1.0;
    if matches!(template.pillar, Pillar::Retention | Pillar::CoachingQuality) {
        urgency *= match trend {
            ChurnTrend::Rising => cfg.rising_urgency,
            ChurnTrend::Improving => cfg.improving_urgency,
            ChurnTrend::Stable => 1.0,
        };
    }
    if template.community_event && matches!(month, 2 | 3) {
        urgency *= cfg.open_season_urgency;
    }
    if template.pillar == Pillar::Acquisition && month == 1 {
        urgency *= cfg.january_acquisition_urgency;
    }
    urgency
}

fn priority_label(score: f64, sorted_scores: &[f64]) -> PriorityLabel {
    let at = |pct| nearest_rank(sorted_scores, pct).unwrap_or(f64::INFINITY);
    if score >= at(0.75) {
        PriorityLabel::Critical
    } else if score >= at(0.50) {
        PriorityLabel::High
    } else if score >= at(0.25) {
        PriorityLabel::Medium
    } else {
        PriorityLabel::Low
    }
}

fn cohort_alert(cohorts: &CohortIntelligence, cfg: &BriefConfig) -> Option<CohortAlert> {
    cohorts
        .cohorts
        .iter()
        .rev()
        .take(3)
        .find(|c| {
            c.total >= cfg.cohort_alert_min_members && c.survival_rate < cfg.cohort_alert_survival
        })
        .map(|c| CohortAlert {
            cohort: c.cohort.clone(),
            total: c.total,
            survival_rate: c.survival_rate,
            message: format!(
                "Only {:.0}% of the {} members who joined in {} are still active.",
                c.survival_rate * 100.0,
                c.total,
                c.cohort
            ),
        })
}

fn revenue_outlook(scenario: Option<&ScenarioProjection>) -> String {
    let Some(s) = scenario else {
        return "Not enough monthly history for a revenue outlook yet.".to_string();
    };
    let delta = s.expected_mrr_delta;
    if delta > 0.0 {
        format!("On current trends MRR grows by ${delta:.0} over the next 6 months.")
    } else if delta < 0.0 {
        format!(
            "On current trends MRR shrinks by ${:.0} over the next 6 months.",
            delta.abs()
        )
    } else {
        "On current trends MRR holds flat over the next 6 months.".to_string()
    }
}

pub fn generate_brief(
    inputs: &BriefInputs<'_>,
    config: &ScoringConfig,
    insights: &dyn InsightSource,
) -> StrategicBrief {
    let cfg = &config.brief;
    let latest = inputs.history.last();
    let ctx = TemplateContext {
        active: latest.map(|m| m.active_members as f64).unwrap_or(0.0),
        arm: latest.map(|m| m.arm).unwrap_or(0.0),
        churn_rate: latest.map(|m| m.churn_rate).unwrap_or(0.0),
        new_members: latest.map(|m| m.new_members as f64).unwrap_or(0.0),
        cancels: latest.map(|m| m.cancels as f64).unwrap_or(0.0),
        risk_members: latest.map(|m| m.risk_members as f64).unwrap_or(0.0),
        at_risk: (inputs.summary.at_risk + inputs.summary.ghost) as f64,
        drifters: inputs.summary.drifter as f64,
        new_drifters: inputs.summary.new_drifters as f64,
        core: inputs.summary.core as f64,
        early_loss_rate: inputs.cohorts.early_loss_rate_30d,
    };
    let trend = churn_trend(inputs.history, cfg);
    let month = inputs.as_of.month();

    let mut circuit = inputs.circuit.clone();
    let mut recommendations: Vec<BriefRecommendation> = Vec::new();

    for template in TEMPLATES.iter().filter(|t| (t.trigger)(&ctx, &cfg.triggers)) {
        let impact = (template.impact)(&ctx);
        let confidence = cfg
            .template_confidence
            .get(template.id)
            .copied()
            .unwrap_or(template.confidence);
        let urgency = urgency_for(template, trend, month, cfg);
        let learned_weight = inputs
            .learned_weights
            .get(&template.kind)
            .copied()
            .unwrap_or(1.0);
        let score = impact * confidence * urgency * learned_weight;

        let supporting = if circuit.allows_retrieval(inputs.now, cfg.circuit_cooldown_secs) {
            match insights.retrieve(template.pillar, template.id) {
                Ok(sentences) => {
                    circuit = CircuitState::closed();
                    sentences
                        .into_iter()
                        .filter(|s| !sentence_violates_scope(template.pillar, s))
                        .collect()
                }
                Err(e) => {
                    log::warn!(
                        "insight retrieval failed for {}: {e}; opening circuit",
                        template.id
                    );
                    circuit = CircuitState::tripped(inputs.now);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        recommendations.push(BriefRecommendation {
            template_id: template.id.to_string(),
            pillar: template.pillar,
            intervention_type: template.kind,
            title: template.title.to_string(),
            rationale: template.rationale.to_string(),
            checklist: template.checklist.iter().map(|s| s.to_string()).collect(),
            impact: round2(impact),
            confidence,
            urgency,
            learned_weight,
            score: round2(score),
            priority: PriorityLabel::Low,
            supporting,
        });
    }

    recommendations.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.template_id.cmp(&b.template_id))
    });
    let mut sorted_scores: Vec<f64> = recommendations.iter().map(|r| r.score).collect();
    sorted_scores.sort_by(|a, b| a.total_cmp(b));
    for rec in &mut recommendations {
        rec.priority = priority_label(rec.score, &sorted_scores);
    }

    let at_risk_members = inputs.summary.at_risk;
    let members_saved = at_risk_members as f64 * cfg.roi_success_rate;
    let monthly_saved = members_saved * ctx.arm;

    log::info!(
        "brief for {}: {} recommendations, trend {:?}",
        inputs.gym_id,
        recommendations.len(),
        trend
    );

    StrategicBrief {
        gym_id: inputs.gym_id.to_string(),
        as_of: inputs.as_of,
        archetype: inputs.archetype,
        churn_trend: trend,
        focus_recommendation: recommendations.first().cloned(),
        recommendations,
        cohort_alert: cohort_alert(inputs.cohorts, cfg),
        revenue_outlook: revenue_outlook(inputs.scenario),
        roi_projection: RoiProjection {
            at_risk_members,
            success_rate: cfg.roi_success_rate,
            members_saved: round2(members_saved),
            monthly_revenue_saved: round2(monthly_saved),
            annual_revenue_saved: round2(monthly_saved * 12.0),
        },
        circuit,
    }
}
