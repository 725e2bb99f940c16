//! Intervention selection and prioritization for a single member.
//!
//! Selection walks SELECTION_RULES top to bottom and takes the first
//! predicate that holds; the last row always matches. Prioritization then
//! scores all eight intervention types so staff see ranked alternatives,
//! each with a counterfactual of what the member looks like afterwards.

use crate::{
    config::{ProbabilityBands, ScoringConfig, SelectionConfig},
    risk_engine::{revenue_at_risk, EngagementClass, GymAggregate},
    types::round2,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum InterventionType {
    OnboardingAcceleration,
    PersonalOutreach,
    WinBack,
    CoachConnection,
    GoalSetting,
    CommunityIntegration,
    MilestoneCelebration,
    PricingReview,
}

impl InterventionType {
    pub const ALL: [InterventionType; 8] = [
        Self::OnboardingAcceleration,
        Self::PersonalOutreach,
        Self::WinBack,
        Self::CoachConnection,
        Self::GoalSetting,
        Self::CommunityIntegration,
        Self::MilestoneCelebration,
        Self::PricingReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnboardingAcceleration => "onboarding-acceleration",
            Self::PersonalOutreach => "personal-outreach",
            Self::WinBack => "win-back",
            Self::CoachConnection => "coach-connection",
            Self::GoalSetting => "goal-setting",
            Self::CommunityIntegration => "community-integration",
            Self::MilestoneCelebration => "milestone-celebration",
            Self::PricingReview => "pricing-review",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Interventions delivered as direct staff contact.
    pub fn is_outreach(&self) -> bool {
        matches!(
            self,
            Self::PersonalOutreach | Self::WinBack | Self::CoachConnection
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    Immediate,
    ThisWeek,
    ThisMonth,
    Monitor,
}

impl Urgency {
    /// Default urgency for a probability when no rule assigned one.
    pub fn for_probability(p: f64, bands: &ProbabilityBands) -> Self {
        if p > bands.immediate {
            Self::Immediate
        } else if p > bands.this_week {
            Self::ThisWeek
        } else if p > bands.this_month {
            Self::ThisMonth
        } else {
            Self::Monitor
        }
    }

    pub fn multiplier(&self, config: &ScoringConfig) -> f64 {
        let u = &config.interventions.urgency;
        match self {
            Self::Immediate => u.immediate,
            Self::ThisWeek => u.this_week,
            Self::ThisMonth => u.this_month,
            Self::Monitor => u.monitor,
        }
    }
}

// ── Selection ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionContext {
    pub probability: f64,
    pub tenure_days: i64,
    /// Never contacted, or last contact beyond the stale window.
    pub stale_contact: bool,
    pub high_value: bool,
    pub below_average_rate: bool,
    pub near_milestone: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectedIntervention {
    pub kind: InterventionType,
    pub urgency: Urgency,
    pub detail: String,
    pub guidance: String,
}

struct SelectionRule {
    when: fn(&SelectionContext, &SelectionConfig) -> bool,
    kind: InterventionType,
    urgency: Urgency,
    detail: &'static str,
    guidance: &'static str,
}

const SELECTION_RULES: &[SelectionRule] = &[
    SelectionRule {
        when: |c, t| c.probability > t.bands.immediate && c.tenure_days <= t.new_member_days,
        kind: InterventionType::OnboardingAcceleration,
        urgency: Urgency::Immediate,
        detail: "New member showing early drop-off signals. Book a coach-led session this week.",
        guidance: "Call, don't email. Ask what they hoped to get from joining and book the next class with them on the phone.",
    },
    SelectionRule {
        when: |c, t| c.probability > t.bands.immediate && c.high_value,
        kind: InterventionType::PersonalOutreach,
        urgency: Urgency::Immediate,
        detail: "High-value member at serious risk. Owner or head coach should reach out personally.",
        guidance: "Lead with appreciation, then ask one open question about how training is going.",
    },
    SelectionRule {
        when: |c, t| c.probability > t.bands.immediate,
        kind: InterventionType::WinBack,
        urgency: Urgency::Immediate,
        detail: "Member is likely already disengaged. Make a direct, low-pressure offer to come back in.",
        guidance: "Offer a specific class and time. Keep it short and make saying yes easy.",
    },
    SelectionRule {
        when: |c, t| c.probability > t.bands.this_week && c.tenure_days <= t.onboarding_days,
        kind: InterventionType::CoachConnection,
        urgency: Urgency::ThisWeek,
        detail: "Still inside the first 90 days. Pair them with one coach who checks in weekly.",
        guidance: "Have the coach learn their name, goal and usual class time before the next visit.",
    },
    SelectionRule {
        when: |c, t| c.probability > t.bands.this_week && c.stale_contact,
        kind: InterventionType::PersonalOutreach,
        urgency: Urgency::ThisWeek,
        detail: "No recent staff contact. A quick personal check-in resets the relationship.",
        guidance: "A two-line text from a coach they know beats a newsletter.",
    },
    SelectionRule {
        when: |c, t| c.probability > t.bands.this_week,
        kind: InterventionType::GoalSetting,
        urgency: Urgency::ThisWeek,
        detail: "Engagement is drifting. Re-anchor them on a concrete goal and a date.",
        guidance: "Book a 15-minute goal review and write the target somewhere they will see it.",
    },
    SelectionRule {
        when: |c, t| c.probability > t.bands.this_month && c.tenure_days <= t.integration_days,
        kind: InterventionType::CommunityIntegration,
        urgency: Urgency::ThisMonth,
        detail: "Not yet woven into the community. Introduce them to regulars in their class time.",
        guidance: "Invite them to the next social or partner workout by name.",
    },
    SelectionRule {
        when: |c, t| c.probability > t.bands.this_month,
        kind: InterventionType::GoalSetting,
        urgency: Urgency::ThisMonth,
        detail: "Mild risk. A fresh goal keeps training purposeful.",
        guidance: "Suggest a benchmark retest or an upcoming in-house challenge.",
    },
    SelectionRule {
        when: |c, _| c.near_milestone,
        kind: InterventionType::MilestoneCelebration,
        urgency: Urgency::Monitor,
        detail: "Approaching a membership milestone. Recognize it publicly.",
        guidance: "Shout-out on the whiteboard or socials on the anniversary week.",
    },
    SelectionRule {
        when: |c, _| c.below_average_rate,
        kind: InterventionType::PricingReview,
        urgency: Urgency::Monitor,
        detail: "Paying well below the gym average. Review their plan at the next natural touchpoint.",
        guidance: "Frame it as finding the right plan, not a price increase.",
    },
    SelectionRule {
        when: |_, _| true,
        kind: InterventionType::CommunityIntegration,
        urgency: Urgency::Monitor,
        detail: "Healthy member. Keep them connected.",
        guidance: "Ask them to bring a friend to the next community event.",
    },
];

pub fn select_intervention(ctx: &SelectionContext, cfg: &SelectionConfig) -> SelectedIntervention {
    let rule = SELECTION_RULES
        .iter()
        .find(|r| (r.when)(ctx, cfg))
        .unwrap_or(&SELECTION_RULES[SELECTION_RULES.len() - 1]);
    SelectedIntervention {
        kind: rule.kind,
        urgency: rule.urgency,
        detail: rule.detail.to_string(),
        guidance: rule.guidance.to_string(),
    }
}

// ── Note classification ───────────────────────────────────────────

/// Keyword → type. Checked in order; the first keyword found wins.
const NOTE_KEYWORDS: &[(&str, InterventionType)] = &[
    ("onboard", InterventionType::OnboardingAcceleration),
    ("orientation", InterventionType::OnboardingAcceleration),
    ("intro session", InterventionType::OnboardingAcceleration),
    ("win back", InterventionType::WinBack),
    ("win-back", InterventionType::WinBack),
    ("come back", InterventionType::WinBack),
    ("return offer", InterventionType::WinBack),
    ("milestone", InterventionType::MilestoneCelebration),
    ("anniversary", InterventionType::MilestoneCelebration),
    ("celebrat", InterventionType::MilestoneCelebration),
    ("shout-out", InterventionType::MilestoneCelebration),
    ("coach", InterventionType::CoachConnection),
    ("trainer", InterventionType::CoachConnection),
    ("goal", InterventionType::GoalSetting),
    ("progress", InterventionType::GoalSetting),
    ("assessment", InterventionType::GoalSetting),
    ("community", InterventionType::CommunityIntegration),
    ("social", InterventionType::CommunityIntegration),
    ("buddy", InterventionType::CommunityIntegration),
    ("event", InterventionType::CommunityIntegration),
    ("pricing", InterventionType::PricingReview),
    ("price", InterventionType::PricingReview),
    ("discount", InterventionType::PricingReview),
    ("plan change", InterventionType::PricingReview),
    ("call", InterventionType::PersonalOutreach),
    ("text", InterventionType::PersonalOutreach),
    ("email", InterventionType::PersonalOutreach),
    ("check-in", InterventionType::PersonalOutreach),
    ("check in", InterventionType::PersonalOutreach),
    ("reached out", InterventionType::PersonalOutreach),
];

pub fn classify_note(note: &str) -> Option<InterventionType> {
    let lower = note.to_lowercase();
    NOTE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, kind)| *kind)
}

// ── Prioritization ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Counterfactual {
    pub projected_probability: f64,
    pub projected_revenue_at_risk: f64,
    pub revenue_protected: f64,
    pub projected_class: EngagementClass,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrioritizedIntervention {
    pub kind: InterventionType,
    pub urgency: Urgency,
    pub expected_churn_delta: f64,
    pub expected_revenue_delta: f64,
    pub confidence: f64,
    pub score: f64,
    pub counterfactual: Counterfactual,
}

pub struct PriorityInputs<'a> {
    pub probability: f64,
    pub monthly_rate: f64,
    pub tenure_days: i64,
    pub high_value: bool,
    pub stale_contact: bool,
    /// Types already tried within the repeat window, from contact notes.
    pub recent_types: &'a [InterventionType],
    pub selected: &'a SelectedIntervention,
    pub aggregate: &'a GymAggregate,
}

/// Score every intervention type and keep the top N, best first.
pub fn prioritize(
    inputs: &PriorityInputs<'_>,
    config: &ScoringConfig,
) -> Vec<PrioritizedIntervention> {
    let cfg = &config.interventions;
    let risk = &config.risk;
    let p = inputs.probability;
    let current_rar = revenue_at_risk(p, inputs.monthly_rate, risk);
    let max_delta = (p - risk.min_probability).max(0.0);

    let mut scored: Vec<PrioritizedIntervention> = InterventionType::ALL
        .into_iter()
        .map(|kind| {
            let delta = (config.base_churn_delta(kind)
                * config.archetype_multiplier(inputs.aggregate.archetype, kind)
                * inputs.aggregate.learned_weight(kind))
            .min(max_delta);
            let revenue_delta = delta * inputs.monthly_rate * cfg.revenue_horizon_months;

            let mut confidence = config.confidence_prior(kind);
            if inputs.recent_types.contains(&kind) {
                confidence *= cfg.repeat_penalty;
            }
            if inputs.stale_contact && kind.is_outreach() {
                confidence *= cfg.stale_boost;
            }
            let confidence = confidence.min(cfg.confidence_cap);

            let urgency = if kind == inputs.selected.kind {
                inputs.selected.urgency
            } else {
                Urgency::for_probability(p, &cfg.selection.bands)
            };
            let value_weight = if inputs.high_value {
                cfg.high_value_weight
            } else {
                1.0
            };
            let score = revenue_delta * confidence * urgency.multiplier(config) * value_weight;

            let projected = (p - delta).max(risk.min_probability);
            let projected_rar = revenue_at_risk(projected, inputs.monthly_rate, risk);
            PrioritizedIntervention {
                kind,
                urgency,
                expected_churn_delta: round4(delta),
                expected_revenue_delta: round2(revenue_delta),
                confidence: round4(confidence),
                score: round2(score),
                counterfactual: Counterfactual {
                    projected_probability: round4(projected),
                    projected_revenue_at_risk: round2(projected_rar),
                    revenue_protected: round2((current_rar - projected_rar).max(0.0)),
                    projected_class: EngagementClass::classify(projected, inputs.tenure_days, risk),
                },
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.kind.cmp(&b.kind)));
    scored.truncate(cfg.top_n);
    scored
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
