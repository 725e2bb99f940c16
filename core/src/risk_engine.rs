//! Member risk engine: per-member churn probability with causal factors.
//!
//! Probability starts at the configured base and accumulates signed
//! adjustments from CAUSAL_RULES, evaluated in order. Every adjustment is
//! reported as a `CausalFactor`, so a prediction always explains itself.
//!
//! RULES:
//!   - `predict_member` is a pure function of its arguments. It reads no
//!     clock and no store; `as_of` is the only notion of "today".
//!   - Probability is clamped to [min, max] after all rules run.
//!   - Factors are reported largest-risk first.

use crate::{
    config::{ArchetypeConfig, RiskModelConfig, ScoringConfig},
    error::DeskResult,
    interventions::{
        classify_note, prioritize, select_intervention, InterventionType, PrioritizedIntervention,
        PriorityInputs, SelectedIntervention, SelectionContext,
    },
    member::{Member, MemberContact},
    metrics::MonthlyMetrics,
    store::DeskStore,
    types::{days_between, month_start, nearest_rank, round2, GymId, MemberId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ── Gym context ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum GymArchetype {
    GrowthAccelerator,
    CommunityAnchor,
    PremiumBoutique,
    TurnaroundLab,
}

impl GymArchetype {
    /// First match wins: high churn, then premium pricing, then low churn.
    pub fn classify(churn_rate: f64, arm: f64, cfg: &ArchetypeConfig) -> Self {
        if churn_rate > cfg.turnaround_churn_pct {
            Self::TurnaroundLab
        } else if arm >= cfg.boutique_arm {
            Self::PremiumBoutique
        } else if churn_rate < cfg.anchor_churn_pct {
            Self::CommunityAnchor
        } else {
            Self::GrowthAccelerator
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GrowthAccelerator => "growth-accelerator",
            Self::CommunityAnchor => "community-anchor",
            Self::PremiumBoutique => "premium-boutique",
            Self::TurnaroundLab => "turnaround-lab",
        }
    }
}

/// Gym-wide context every member prediction reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GymAggregate {
    pub gym_id: GymId,
    pub churn_rate: f64,
    pub arm: f64,
    /// Rate at the high-value percentile of active members.
    pub high_value_rate: f64,
    /// Share of past cancels that happened within the early-cancel window.
    pub early_cancel_share: f64,
    pub median_cancel_tenure: Option<f64>,
    pub archetype: GymArchetype,
    /// Learned multipliers per intervention type; missing means 1.0.
    pub learned_weights: BTreeMap<InterventionType, f64>,
}

impl GymAggregate {
    /// Build from the full roster. `latest` supplies churn and ARM when a
    /// metrics row exists; otherwise ARM comes from active members.
    pub fn from_roster(
        gym_id: &str,
        roster: &[Member],
        latest: Option<&MonthlyMetrics>,
        config: &RiskModelConfig,
        as_of: NaiveDate,
    ) -> Self {
        let active: Vec<&Member> = roster.iter().filter(|m| m.is_active_on(as_of)).collect();
        let churn_rate = latest.map(|m| m.churn_rate).unwrap_or(0.0);
        let arm = match latest {
            Some(m) if m.active_members > 0 => m.arm,
            _ if !active.is_empty() => {
                active.iter().map(|m| m.monthly_rate).sum::<f64>() / active.len() as f64
            }
            _ => 0.0,
        };

        let mut rates: Vec<f64> = active.iter().map(|m| m.monthly_rate).collect();
        rates.sort_by(|a, b| a.total_cmp(b));
        let high_value_rate = nearest_rank(&rates, config.high_value_percentile).unwrap_or(0.0);

        let mut lifetimes: Vec<i64> = roster
            .iter()
            .filter(|m| m.cancel_date.is_some_and(|c| c <= as_of))
            .filter_map(Member::lifetime_days)
            .collect();
        lifetimes.sort_unstable();
        let early_cancel_share = if lifetimes.is_empty() {
            0.0
        } else {
            lifetimes
                .iter()
                .filter(|d| **d < config.early_cancel_days)
                .count() as f64
                / lifetimes.len() as f64
        };

        Self {
            gym_id: gym_id.to_string(),
            churn_rate,
            arm,
            high_value_rate,
            early_cancel_share,
            median_cancel_tenure: median(&lifetimes),
            archetype: GymArchetype::classify(churn_rate, arm, &config.archetype),
            learned_weights: BTreeMap::new(),
        }
    }

    pub fn learned_weight(&self, kind: InterventionType) -> f64 {
        self.learned_weights.get(&kind).copied().unwrap_or(1.0)
    }
}

fn median(sorted: &[i64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2] as f64),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0),
    }
}

// ── Prediction types ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EngagementClass {
    Core,
    Drifter,
    AtRisk,
    Ghost,
}

impl EngagementClass {
    pub fn classify(probability: f64, tenure_days: i64, cfg: &RiskModelConfig) -> Self {
        if probability <= cfg.core_max_probability && tenure_days > cfg.core_min_tenure {
            Self::Core
        } else if probability <= cfg.drifter_max_probability {
            Self::Drifter
        } else if probability <= cfg.at_risk_max_probability {
            Self::AtRisk
        } else {
            Self::Ghost
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CausalFactor {
    pub factor: String,
    /// Signed probability adjustment.
    pub impact: f64,
    pub confidence: f64,
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPrediction {
    pub member_id: MemberId,
    pub name: String,
    pub email: Option<String>,
    pub monthly_rate: f64,
    pub tenure_days: i64,
    pub days_since_contact: Option<i64>,
    pub churn_probability: f64,
    pub engagement_class: EngagementClass,
    pub factors: Vec<CausalFactor>,
    pub primary_driver: String,
    pub intervention: SelectedIntervention,
    pub candidates: Vec<PrioritizedIntervention>,
    pub expected_months_remaining: f64,
    pub expected_ltv: f64,
    pub revenue_at_risk: f64,
    pub urgency_decay: f64,
}

/// Expected remaining months for a churn probability.
pub fn expected_months(probability: f64, cfg: &RiskModelConfig) -> f64 {
    (1.0 / probability.clamp(cfg.min_probability, 0.5)).min(cfg.max_expected_months)
}

pub fn revenue_at_risk(probability: f64, monthly_rate: f64, cfg: &RiskModelConfig) -> f64 {
    let months = expected_months(probability, cfg);
    monthly_rate * (months * probability).min(cfg.revenue_at_risk_months)
}

// ── Causal rules ──────────────────────────────────────────────────

/// Everything a rule may look at.
pub struct RuleContext<'a> {
    pub member: &'a Member,
    pub tenure_days: i64,
    pub days_since_contact: Option<i64>,
    pub aggregate: &'a GymAggregate,
    pub config: &'a RiskModelConfig,
}

type CausalRule = fn(&RuleContext<'_>) -> Option<CausalFactor>;

/// Evaluated top to bottom. Append new rules at the end.
const CAUSAL_RULES: &[CausalRule] = &[
    tenure_rule,
    contact_recency_rule,
    gym_trend_rule,
    below_average_rate_rule,
    cancellation_window_rule,
    high_value_rule,
    loyalty_rule,
    archetype_rule,
];

fn factor(name: &str, impact: f64, confidence: f64, evidence: String) -> Option<CausalFactor> {
    Some(CausalFactor {
        factor: name.to_string(),
        impact,
        confidence,
        evidence,
    })
}

fn tenure_rule(ctx: &RuleContext<'_>) -> Option<CausalFactor> {
    let band = ctx
        .config
        .tenure_bands
        .iter()
        .find(|b| ctx.tenure_days <= b.max_days)?;
    factor(
        "early-tenure",
        band.impact,
        0.8,
        format!("{} days since joining (band ≤{} days)", ctx.tenure_days, band.max_days),
    )
}

fn contact_recency_rule(ctx: &RuleContext<'_>) -> Option<CausalFactor> {
    let c = &ctx.config.contact;
    let tenure = ctx.tenure_days;
    match ctx.days_since_contact {
        None if tenure <= c.never_new_days => factor(
            "no-contact",
            c.never_new_impact,
            0.75,
            format!("never contacted in first {tenure} days"),
        ),
        None if tenure <= c.never_mid_days => factor(
            "no-contact",
            c.never_mid_impact,
            0.6,
            format!("never contacted in {tenure} days of membership"),
        ),
        None => None,
        Some(gap) if gap > c.onboarding_gap_days && tenure <= c.onboarding_window_days => factor(
            "contact-gap",
            c.onboarding_gap_impact,
            0.7,
            format!("last contact {gap} days ago during onboarding"),
        ),
        Some(gap) if gap > c.stale_gap_days => factor(
            "contact-gap",
            c.stale_gap_impact,
            0.6,
            format!("last contact {gap} days ago"),
        ),
        Some(gap) if gap <= c.recent_gap_days => factor(
            "recent-contact",
            c.recent_impact,
            0.65,
            format!("contacted {gap} days ago"),
        ),
        Some(_) => None,
    }
}

fn gym_trend_rule(ctx: &RuleContext<'_>) -> Option<CausalFactor> {
    let churn = ctx.aggregate.churn_rate;
    let impact = if churn > ctx.config.gym_churn_high_pct {
        ctx.config.gym_churn_high_impact
    } else if churn > ctx.config.gym_churn_elevated_pct {
        ctx.config.gym_churn_elevated_impact
    } else {
        return None;
    };
    factor("gym-churn-trend", impact, 0.5, format!("gym churn at {churn:.2}%"))
}

fn below_average_rate_rule(ctx: &RuleContext<'_>) -> Option<CausalFactor> {
    let arm = ctx.aggregate.arm;
    let rate = ctx.member.monthly_rate;
    if arm <= 0.0 || rate >= ctx.config.below_average_ratio * arm {
        return None;
    }
    factor(
        "below-average-rate",
        ctx.config.below_average_impact,
        0.45,
        format!("pays ${rate:.2} against gym average ${arm:.2}"),
    )
}

fn cancellation_window_rule(ctx: &RuleContext<'_>) -> Option<CausalFactor> {
    let median = ctx.aggregate.median_cancel_tenure?;
    if ctx.aggregate.early_cancel_share <= ctx.config.early_cancel_share
        || ctx.tenure_days as f64 > ctx.config.cancel_window_multiplier * median
    {
        return None;
    }
    factor(
        "historical-cancel-window",
        ctx.config.cancel_window_impact,
        0.55,
        format!(
            "{:.0}% of past cancels left before day {}; median cancel tenure {median:.0} days",
            ctx.aggregate.early_cancel_share * 100.0,
            ctx.config.early_cancel_days
        ),
    )
}

fn high_value_rule(ctx: &RuleContext<'_>) -> Option<CausalFactor> {
    if !is_high_value(ctx.member, ctx.aggregate)
        || ctx.tenure_days <= ctx.config.high_value_min_tenure
    {
        return None;
    }
    factor(
        "high-value-established",
        ctx.config.high_value_impact,
        0.6,
        format!("top-tier rate ${:.2}, {} days tenure", ctx.member.monthly_rate, ctx.tenure_days),
    )
}

fn loyalty_rule(ctx: &RuleContext<'_>) -> Option<CausalFactor> {
    if ctx.tenure_days <= ctx.config.loyalty_days {
        return None;
    }
    factor(
        "long-loyalty",
        ctx.config.loyalty_impact,
        0.75,
        format!("member for {} days", ctx.tenure_days),
    )
}

fn archetype_rule(ctx: &RuleContext<'_>) -> Option<CausalFactor> {
    let a = &ctx.config.archetype;
    let tenure = ctx.tenure_days;
    let (impact, evidence) = match ctx.aggregate.archetype {
        GymArchetype::TurnaroundLab if tenure <= a.turnaround_new_days => {
            (a.turnaround_new_impact, "new member in a high-churn gym")
        }
        GymArchetype::TurnaroundLab => (a.turnaround_other_impact, "high-churn gym"),
        GymArchetype::PremiumBoutique => match ctx.days_since_contact {
            Some(gap) if gap <= a.boutique_contact_gap_days => {
                (a.boutique_contacted_impact, "premium gym with recent personal contact")
            }
            _ => (a.boutique_uncontacted_impact, "premium gym without recent personal contact"),
        },
        GymArchetype::CommunityAnchor if tenure > a.anchor_established_days => {
            (a.anchor_established_impact, "established member of a stable community")
        }
        GymArchetype::CommunityAnchor => (a.anchor_other_impact, "still joining a tight community"),
        GymArchetype::GrowthAccelerator if tenure <= a.growth_new_days => {
            (a.growth_new_impact, "new member in a fast-growing gym")
        }
        GymArchetype::GrowthAccelerator => (a.growth_other_impact, "growth-stage gym"),
    };
    factor(
        "gym-archetype",
        impact,
        0.5,
        format!("{} ({evidence})", ctx.aggregate.archetype.as_str()),
    )
}

pub fn is_high_value(member: &Member, aggregate: &GymAggregate) -> bool {
    aggregate.high_value_rate > 0.0 && member.monthly_rate >= aggregate.high_value_rate
}

/// 0.6 × onboarding decay + 0.4 × contact staleness, each in [0, 1].
pub fn urgency_decay(
    tenure_days: i64,
    days_since_contact: Option<i64>,
    cfg: &RiskModelConfig,
) -> f64 {
    let tenure = tenure_days as f64;
    let onboarding = if tenure < cfg.onboarding_decay_days {
        1.0 - tenure / cfg.onboarding_decay_days
    } else {
        0.0
    };
    let staleness = match days_since_contact {
        None => 1.0,
        Some(gap) => (gap as f64 / cfg.contact_decay_days).min(1.0),
    };
    0.6 * onboarding + 0.4 * staleness
}

fn near_milestone(tenure_days: i64, window: i64, marks: &[i64]) -> bool {
    let near = |mark: i64| (tenure_days - mark).abs() <= window;
    if marks.iter().any(|m| near(*m)) {
        return true;
    }
    // Every anniversary after the first year.
    let year = (tenure_days + window) / 365;
    year >= 2 && near(year * 365)
}

// ── Prediction ────────────────────────────────────────────────────

pub fn predict_member(
    member: &Member,
    contacts: &[MemberContact],
    aggregate: &GymAggregate,
    config: &ScoringConfig,
    as_of: NaiveDate,
) -> MemberPrediction {
    let risk = &config.risk;
    let tenure_days = member.tenure_days(as_of);
    let days_since_contact = contacts
        .iter()
        .map(|c| c.contacted_at.date_naive())
        .filter(|d| *d <= as_of)
        .max()
        .map(|d| days_between(d, as_of));

    let ctx = RuleContext {
        member,
        tenure_days,
        days_since_contact,
        aggregate,
        config: risk,
    };
    let mut factors: Vec<CausalFactor> =
        CAUSAL_RULES.iter().filter_map(|rule| rule(&ctx)).collect();

    let decay = urgency_decay(tenure_days, days_since_contact, risk);
    if decay >= risk.urgency_threshold {
        factors.push(CausalFactor {
            factor: "urgency-decay".into(),
            impact: risk.urgency_max_impact * decay,
            confidence: 0.6,
            evidence: format!("onboarding and outreach decay at {:.0}%", decay * 100.0),
        });
    }

    let raw: f64 = risk.base_probability + factors.iter().map(|f| f.impact).sum::<f64>();
    let probability = raw.clamp(risk.min_probability, risk.max_probability);

    factors.sort_by(|a, b| b.impact.total_cmp(&a.impact));
    let primary_driver = factors
        .iter()
        .find(|f| f.impact > 0.0)
        .map(|f| f.factor.clone())
        .unwrap_or_else(|| "stable".to_string());

    let engagement_class = EngagementClass::classify(probability, tenure_days, risk);
    let months = expected_months(probability, risk);
    let rar = revenue_at_risk(probability, member.monthly_rate, risk);

    let high_value = is_high_value(member, aggregate);
    let stale_contact = days_since_contact
        .map_or(true, |gap| gap > config.interventions.stale_contact_days);
    let below_average_rate =
        aggregate.arm > 0.0 && member.monthly_rate < risk.below_average_ratio * aggregate.arm;

    let intervention = select_intervention(
        &SelectionContext {
            probability,
            tenure_days,
            stale_contact,
            high_value,
            below_average_rate,
            near_milestone: near_milestone(
                tenure_days,
                config.interventions.milestone_window_days,
                &risk.milestone_days,
            ),
        },
        &config.interventions.selection,
    );

    let repeat_cutoff = config.interventions.repeat_window_days;
    let recent_types: Vec<InterventionType> = contacts
        .iter()
        .filter(|c| {
            let day = c.contacted_at.date_naive();
            day <= as_of && days_between(day, as_of) <= repeat_cutoff
        })
        .filter_map(|c| c.note.as_deref().and_then(classify_note))
        .collect();

    let candidates = prioritize(
        &PriorityInputs {
            probability,
            monthly_rate: member.monthly_rate,
            tenure_days,
            high_value,
            stale_contact,
            recent_types: &recent_types,
            selected: &intervention,
            aggregate,
        },
        config,
    );

    MemberPrediction {
        member_id: member.member_id.clone(),
        name: member.name.clone(),
        email: member.email.clone(),
        monthly_rate: member.monthly_rate,
        tenure_days,
        days_since_contact,
        churn_probability: probability,
        engagement_class,
        factors,
        primary_driver,
        intervention,
        candidates,
        expected_months_remaining: round2(months),
        expected_ltv: round2(member.monthly_rate * months),
        revenue_at_risk: round2(rar),
        urgency_decay: decay,
    }
}

// ── Gym-wide ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub total_members: usize,
    pub core: usize,
    pub drifter: usize,
    pub at_risk: usize,
    pub ghost: usize,
    /// Drifters still inside their first months.
    pub new_drifters: usize,
    pub total_revenue_at_risk: f64,
    pub mean_probability: f64,
    /// Ten highest revenue-at-risk members, largest first.
    pub top_at_risk: Vec<MemberPrediction>,
}

pub fn summarize_predictions(
    predictions: &[MemberPrediction],
    cfg: &RiskModelConfig,
) -> PredictionSummary {
    let mut summary = PredictionSummary {
        total_members: predictions.len(),
        ..PredictionSummary::default()
    };
    for p in predictions {
        match p.engagement_class {
            EngagementClass::Core => summary.core += 1,
            EngagementClass::Drifter => {
                summary.drifter += 1;
                if p.tenure_days <= cfg.new_drifter_days {
                    summary.new_drifters += 1;
                }
            }
            EngagementClass::AtRisk => summary.at_risk += 1,
            EngagementClass::Ghost => summary.ghost += 1,
        }
        summary.total_revenue_at_risk += p.revenue_at_risk;
    }
    summary.total_revenue_at_risk = round2(summary.total_revenue_at_risk);
    if !predictions.is_empty() {
        summary.mean_probability =
            predictions.iter().map(|p| p.churn_probability).sum::<f64>() / predictions.len() as f64;
    }

    let mut ranked: Vec<&MemberPrediction> = predictions.iter().collect();
    ranked.sort_by(|a, b| {
        b.revenue_at_risk
            .total_cmp(&a.revenue_at_risk)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
    summary.top_at_risk = ranked.into_iter().take(10).cloned().collect();
    summary
}

/// Load the roster, contacts and latest metrics, then predict every member
/// active as of `as_of`.
pub fn predict_gym(
    store: &DeskStore,
    config: &ScoringConfig,
    gym_id: &str,
    as_of: NaiveDate,
    learned_weights: BTreeMap<InterventionType, f64>,
) -> DeskResult<(GymAggregate, Vec<MemberPrediction>)> {
    let roster = store.members_for_gym(gym_id)?;
    let latest = store.recent_metrics(gym_id, month_start(as_of), 1)?;
    let mut aggregate =
        GymAggregate::from_roster(gym_id, &roster, latest.last(), &config.risk, as_of);
    aggregate.learned_weights = learned_weights;

    let mut contacts_by_member: HashMap<String, Vec<MemberContact>> = HashMap::new();
    for contact in store.contacts_for_gym(gym_id)? {
        contacts_by_member
            .entry(contact.member_id.clone())
            .or_default()
            .push(contact);
    }

    let predictions: Vec<MemberPrediction> = roster
        .iter()
        .filter(|m| m.is_active_on(as_of))
        .map(|m| {
            let contacts = contacts_by_member
                .get(&m.member_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            predict_member(m, contacts, &aggregate, config, as_of)
        })
        .collect();

    log::debug!(
        "predicted {} members for {gym_id} as {}",
        predictions.len(),
        aggregate.archetype.as_str()
    );
    Ok((aggregate, predictions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberStatus;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn member(join: NaiveDate, rate: f64) -> Member {
        Member {
            member_id: "m-1".into(),
            gym_id: "gym".into(),
            name: "Pat".into(),
            email: None,
            status: MemberStatus::Active,
            join_date: join,
            cancel_date: None,
            monthly_rate: rate,
        }
    }

    fn aggregate(churn: f64, arm: f64) -> GymAggregate {
        let cfg = RiskModelConfig::default();
        GymAggregate {
            gym_id: "gym".into(),
            churn_rate: churn,
            arm,
            high_value_rate: 0.0,
            early_cancel_share: 0.0,
            median_cancel_tenure: None,
            archetype: GymArchetype::classify(churn, arm, &cfg.archetype),
            learned_weights: BTreeMap::new(),
        }
    }

    #[test]
    fn archetype_precedence() {
        let cfg = ArchetypeConfig::default();
        assert_eq!(GymArchetype::classify(8.0, 200.0, &cfg), GymArchetype::TurnaroundLab);
        assert_eq!(GymArchetype::classify(4.0, 150.0, &cfg), GymArchetype::PremiumBoutique);
        assert_eq!(GymArchetype::classify(2.0, 90.0, &cfg), GymArchetype::CommunityAnchor);
        assert_eq!(GymArchetype::classify(4.0, 90.0, &cfg), GymArchetype::GrowthAccelerator);
    }

    #[test]
    fn brand_new_uncontacted_member_is_a_ghost() {
        let as_of = d(2026, 10, 19);
        let m = member(d(2026, 10, 12), 150.0);
        let config = ScoringConfig::default();
        let p = predict_member(&m, &[], &aggregate(8.0, 150.0), &config, as_of);
        // 0.03 + 0.34 + 0.20 + 0.06 + 0.04 + urgency ≈ 0.74
        assert!(p.churn_probability > 0.55);
        assert_eq!(p.engagement_class, EngagementClass::Ghost);
        assert_eq!(p.primary_driver, "early-tenure");
        assert_eq!(p.factors[0].factor, "early-tenure");
    }

    /// Long tenure, contacted today and paying above the high-value mark.
    #[test]
    fn loyal_member_floors_at_minimum() {
        let as_of = d(2026, 10, 19);
        let m = member(d(2023, 7, 1), 220.0);
        let contact = MemberContact {
            member_id: "m-1".into(),
            gym_id: "gym".into(),
            contacted_at: as_of.and_hms_opt(9, 0, 0).unwrap().and_utc(),
            note: Some("quick check in".into()),
        };
        let agg = GymAggregate {
            high_value_rate: 180.0,
            ..aggregate(2.0, 100.0)
        };
        assert!(is_high_value(&m, &agg));

        let p = predict_member(&m, &[contact], &agg, &ScoringConfig::default(), as_of);
        assert!(p.factors.iter().any(|f| f.factor == "high-value-established"));
        assert_eq!(p.churn_probability, 0.01);
        assert_eq!(p.engagement_class, EngagementClass::Core);
        assert_eq!(p.primary_driver, "stable");
        assert_eq!(p.days_since_contact, Some(0));
    }

    #[test]
    fn summary_counts_new_drifters() {
        let as_of = d(2026, 10, 19);
        let config = ScoringConfig::default();
        let agg = aggregate(4.0, 100.0);
        let mut fresh = predict_member(&member(d(2026, 8, 1), 100.0), &[], &agg, &config, as_of);
        fresh.engagement_class = EngagementClass::Drifter;
        let mut settled = predict_member(&member(d(2025, 1, 1), 100.0), &[], &agg, &config, as_of);
        settled.engagement_class = EngagementClass::Drifter;

        let summary = summarize_predictions(&[fresh, settled], &config.risk);
        assert_eq!(summary.drifter, 2);
        assert_eq!(summary.new_drifters, 1);
    }

    #[test]
    fn expected_months_and_revenue_at_risk() {
        let cfg = RiskModelConfig::default();
        assert_eq!(expected_months(0.01, &cfg), 60.0);
        assert_eq!(expected_months(0.9, &cfg), 2.0);
        assert!((revenue_at_risk(0.9, 100.0, &cfg) - 180.0).abs() < 1e-9);
        assert!((revenue_at_risk(0.2, 100.0, &cfg) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn urgency_decay_weights() {
        let cfg = RiskModelConfig::default();
        assert!((urgency_decay(0, None, &cfg) - 1.0).abs() < 1e-9);
        assert!((urgency_decay(200, Some(30), &cfg) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn nearest_rank_percentile() {
        assert_eq!(nearest_rank(&[10.0, 20.0, 30.0, 40.0, 50.0], 0.8), Some(40.0));
        assert_eq!(nearest_rank(&[], 0.8), None);
        assert_eq!(median(&[1, 3, 10]), Some(3.0));
        assert_eq!(median(&[1, 3]), Some(2.0));
    }

    #[test]
    fn milestones_include_later_anniversaries() {
        assert!(near_milestone(88, 14, &[30, 90, 180, 365]));
        assert!(near_milestone(735, 14, &[30, 90, 180, 365]));
        assert!(!near_milestone(250, 14, &[30, 90, 180, 365]));
    }
}
