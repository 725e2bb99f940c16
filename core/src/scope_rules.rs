//! Pillar scope guard for supporting sentences.
//!
//! A sentence attached to a recommendation must stay inside that
//! recommendation's pillar. Each pillar lists keywords that belong to some
//! other pillar; any case-insensitive substring hit rejects the sentence.

use crate::brief::Pillar;

fn banned_keywords(pillar: Pillar) -> &'static [&'static str] {
    match pillar {
        Pillar::Retention => &[
            "paid ads",
            "facebook ads",
            "instagram ads",
            "lead generation",
            "billboard",
            "seo",
            "pricing",
            "price increase",
            "upsell",
            "upgrade package",
            "discount",
        ],
        Pillar::Acquisition => &[
            "cancellation",
            "win-back",
            "win back",
            "retention call",
            "exit survey",
        ],
        Pillar::CommunityDepth => &[
            "discount",
            "price cut",
            "paid ads",
            "lead generation",
            "programming overhaul",
        ],
        Pillar::CoachingQuality => &[
            "paid ads",
            "billboard",
            "referral bonus",
            "discount",
            "lead generation",
        ],
    }
}

pub fn sentence_violates_scope(pillar: Pillar, sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    banned_keywords(pillar).iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_substring_match() {
        assert!(sentence_violates_scope(Pillar::Retention, "Run Facebook Ads for January."));
        assert!(!sentence_violates_scope(Pillar::Acquisition, "Run Facebook Ads for January."));
        assert!(sentence_violates_scope(Pillar::Acquisition, "Send an exit survey to leavers."));
        assert!(!sentence_violates_scope(Pillar::CoachingQuality, "Coaches check in weekly."));
    }

    #[test]
    fn retention_rejects_pricing_language() {
        assert!(sentence_violates_scope(Pillar::Retention, "Pitch an upsell with new pricing"));
        assert!(sentence_violates_scope(Pillar::Retention, "Offer a DISCOUNT to quiet members."));
        assert!(sentence_violates_scope(Pillar::Retention, "Announce the price increase early."));
        assert!(!sentence_violates_scope(
            Pillar::Retention,
            "Call every member who missed a week."
        ));
    }
}
