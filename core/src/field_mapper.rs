//! Heuristic column detection for roster files.
//!
//! Each canonical field owns a synonym list whose first entry is the
//! canonical spelling. Detection runs two passes over normalized headers:
//!   1. exact match  : canonical synonym → high, any other synonym → medium
//!   2. substring    : header contains a synonym → low
//! A column is claimed by at most one field, and exact matches are claimed
//! before any substring match is considered.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Name,
    Email,
    Status,
    JoinDate,
    CancelDate,
    MonthlyRate,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        Self::Name,
        Self::Email,
        Self::Status,
        Self::JoinDate,
        Self::CancelDate,
        Self::MonthlyRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Status => "status",
            Self::JoinDate => "joinDate",
            Self::CancelDate => "cancelDate",
            Self::MonthlyRate => "monthlyRate",
        }
    }

    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Name => &[
                "name",
                "member name",
                "full name",
                "client name",
                "customer name",
                "member",
                "client",
            ],
            Self::Email => &["email", "email address", "e mail", "mail", "member email"],
            Self::Status => &[
                "status",
                "membership status",
                "member status",
                "account status",
                "state",
            ],
            Self::JoinDate => &[
                "join date",
                "joined",
                "date joined",
                "start date",
                "member since",
                "signup date",
                "sign up date",
                "created",
                "join",
                "start",
            ],
            Self::CancelDate => &[
                "cancel date",
                "cancellation date",
                "cancelled date",
                "canceled date",
                "end date",
                "termination date",
                "cancelled",
                "canceled",
                "cancel",
                "end",
            ],
            Self::MonthlyRate => &[
                "monthly rate",
                "rate",
                "monthly fee",
                "monthly dues",
                "dues",
                "price",
                "monthly price",
                "membership fee",
                "amount",
                "fee",
                "mrr",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MappingConfidence {
    High,
    Medium,
    Low,
    Manual,
    Unmapped,
}

/// Canonical field → source column index. `None` is the unmapped sentinel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub name: Option<usize>,
    pub email: Option<usize>,
    pub status: Option<usize>,
    pub join_date: Option<usize>,
    pub cancel_date: Option<usize>,
    pub monthly_rate: Option<usize>,
}

/// Caller-supplied partial mapping. A present key wins over detection;
/// `Some(None)` explicitly unmaps the field.
pub type MappingOverride = BTreeMap<CanonicalField, Option<usize>>;

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        match field {
            CanonicalField::Name => self.name,
            CanonicalField::Email => self.email,
            CanonicalField::Status => self.status,
            CanonicalField::JoinDate => self.join_date,
            CanonicalField::CancelDate => self.cancel_date,
            CanonicalField::MonthlyRate => self.monthly_rate,
        }
    }

    pub fn set(&mut self, field: CanonicalField, index: Option<usize>) {
        let slot = match field {
            CanonicalField::Name => &mut self.name,
            CanonicalField::Email => &mut self.email,
            CanonicalField::Status => &mut self.status,
            CanonicalField::JoinDate => &mut self.join_date,
            CanonicalField::CancelDate => &mut self.cancel_date,
            CanonicalField::MonthlyRate => &mut self.monthly_rate,
        };
        *slot = index;
    }

    /// Apply overrides on top of this mapping.
    pub fn merged(&self, overrides: &MappingOverride) -> ColumnMapping {
        let mut merged = self.clone();
        for (field, index) in overrides {
            merged.set(*field, *index);
        }
        merged
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedMapping {
    pub mapping: ColumnMapping,
    pub confidence: BTreeMap<CanonicalField, MappingConfidence>,
}

impl DetectedMapping {
    /// Merge overrides; overridden fields report `Manual` (or `Unmapped`).
    pub fn with_overrides(&self, overrides: &MappingOverride) -> DetectedMapping {
        let mut confidence = self.confidence.clone();
        for (field, index) in overrides {
            let label = if index.is_some() {
                MappingConfidence::Manual
            } else {
                MappingConfidence::Unmapped
            };
            confidence.insert(*field, label);
        }
        DetectedMapping {
            mapping: self.mapping.merged(overrides),
            confidence,
        }
    }
}

/// Lower-case, turn separators into spaces, collapse whitespace.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '_' | '-' | '.' | '/') { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn detect_mapping(headers: &[String]) -> DetectedMapping {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut mapping = ColumnMapping::default();
    let mut confidence: BTreeMap<CanonicalField, MappingConfidence> = CanonicalField::ALL
        .iter()
        .map(|f| (*f, MappingConfidence::Unmapped))
        .collect();
    let mut claimed = vec![false; headers.len()];

    // Pass 1: exact matches, synonym order decides preference.
    for field in CanonicalField::ALL {
        for (rank, synonym) in field.synonyms().iter().enumerate() {
            let hit = normalized
                .iter()
                .enumerate()
                .find(|(i, h)| !claimed[*i] && h.as_str() == *synonym);
            if let Some((index, _)) = hit {
                claimed[index] = true;
                mapping.set(field, Some(index));
                let label = if rank == 0 {
                    MappingConfidence::High
                } else {
                    MappingConfidence::Medium
                };
                confidence.insert(field, label);
                break;
            }
        }
    }

    // Pass 2: substring matches for whatever is still unmapped.
    for field in CanonicalField::ALL {
        if mapping.get(field).is_some() {
            continue;
        }
        'synonyms: for synonym in field.synonyms() {
            for (index, header) in normalized.iter().enumerate() {
                if !claimed[index] && !header.is_empty() && header.contains(synonym) {
                    claimed[index] = true;
                    mapping.set(field, Some(index));
                    confidence.insert(field, MappingConfidence::Low);
                    break 'synonyms;
                }
            }
        }
    }

    log::debug!("detected column mapping: {mapping:?}");
    DetectedMapping { mapping, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn member_name_email_join_date() {
        let detected = detect_mapping(&headers(&["Member Name", "Email", "Join Date"]));
        assert_eq!(detected.mapping.name, Some(0));
        assert_eq!(detected.mapping.email, Some(1));
        assert_eq!(detected.mapping.join_date, Some(2));
        assert_eq!(detected.confidence[&CanonicalField::Name], MappingConfidence::Medium);
        assert_eq!(detected.confidence[&CanonicalField::Email], MappingConfidence::High);
        assert_eq!(detected.confidence[&CanonicalField::JoinDate], MappingConfidence::High);
        assert_eq!(detected.confidence[&CanonicalField::Status], MappingConfidence::Unmapped);
    }

    #[test]
    fn substring_matches_are_low_confidence() {
        let detected = detect_mapping(&headers(&["Primary Email Contact", "Plan Price (USD)"]));
        assert_eq!(detected.mapping.email, Some(0));
        assert_eq!(detected.mapping.monthly_rate, Some(1));
        assert_eq!(detected.confidence[&CanonicalField::Email], MappingConfidence::Low);
    }

    #[test]
    fn a_column_is_claimed_once() {
        let detected = detect_mapping(&headers(&["Start Date", "End Date"]));
        assert_eq!(detected.mapping.join_date, Some(0));
        assert_eq!(detected.mapping.cancel_date, Some(1));
    }

    #[test]
    fn overrides_win_and_report_manual() {
        let detected = detect_mapping(&headers(&["Who", "Email", "Joined"]));
        assert_eq!(detected.mapping.name, None);
        let overrides = MappingOverride::from([
            (CanonicalField::Name, Some(0)),
            (CanonicalField::Email, None),
        ]);
        let merged = detected.with_overrides(&overrides);
        assert_eq!(merged.mapping.name, Some(0));
        assert_eq!(merged.mapping.email, None);
        assert_eq!(merged.mapping.join_date, Some(2));
        assert_eq!(merged.confidence[&CanonicalField::Name], MappingConfidence::Manual);
        assert_eq!(merged.confidence[&CanonicalField::Email], MappingConfidence::Unmapped);
    }

    #[test]
    fn header_normalization_collapses_separators() {
        assert_eq!(normalize_header("  Join_Date "), "join date");
        assert_eq!(normalize_header("E-Mail"), "e mail");
    }
}
