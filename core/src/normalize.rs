//! Row normalization and validation.
//!
//! A row either becomes exactly one `ParsedMember` or produces one
//! `ValidationError` per hard failure (name, join date, cancel date, email).
//! A bad monthly rate never rejects a row: it degrades to 0.

use crate::{
    field_mapper::{CanonicalField, ColumnMapping},
    member::{bucket_status, ParsedMember},
};
use chrono::{DateTime, Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationError {
    /// 1-based line number in the source file (header is line 1).
    pub line: usize,
    pub field: CanonicalField,
    pub value: String,
    pub message: String,
}

// ── Date cascade ───────────────────────────────────────────────────

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ].*)?$").expect("valid regex")
});
static US_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("valid regex"));
static US_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})$").expect("valid regex"));
static EU_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").expect("valid regex"));
static SHORT_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2})$").expect("valid regex"));
static MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$").expect("valid regex")
});
static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+)\.?,?\s+(\d{4})$").expect("valid regex")
});
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const FALLBACK_FORMATS: [&str; 3] = ["%Y/%m/%d", "%Y.%m.%d", "%B %d %Y"];
const FALLBACK_YEARS: std::ops::RangeInclusive<i32> = 1900..=2099;

fn month_from_name(word: &str) -> Option<u32> {
    let word = word.to_lowercase();
    if word.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|full| full.starts_with(&word))
        .map(|i| i as u32 + 1)
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Parse a roster date. Patterns are tried in order and the first pattern
/// that matches decides the outcome: an impossible date under a matching
/// pattern is `None`, never reinterpreted by a later one.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(c) = ISO_DATE.captures(s) {
        return ymd(&c[1], &c[2], &c[3]);
    }
    if let Some(c) = US_SLASH.captures(s) {
        return ymd(&c[3], &c[1], &c[2]);
    }
    if let Some(c) = US_DASH.captures(s) {
        return ymd(&c[3], &c[1], &c[2]);
    }
    if let Some(c) = EU_DOT.captures(s) {
        return ymd(&c[3], &c[2], &c[1]);
    }
    if let Some(c) = SHORT_YEAR.captures(s) {
        let yy: i32 = c[3].parse().ok()?;
        let year = if yy > 50 { 1900 + yy } else { 2000 + yy };
        return NaiveDate::from_ymd_opt(year, c[1].parse().ok()?, c[2].parse().ok()?);
    }
    if let Some(c) = MONTH_FIRST.captures(s) {
        if let Some(month) = month_from_name(&c[1]) {
            return NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[2].parse().ok()?);
        }
    }
    if let Some(c) = DAY_FIRST.captures(s) {
        if let Some(month) = month_from_name(&c[2]) {
            return NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[1].parse().ok()?);
        }
    }

    fallback_date(s)
}

fn fallback_date(s: &str) -> Option<NaiveDate> {
    let parsed = FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
        .or_else(|| DateTime::parse_from_rfc2822(s).ok().map(|d| d.date_naive()))?;
    FALLBACK_YEARS.contains(&parsed.year()).then_some(parsed)
}

/// `YYYY-MM-DD` form of `parse_date`.
pub fn normalize_date(raw: &str) -> Option<String> {
    parse_date(raw).map(|d| d.format("%Y-%m-%d").to_string())
}

// ── Field cleaners ─────────────────────────────────────────────────

pub fn clean_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '{' | '}'))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn is_valid_email(raw: &str) -> bool {
    EMAIL.is_match(raw.trim())
}

/// Strip currency symbols and separators; anything unparseable is 0.
pub fn parse_rate(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | '₹' | ',') && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => (v.max(0.0) * 100.0).round() / 100.0,
        _ => 0.0,
    }
}

// ── Row validation ─────────────────────────────────────────────────

fn cell<'a>(cells: &'a [String], mapping: &ColumnMapping, field: CanonicalField) -> &'a str {
    mapping
        .get(field)
        .and_then(|i| cells.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

pub fn normalize_and_validate_row(
    cells: &[String],
    mapping: &ColumnMapping,
    line: usize,
) -> Result<ParsedMember, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: CanonicalField, value: &str, message: &str| {
        errors.push(ValidationError {
            line,
            field,
            value: value.to_string(),
            message: message.to_string(),
        });
    };

    let raw_name = cell(cells, mapping, CanonicalField::Name);
    let name = clean_name(raw_name);
    if name.is_empty() {
        fail(CanonicalField::Name, raw_name, "Name is required");
    }

    let raw_join = cell(cells, mapping, CanonicalField::JoinDate);
    let join_date = if raw_join.is_empty() {
        fail(CanonicalField::JoinDate, raw_join, "Join date is required");
        None
    } else {
        let parsed = parse_date(raw_join);
        if parsed.is_none() {
            fail(CanonicalField::JoinDate, raw_join, "Unrecognized join date format");
        }
        parsed
    };

    let raw_cancel = cell(cells, mapping, CanonicalField::CancelDate);
    let cancel_date = if raw_cancel.is_empty() {
        None
    } else {
        match parse_date(raw_cancel) {
            None => {
                fail(CanonicalField::CancelDate, raw_cancel, "Unrecognized cancel date format");
                None
            }
            Some(cancel) if join_date.is_some_and(|join| cancel < join) => {
                fail(CanonicalField::CancelDate, raw_cancel, "Cancel date precedes join date");
                None
            }
            Some(cancel) => Some(cancel),
        }
    };

    let raw_email = cell(cells, mapping, CanonicalField::Email);
    let email = if raw_email.is_empty() {
        None
    } else if is_valid_email(raw_email) {
        Some(raw_email.to_lowercase())
    } else {
        fail(CanonicalField::Email, raw_email, "Invalid email address");
        None
    };

    let status = bucket_status(cell(cells, mapping, CanonicalField::Status));
    let monthly_rate = parse_rate(cell(cells, mapping, CanonicalField::MonthlyRate));

    match join_date {
        Some(join_date) if errors.is_empty() => Ok(ParsedMember {
            name,
            email,
            status,
            join_date,
            cancel_date,
            monthly_rate,
        }),
        _ => Err(errors),
    }
}
