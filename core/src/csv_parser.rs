//! Roster CSV parsing: tokenize, preview, full validation, file hash.
//!
//! Tokenizing goes through the `csv` crate, so quoted fields may hold
//! commas, `""` escapes and embedded newlines. A record that spans several
//! physical lines is one row; errors report the line it starts on.
//!
//! Two entry points share the same row validator:
//!   - `preview_csv`    : bounded output for the mapping screen
//!   - `parse_all_rows` : every row, every error, for commit

use crate::{
    config::ImportLimits,
    error::{DeskError, DeskResult},
    field_mapper::{detect_mapping, ColumnMapping, DetectedMapping, MappingOverride},
    member::ParsedMember,
    normalize::{normalize_and_validate_row, ValidationError},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvRow {
    /// Physical line the record starts on (header is line 1).
    pub line: usize,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResult {
    pub headers: Vec<String>,
    pub sample_rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub detected: DetectedMapping,
    pub validation: ValidationSummary,
    pub file_hash: String,
    /// Set by the desk when a previous import for the gym has the same hash.
    pub duplicate_import: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub members: Vec<ParsedMember>,
    pub errors: Vec<ValidationError>,
    pub total_rows: usize,
    pub invalid_rows: usize,
}

/// Split text into a header row and data rows.
pub fn parse_headers(text: &str) -> DeskResult<ParsedCsv> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        records.push(CsvRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    let mut iter = records.into_iter();
    let headers = iter.next().ok_or(DeskError::EmptyFile)?.cells;
    Ok(ParsedCsv {
        headers,
        rows: iter.collect(),
    })
}

/// Mapping-screen preview. The first `sample_rows` rows are validated in
/// full; later rows keep at most `errors_per_row_truncated` errors each so
/// the response stays small on large files.
pub fn preview_csv(
    text: &str,
    overrides: &MappingOverride,
    limits: &ImportLimits,
) -> DeskResult<PreviewResult> {
    let parsed = parse_headers(text)?;
    let detected = detect_mapping(&parsed.headers).with_overrides(overrides);

    let mut valid_rows = 0;
    let mut invalid_rows = 0;
    let mut errors = Vec::new();

    for (index, row) in parsed.rows.iter().enumerate() {
        match normalize_and_validate_row(&row.cells, &detected.mapping, row.line) {
            Ok(_) => valid_rows += 1,
            Err(row_errors) => {
                invalid_rows += 1;
                let keep = if index < limits.sample_rows {
                    row_errors.len()
                } else {
                    limits.errors_per_row_truncated
                };
                let room = limits.preview_errors.saturating_sub(errors.len());
                errors.extend(row_errors.into_iter().take(keep.min(room)));
            }
        }
    }

    let sample_rows = parsed
        .rows
        .iter()
        .take(limits.sample_rows)
        .map(|r| r.cells.clone())
        .collect();

    Ok(PreviewResult {
        total_rows: parsed.rows.len(),
        headers: parsed.headers,
        sample_rows,
        detected,
        validation: ValidationSummary {
            valid_rows,
            invalid_rows,
            errors,
        },
        file_hash: compute_file_hash(text),
        duplicate_import: false,
    })
}

/// Validate every row with no truncation.
pub fn parse_all_rows(text: &str, mapping: &ColumnMapping) -> DeskResult<ImportResult> {
    let parsed = parse_headers(text)?;
    let mut members = Vec::with_capacity(parsed.rows.len());
    let mut errors = Vec::new();
    let mut invalid_rows = 0;

    for row in &parsed.rows {
        match normalize_and_validate_row(&row.cells, mapping, row.line) {
            Ok(member) => members.push(member),
            Err(row_errors) => {
                invalid_rows += 1;
                errors.extend(row_errors);
            }
        }
    }

    Ok(ImportResult {
        members,
        errors,
        total_rows: parsed.rows.len(),
        invalid_rows,
    })
}

/// Non-cryptographic content hash for duplicate-upload warnings.
/// 32-bit `hash * 31 + unit` over UTF-16 code units, base-36, `-<unit count>`.
pub fn compute_file_hash(text: &str) -> String {
    let mut hash: i32 = 0;
    for unit in text.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    let units = text.encode_utf16().count();
    format!("{}-{}", to_base36(hash.unsigned_abs() as u64), units)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
