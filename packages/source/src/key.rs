//! Canonical micro-zone key normalization.
//!
//! Every loader funnels its raw key columns through [`build_key`], so two
//! rows that only differ in padding, case, whitespace, separators or numeric
//! encoding always land on the same [`MicrozoneKey`]. The functions here are
//! total: malformed input degrades to a verbatim value, never an error.

use std::sync::LazyLock;

use chrono::{Datelike as _, NaiveDate};
use microzone_models::MicrozoneKey;
use regex::Regex;

use crate::parsing::parse_number;

/// Trailing zero-only decimal part left behind by spreadsheet exports
/// (`150132.0`, `15132.00`).
static ZERO_DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d[\d\s\-]*)[.,]0+$").expect("valid regex"));

/// Length of a well-formed UBIGEO code.
pub const UBIGEO_LEN: usize = 6;

/// Accepted reporting years.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 2000..=2100;

/// Normalizes a raw UBIGEO administrative code.
///
/// * separators, whitespace and a zero-only decimal part are ignored:
///   `"15-01-32"`, `" 150132 "`, `"150132.0"` all give `"150132"`
/// * one to six digits are left zero-padded: `"15132"` gives `"015132"`
/// * no digits or more than six digits: the trimmed raw value is kept
#[must_use]
pub fn normalize_ubigeo(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_decimal = ZERO_DECIMAL_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    let digits: String = without_decimal
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    if digits.is_empty() || digits.len() > UBIGEO_LEN {
        return trimmed.to_string();
    }

    format!("{digits:0>width$}", width = UBIGEO_LEN)
}

/// Folds Spanish accented letters to their unaccented uppercase form.
#[must_use]
pub const fn fold_accent(c: char) -> char {
    match c {
        'Á' | 'À' | 'Ä' | 'Â' | 'Ã' => 'A',
        'É' | 'È' | 'Ë' | 'Ê' => 'E',
        'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
        'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'O',
        'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
        'Ñ' => 'N',
        'Ç' => 'C',
        other => other,
    }
}

/// Upper-cases, folds accents, collapses whitespace and trims.
///
/// Used for the zone component of the key and for every free-text
/// categorical value that is later compared for equality.
#[must_use]
pub fn normalize_zone(raw: &str) -> String {
    let upper: String = raw.to_uppercase().chars().map(fold_accent).collect();
    upper.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a raw year, keeping it only when it falls in [`YEAR_RANGE`].
#[must_use]
pub fn normalize_year(raw: Option<&str>) -> Option<i32> {
    let value = whole_number(raw?)?;
    let year = i32::try_from(value).ok()?;
    YEAR_RANGE.contains(&year).then_some(year)
}

/// Parses a raw month, keeping it only when it is in `1..=12`.
#[must_use]
pub fn normalize_month(raw: Option<&str>) -> Option<u32> {
    let value = whole_number(raw?)?;
    let month = u32::try_from(value).ok()?;
    (1..=12).contains(&month).then_some(month)
}

/// Resolves the reporting period, filling each missing component from the
/// cut-off date when one is available.
#[must_use]
pub fn normalize_period(
    year: Option<&str>,
    month: Option<&str>,
    cutoff: Option<NaiveDate>,
) -> (Option<i32>, Option<u32>) {
    let year = normalize_year(year).or_else(|| {
        cutoff
            .map(|d| d.year())
            .filter(|y| YEAR_RANGE.contains(y))
    });
    let month = normalize_month(month).or_else(|| cutoff.map(|d| d.month()));
    (year, month)
}

/// Builds the canonical key of a raw record.
#[must_use]
pub fn build_key(
    ubigeo: Option<&str>,
    district: Option<&str>,
    year: Option<&str>,
    month: Option<&str>,
    cutoff: Option<NaiveDate>,
) -> MicrozoneKey {
    let (year, month) = normalize_period(year, month, cutoff);
    MicrozoneKey::new(
        normalize_ubigeo(ubigeo.unwrap_or_default()),
        year,
        month,
        normalize_zone(district.unwrap_or_default()),
    )
}

/// Parses a key string rendered as `ubigeo|year|month|zone`.
///
/// Each component goes through the same normalization as raw records, so
/// the result can be compared with keys built by [`build_key`]. Returns
/// `None` when the string does not have four components.
#[must_use]
pub fn parse_key(rendered: &str) -> Option<MicrozoneKey> {
    let mut parts = rendered.splitn(4, '|');
    let ubigeo = parts.next()?;
    let year = parts.next()?;
    let month = parts.next()?;
    let zone = parts.next()?;
    Some(build_key(
        Some(ubigeo),
        Some(zone),
        Some(year),
        Some(month),
        None,
    ))
}

fn whole_number(raw: &str) -> Option<i64> {
    let value = parse_number(raw)?;
    if value.fract() != 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(value as i64)
}
