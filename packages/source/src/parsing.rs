//! Tolerant value parsing shared by the source cleaners.
//!
//! Raw extracts mix decimal commas, thousands separators, currency symbols
//! and percent signs. Parsing never fails: unparseable values coerce to a
//! documented default (zero or `None`) and are not reported.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::key::normalize_zone;

/// Currency markers and percent signs stripped before numeric parsing.
static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)S/\.?|US\$|USD|PEN|\$|€|%").expect("valid regex"));

/// Date formats accepted for cut-off, start and end dates, tried in order.
const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Parses a number written with any of the common local conventions.
///
/// * `"1.234,56"` and `"1,234.56"`: the last separator is the decimal point
/// * a single comma is a decimal comma (`"12,5"`); repeated commas or
///   repeated dots are thousands separators
/// * currency markers (`S/.`, `$`, `USD`, `PEN`, `€`), `%` and inner spaces
///   are ignored
///
/// Returns `None` for empty, non-numeric or non-finite input, and for input
/// that still contains letters once the markers are removed (`"1e5"`).
#[must_use]
pub fn parse_number(raw: &str) -> Option<f64> {
    let stripped = SYMBOL_RE.replace_all(raw.trim(), "");
    if stripped.chars().any(char::is_alphabetic) {
        return None;
    }
    let kept: String = stripped
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    let (negative, body) = kept
        .strip_prefix('-')
        .map_or((false, kept.as_str()), |rest| (true, rest));
    if body.is_empty() || body.contains('-') || !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let commas = body.matches(',').count();
    let dots = body.matches('.').count();
    let normalized = match (commas, dots) {
        (0, 0 | 1) => body.to_string(),
        (0, _) => body.replace('.', ""),
        (1, 0) => body.replace(',', "."),
        (_, 0) => body.replace(',', ""),
        _ => {
            let last_comma = body.rfind(',').unwrap_or(0);
            let last_dot = body.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                body.replace('.', "").replace(',', ".")
            } else {
                body.replace(',', "")
            }
        }
    };

    let value = normalized.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(if negative { -value } else { value })
}

/// Parses a non-negative count: clipped at zero, rounded, `0` on failure.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(parse_number)
        .map_or(0, |v| v.max(0.0).round() as u64)
}

/// Parses a length in meters: clipped at zero, `0.0` on failure.
#[must_use]
pub fn parse_length(raw: Option<&str>) -> f64 {
    raw.and_then(parse_number).map_or(0.0, |v| v.max(0.0))
}

/// Parses a progress percentage clamped to `0..=100`, `None` on failure.
#[must_use]
pub fn parse_progress(raw: Option<&str>) -> Option<f64> {
    raw.and_then(parse_number).map(|v| v.clamp(0.0, 100.0))
}

/// Parses a monetary amount, `0.0` on failure.
#[must_use]
pub fn parse_cost(raw: Option<&str>) -> f64 {
    raw.and_then(parse_number).unwrap_or(0.0)
}

/// Parses a date written as `YYYYMMDD`, `YYYY-MM-DD` or a day-first form.
///
/// A trailing time component (`2024-03-31 00:00:00`, `2024-03-31T00:00`)
/// and a zero-only decimal part (`20240331.0`) are ignored.
#[must_use]
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let trimmed = raw?.trim();
    let date_part = trimmed
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(trimmed);
    let date_part = date_part
        .split_once('.')
        .filter(|(_, decimals)| !decimals.is_empty() && decimals.chars().all(|c| c == '0'))
        .map_or(date_part, |(whole, _)| whole);

    if date_part.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Normalizes a free-text categorical value, mapping blanks to `None`.
#[must_use]
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    let value = normalize_zone(raw?);
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn symbol_pattern_compiles() {
        LazyLock::force(&SYMBOL_RE);
        assert!(SYMBOL_RE.is_match("s/. 10"));
    }

    #[test]
    fn rejects_leftover_letters() {
        assert_eq!(parse_number("1e5"), None);
        assert_eq!(parse_number("12 kg"), None);
        assert_eq!(parse_count(Some("3E2")), 0);
        assert!(approx(parse_number("usd 15").unwrap(), 15.0));
    }

    #[test]
    fn parses_plain_and_decimal_comma() {
        assert!(approx(parse_number("42").unwrap(), 42.0));
        assert!(approx(parse_number(" 12,5 ").unwrap(), 12.5));
        assert!(approx(parse_number("-3.25").unwrap(), -3.25));
    }

    #[test]
    fn parses_thousands_separators() {
        assert!(approx(parse_number("1.234,56").unwrap(), 1234.56));
        assert!(approx(parse_number("1,234.56").unwrap(), 1234.56));
        assert!(approx(parse_number("1,234,567").unwrap(), 1_234_567.0));
        assert!(approx(parse_number("1.234.567").unwrap(), 1_234_567.0));
        assert!(approx(parse_number("12 345").unwrap(), 12345.0));
    }

    #[test]
    fn strips_currency_and_percent() {
        assert!(approx(parse_number("S/. 1,500.00").unwrap(), 1500.0));
        assert!(approx(parse_number("S/ 2.000,50").unwrap(), 2000.5));
        assert!(approx(parse_number("US$ 10").unwrap(), 10.0));
        assert!(approx(parse_number("85%").unwrap(), 85.0));
    }

    #[test]
    fn rejects_non_numeric() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("N/A"), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("2024-01-01"), None);
    }

    #[test]
    fn counts_clip_and_round() {
        assert_eq!(parse_count(Some("-4")), 0);
        assert_eq!(parse_count(Some("7,6")), 8);
        assert_eq!(parse_count(Some("sin dato")), 0);
        assert_eq!(parse_count(None), 0);
    }

    #[test]
    fn lengths_progress_and_cost_defaults() {
        assert!(approx(parse_length(Some("-10")), 0.0));
        assert!(approx(parse_length(Some("120,75")), 120.75));
        assert_eq!(parse_progress(Some("")), None);
        assert!(approx(parse_progress(Some("150")).unwrap(), 100.0));
        assert!(approx(parse_progress(Some("-2")).unwrap(), 0.0));
        assert!(approx(parse_cost(Some("abc")), 0.0));
    }

    #[test]
    fn parses_supported_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 31);
        assert_eq!(parse_date(Some("20240331")), expected);
        assert_eq!(parse_date(Some("20240331.0")), expected);
        assert_eq!(parse_date(Some("2024-03-31")), expected);
        assert_eq!(parse_date(Some("2024-03-31 00:00:00")), expected);
        assert_eq!(parse_date(Some("31/03/2024")), expected);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(Some("20241340")), None);
    }

    #[test]
    fn clean_text_maps_blank_to_none() {
        assert_eq!(clean_text(Some("   ")), None);
        assert_eq!(clean_text(Some(" gerencia  centro ")).as_deref(), Some("GERENCIA CENTRO"));
    }
}
