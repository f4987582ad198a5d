//! Parsers for the loosely typed values stored by the HR backend.
//!
//! Worked hours arrive either as plain integers or as `"Xh Ym"`
//! strings, and allowance/deduction rates as either flat amounts or
//! percentages. Everything here is total: unparseable input reads as
//! zero rather than failing the payroll run.

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static HOURS_MINUTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s*h\s*(?:(\d+)\s*m)?$").expect("hours pattern is valid")
});

/// Converts `"8"` or `"8h 30m"` into decimal hours.
pub fn convert_to_total_hours(input: &str) -> f64 {
    let input = input.trim();
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        return input.parse::<u64>().map(|h| h as f64).unwrap_or(0.0);
    }
    let Some(caps) = HOURS_MINUTES.captures(input) else {
        return 0.0;
    };
    let hours = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0) as f64;
    let minutes = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0) as f64;
    hours + minutes / 60.0
}

/// A parsed allowance or deduction rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    /// Fraction of base salary (`"10%"` is `Percent(0.10)`).
    Percent(f64),
    Flat(f64),
}

impl Rate {
    pub fn parse(rate: &str) -> Rate {
        let rate = rate.trim();
        if rate.contains('%') {
            let value = rate.replace('%', "").trim().parse::<f64>().unwrap_or(0.0);
            Rate::Percent(finite_or_zero(value) / 100.0)
        } else {
            Rate::Flat(finite_or_zero(rate.parse::<f64>().unwrap_or(0.0)))
        }
    }

    /// The amount this rate contributes against `base_salary`.
    pub fn amount(self, base_salary: f64) -> f64 {
        match self {
            Rate::Percent(fraction) => base_salary * fraction,
            Rate::Flat(value) => value,
        }
    }
}

/// Returns the numeric value of a rate string: a fraction for
/// percentages, the flat amount otherwise.
pub fn parse_rate(rate: &str) -> f64 {
    match Rate::parse(rate) {
        Rate::Percent(v) | Rate::Flat(v) => v,
    }
}

/// Sums the contribution of every rate against `base_salary`.
pub fn calculate_adjustments<'a, I>(rates: I, base_salary: f64) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    rates
        .into_iter()
        .map(|rate| Rate::parse(rate).amount(base_salary))
        .sum()
}

/// Parses a periodic attendance range such as `"2024-01-01 to 2024-01-07"`.
pub fn parse_date_range(range: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (start, end) = range.split_once(" to ")?;
    Some((parse_date(start)?, parse_date(end)?))
}

/// Accepts plain `YYYY-MM-DD` dates and RFC 3339 timestamps.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_from_plain_integers() {
        assert_eq!(convert_to_total_hours("8"), 8.0);
        assert_eq!(convert_to_total_hours(" 12 "), 12.0);
    }

    #[test]
    fn test_hours_from_hour_minute_strings() {
        assert_eq!(convert_to_total_hours("8h 30m"), 8.5);
        assert_eq!(convert_to_total_hours("8h30m"), 8.5);
        assert_eq!(convert_to_total_hours("7h"), 7.0);
        assert_eq!(convert_to_total_hours("0h 45m"), 0.75);
    }

    #[test]
    fn test_unparseable_hours_are_zero() {
        assert_eq!(convert_to_total_hours("garbage"), 0.0);
        assert_eq!(convert_to_total_hours(""), 0.0);
        assert_eq!(convert_to_total_hours("h 30m"), 0.0);
    }

    #[test]
    fn test_rates() {
        assert!((parse_rate("10%") - 0.10).abs() < 1e-12);
        assert_eq!(parse_rate("50"), 50.0);
        assert_eq!(parse_rate(""), 0.0);
        assert_eq!(parse_rate("abc"), 0.0);
        assert_eq!(Rate::parse("12.5 %"), Rate::Percent(0.125));
    }

    #[test]
    fn test_adjustments_mix_flat_and_percentage() {
        let total = calculate_adjustments(["10%", "25", "bogus"], 800.0);
        assert!((total - 105.0).abs() < 1e-9);
        assert_eq!(calculate_adjustments(Vec::<&str>::new(), 800.0), 0.0);
    }

    #[test]
    fn test_date_ranges() {
        let (start, end) = parse_date_range("2024-01-01 to 2024-01-07").unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        assert!(parse_date_range("2024-01-01").is_none());
        assert!(parse_date_range("2024-01-01T00:00:00Z to 2024-01-07T00:00:00Z").is_some());
    }
}
