//! Payroll period validation and metadata.
//!
//! A new period is checked for missing, reversed and overlapping date
//! ranges before anything is sent upstream. `PeriodMeta` carries the
//! derived figures (day counts, expected base hours, week and month
//! numbers) every other stage of a run reads.

use crate::models::PayrollPeriod;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeriodError {
    #[error("{0} is required")]
    MissingDate(&'static str),

    #[error("period end {to} is before its start {from}")]
    Reversed { from: NaiveDate, to: NaiveDate },

    #[error("period {from} to {to} overlaps existing payroll {payroll_id} ({existing_from} to {existing_to})")]
    Overlap {
        from: NaiveDate,
        to: NaiveDate,
        payroll_id: String,
        existing_from: NaiveDate,
        existing_to: NaiveDate,
    },
}

/// Date selection submitted when creating a payroll period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRequest {
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

/// A validated period ready to be created upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayrollPeriod {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub week_no: u32,
    pub month_no: u32,
    pub year: i32,
}

/// Rejects missing, reversed or overlapping selections. Both ends of
/// every window are inclusive.
pub fn validate_new_period(
    request: &PeriodRequest,
    existing: &[PayrollPeriod],
) -> Result<NewPayrollPeriod, PeriodError> {
    let from = request.date_from.ok_or(PeriodError::MissingDate("dateFrom"))?;
    let to = request.date_to.ok_or(PeriodError::MissingDate("dateTo"))?;
    if to < from {
        return Err(PeriodError::Reversed { from, to });
    }
    if let Some(clash) = existing
        .iter()
        .find(|p| from <= p.date_to && p.date_from <= to)
    {
        return Err(PeriodError::Overlap {
            from,
            to,
            payroll_id: clash.payroll_id.clone(),
            existing_from: clash.date_from,
            existing_to: clash.date_to,
        });
    }
    Ok(NewPayrollPeriod {
        date_from: from,
        date_to: to,
        week_no: from.iso_week().week(),
        month_no: from.month(),
        year: from.year(),
    })
}

/// Derived figures for one payroll window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodMeta {
    pub payroll_id: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Calendar days, inclusive of both ends.
    pub total_days: i64,
    /// Monday to Friday days inside the window.
    pub working_days: u32,
    /// `base_hours_per_week * working_days / 5`.
    pub expected_base_hours: f64,
    /// ISO week of `start`.
    pub week_no: u32,
    pub month_no: u32,
    /// Calendar year of `start`; pairs with `month_no`.
    pub year: i32,
    /// ISO week-numbering year of `start`; pairs with `week_no`.
    pub week_year: i32,
}

impl PeriodMeta {
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        base_hours_per_week: f64,
    ) -> Result<Self, PeriodError> {
        if end < start {
            return Err(PeriodError::Reversed { from: start, to: end });
        }
        let working_days = start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .count() as u32;
        Ok(PeriodMeta {
            payroll_id: None,
            start,
            end,
            total_days: (end - start).num_days() + 1,
            working_days,
            expected_base_hours: base_hours_per_week * f64::from(working_days) / 5.0,
            week_no: start.iso_week().week(),
            month_no: start.month(),
            year: start.year(),
            week_year: start.iso_week().year(),
        })
    }

    /// Builds metadata for a stored period, keeping its own week/month
    /// numbering when the backend supplied one.
    pub fn from_period(
        period: &PayrollPeriod,
        base_hours_per_week: f64,
    ) -> Result<Self, PeriodError> {
        let mut meta = Self::new(period.date_from, period.date_to, base_hours_per_week)?;
        meta.payroll_id = Some(period.payroll_id.clone());
        if period.week_no > 0 {
            meta.week_no = period.week_no;
        }
        if period.month_no > 0 {
            meta.month_no = period.month_no;
        }
        if period.year > 0 {
            meta.year = period.year;
        }
        Ok(meta)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn existing() -> Vec<PayrollPeriod> {
        vec![PayrollPeriod {
            payroll_id: "p-1".into(),
            date_from: date(1, 1),
            date_to: date(1, 7),
            week_no: 1,
            month_no: 1,
            year: 2024,
            is_processed: false,
        }]
    }

    #[test]
    fn test_overlapping_selection_is_rejected() {
        let request = PeriodRequest {
            date_from: Some(date(1, 5)),
            date_to: Some(date(1, 10)),
        };
        let err = validate_new_period(&request, &existing()).unwrap_err();
        assert!(matches!(err, PeriodError::Overlap { ref payroll_id, .. } if payroll_id == "p-1"));
    }

    #[test]
    fn test_touching_boundary_counts_as_overlap() {
        let request = PeriodRequest {
            date_from: Some(date(1, 7)),
            date_to: Some(date(1, 14)),
        };
        assert!(validate_new_period(&request, &existing()).is_err());
    }

    #[test]
    fn test_adjacent_period_is_accepted() {
        let request = PeriodRequest {
            date_from: Some(date(1, 8)),
            date_to: Some(date(1, 14)),
        };
        let period = validate_new_period(&request, &existing()).unwrap();
        assert_eq!(period.week_no, 2);
        assert_eq!(period.month_no, 1);
        assert_eq!(period.year, 2024);
    }

    #[test]
    fn test_missing_and_reversed_dates() {
        let missing = PeriodRequest {
            date_from: Some(date(2, 1)),
            date_to: None,
        };
        assert_eq!(
            validate_new_period(&missing, &[]),
            Err(PeriodError::MissingDate("dateTo"))
        );
        let reversed = PeriodRequest {
            date_from: Some(date(2, 10)),
            date_to: Some(date(2, 1)),
        };
        assert!(matches!(
            validate_new_period(&reversed, &[]),
            Err(PeriodError::Reversed { .. })
        ));
    }

    #[test]
    fn test_meta_counts_working_days() {
        let week = PeriodMeta::new(date(1, 1), date(1, 7), 40.0).unwrap();
        assert_eq!(week.total_days, 7);
        assert_eq!(week.working_days, 5);
        assert_eq!(week.expected_base_hours, 40.0);

        let fortnight = PeriodMeta::new(date(1, 1), date(1, 14), 40.0).unwrap();
        assert_eq!(fortnight.total_days, 14);
        assert_eq!(fortnight.expected_base_hours, 80.0);
    }

    #[test]
    fn test_meta_keeps_stored_numbering() {
        let mut period = existing().remove(0);
        period.week_no = 52;
        let meta = PeriodMeta::from_period(&period, 40.0).unwrap();
        assert_eq!(meta.week_no, 52);
        assert_eq!(meta.payroll_id.as_deref(), Some("p-1"));
        assert!(meta.contains(date(1, 7)));
        assert!(!meta.contains(date(1, 8)));
    }

    #[test]
    fn test_meta_week_year_follows_iso_week() {
        let start = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        let meta = PeriodMeta::new(start, end, 40.0).unwrap();
        assert_eq!(meta.week_no, 1);
        assert_eq!(meta.week_year, 2025);
        assert_eq!(meta.month_no, 12);
        assert_eq!(meta.year, 2024);
    }
}
