//! Attendance aggregation for a payroll window.
//!
//! Daily punch records are preferred; block (periodic) records are only
//! consulted when an employee has no approved daily records in the
//! window. An employee with neither is left out of the run.

use crate::models::{AttendanceStatus, AttendanceSummary, PeriodicAttendance, RegularAttendance};
use crate::parse::parse_date_range;
use crate::period::PeriodMeta;

/// Summarises one employee's approved hours inside `period`.
///
/// `daily_overtime_threshold` is the per-day comparator for regular
/// records. Hours of either kind beyond the window's expected base hours
/// are reported as overtime, never as work hours. Returns `None` when no
/// approved record falls in the window.
pub fn summarize(
    employee_id: &str,
    regular: &[RegularAttendance],
    periodic: &[PeriodicAttendance],
    period: &PeriodMeta,
    daily_overtime_threshold: f64,
) -> Option<AttendanceSummary> {
    let daily: Vec<&RegularAttendance> = regular
        .iter()
        .filter(|r| {
            r.employee_id == employee_id
                && r.status == AttendanceStatus::Approved
                && period.contains(r.date)
        })
        .collect();
    if !daily.is_empty() {
        return Some(sum_regular(
            &daily,
            daily_overtime_threshold,
            period.expected_base_hours,
        ));
    }

    let blocks: Vec<&PeriodicAttendance> = periodic
        .iter()
        .filter(|p| {
            p.employee_id == employee_id
                && p.status == AttendanceStatus::Approved
                && parse_date_range(&p.date_range)
                    .map(|(start, end)| period.contains(start) && period.contains(end))
                    .unwrap_or(false)
        })
        .collect();
    if !blocks.is_empty() {
        return Some(sum_periodic(&blocks, period.expected_base_hours));
    }

    None
}

fn sum_regular(
    records: &[&RegularAttendance],
    threshold: f64,
    expected_base_hours: f64,
) -> AttendanceSummary {
    let (regular, mut overtime) = records.iter().fold((0.0, 0.0), |(regular, overtime), record| {
        let hours = record.total_working_hours.hours();
        let daily_excess = (hours - threshold).max(0.0);
        let extra = record.overtime_hours.filter(|h| h.is_finite()).unwrap_or(0.0);
        (regular + hours - daily_excess, overtime + daily_excess + extra)
    });
    // Regular hours past the window's expected base spill into overtime.
    overtime += (regular - expected_base_hours).max(0.0);
    AttendanceSummary {
        total_work_hours: regular.min(expected_base_hours),
        overtime_hours: overtime,
    }
}

fn sum_periodic(records: &[&PeriodicAttendance], expected_base_hours: f64) -> AttendanceSummary {
    records
        .iter()
        .fold(AttendanceSummary::default(), |mut acc, record| {
            let hours = record.total_working_hours.hours();
            acc.total_work_hours += hours.min(expected_base_hours);
            acc.overtime_hours += (hours - expected_base_hours).max(0.0);
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkedHours;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn week() -> PeriodMeta {
        PeriodMeta::new(date(1), date(7), 40.0).unwrap()
    }

    fn punch(employee: &str, d: u32, hours: &str, status: AttendanceStatus) -> RegularAttendance {
        RegularAttendance {
            employee_id: employee.into(),
            date: date(d),
            total_working_hours: WorkedHours::Text(hours.into()),
            status,
            overtime_hours: None,
        }
    }

    fn block(employee: &str, range: &str, hours: f64) -> PeriodicAttendance {
        PeriodicAttendance {
            employee_id: employee.into(),
            date_range: range.into(),
            total_working_hours: WorkedHours::Numeric(hours),
            total_break_hours: WorkedHours::default(),
            leaves: 0.0,
            status: AttendanceStatus::Approved,
        }
    }

    #[test]
    fn test_regular_records_sum_approved_days_in_window() {
        let mut records = vec![
            punch("1-1", 1, "8h 30m", AttendanceStatus::Approved),
            punch("1-1", 2, "8", AttendanceStatus::Approved),
            punch("1-1", 3, "9", AttendanceStatus::Pending),
            punch("1-1", 9, "9", AttendanceStatus::Approved),
            punch("1-2", 2, "9", AttendanceStatus::Approved),
        ];
        records[1].overtime_hours = Some(2.0);

        let summary = summarize("1-1", &records, &[], &week(), 40.0).unwrap();
        assert_eq!(summary.total_work_hours, 16.5);
        assert_eq!(summary.overtime_hours, 2.0);
    }

    #[test]
    fn test_daily_threshold_is_injectable() {
        let records = vec![
            punch("1-1", 1, "10", AttendanceStatus::Approved),
            punch("1-1", 2, "9", AttendanceStatus::Approved),
        ];
        let summary = summarize("1-1", &records, &[], &week(), 8.0).unwrap();
        assert_eq!(summary.overtime_hours, 3.0);
        assert_eq!(summary.total_work_hours, 16.0);

        let summary = summarize("1-1", &records, &[], &week(), 40.0).unwrap();
        assert_eq!(summary.overtime_hours, 0.0);
    }

    #[test]
    fn test_periodic_records_are_capped_at_expected_hours() {
        let blocks = vec![block("1-1", "2024-01-01 to 2024-01-07", 45.0)];
        let summary = summarize("1-1", &[], &blocks, &week(), 40.0).unwrap();
        assert_eq!(summary.total_work_hours, 40.0);
        assert_eq!(summary.overtime_hours, 5.0);
    }

    #[test]
    fn test_regular_hours_past_expected_base_become_overtime() {
        let records: Vec<_> = (1..=5)
            .map(|d| punch("1-1", d, "9", AttendanceStatus::Approved))
            .collect();
        let summary = summarize("1-1", &records, &[], &week(), 40.0).unwrap();
        assert_eq!(summary.total_work_hours, 40.0);
        assert_eq!(summary.overtime_hours, 5.0);
    }

    #[test]
    fn test_daily_and_weekly_overtime_are_not_counted_twice() {
        let records: Vec<_> = (1..=5)
            .map(|d| punch("1-1", d, "10", AttendanceStatus::Approved))
            .collect();
        // 2h a day over the 8h threshold; the remaining 40h fit the base.
        let summary = summarize("1-1", &records, &[], &week(), 8.0).unwrap();
        assert_eq!(summary.total_work_hours, 40.0);
        assert_eq!(summary.overtime_hours, 10.0);
    }

    #[test]
    fn test_regular_records_win_over_periodic() {
        let records = vec![punch("1-1", 2, "6", AttendanceStatus::Approved)];
        let blocks = vec![block("1-1", "2024-01-01 to 2024-01-07", 45.0)];
        let summary = summarize("1-1", &records, &blocks, &week(), 40.0).unwrap();
        assert_eq!(summary.total_work_hours, 6.0);
    }

    #[test]
    fn test_blocks_outside_the_window_are_ignored() {
        let blocks = vec![
            block("1-1", "2023-12-30 to 2024-01-05", 30.0),
            block("1-1", "not a range", 30.0),
        ];
        assert!(summarize("1-1", &[], &blocks, &week(), 40.0).is_none());
    }

    #[test]
    fn test_no_attendance_excludes_employee() {
        let records = vec![punch("1-1", 2, "8", AttendanceStatus::Rejected)];
        assert!(summarize("1-1", &records, &[], &week(), 40.0).is_none());
    }
}
