//! Payroll computation engine.
//!
//! The `engine` module turns an employer's roster and the data fetched
//! for a payroll period into a [`BatchResult`]. It uses the [`rayon`]
//! crate to parallelise per-employee calculations across multiple CPU
//! cores. Results keep roster order, and one employee's failure never
//! hides the others' payslips.

use crate::adjustments::AdjustmentSources;
use crate::attendance::summarize;
use crate::calculator::Calculator;
use crate::models::{Employee, Payslip, PeriodicAttendance, RegularAttendance};
use crate::period::PeriodMeta;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Everything a payroll run reads for one employer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerData {
    pub roster: Vec<Employee>,
    #[serde(default)]
    pub regular_attendance: Vec<RegularAttendance>,
    #[serde(default)]
    pub periodic_attendance: Vec<PeriodicAttendance>,
    #[serde(default)]
    pub adjustments: AdjustmentSources,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeFailure {
    pub employee_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollStats {
    pub total_employees: usize,
    pub total_payroll: f64,
    pub average_salary: f64,
}

impl PayrollStats {
    pub fn from_payslips(payslips: &[Payslip]) -> Self {
        let total_employees = payslips.len();
        let total_payroll: f64 = payslips
            .iter()
            .map(|p| p.payroll_breakdown.net_payable)
            .sum();
        let average_salary = if total_employees == 0 {
            0.0
        } else {
            total_payroll / total_employees as f64
        };
        PayrollStats {
            total_employees,
            total_payroll,
            average_salary,
        }
    }
}

/// The outcome of a payroll run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub succeeded: Vec<Payslip>,
    pub failed: Vec<EmployeeFailure>,
    /// Employees with no approved attendance in the period.
    pub excluded: Vec<String>,
    pub stats: PayrollStats,
}

enum Outcome {
    Computed(Payslip),
    Excluded(String),
    Failed(EmployeeFailure),
}

/// Runs a payroll over every active employee of `data.roster`.
pub fn run_payroll(period: &PeriodMeta, data: &EmployerData, calculator: &Calculator) -> BatchResult {
    let threshold = calculator.settings().daily_threshold();

    let outcomes: Vec<Outcome> = data
        .roster
        .par_iter()
        .filter(|employee| employee.is_active())
        .map(|employee| {
            let Some(summary) = summarize(
                &employee.employee_id,
                &data.regular_attendance,
                &data.periodic_attendance,
                period,
                threshold,
            ) else {
                debug!("No approved attendance for {}; excluded", employee.employee_id);
                return Outcome::Excluded(employee.employee_id.clone());
            };
            let adjustments = data.adjustments.resolve(employee);
            match calculator.compute_for_employee(employee, &summary, &adjustments, period) {
                Ok(payslip) => Outcome::Computed(payslip),
                Err(err) => {
                    warn!("Payslip for {} failed: {}", employee.employee_id, err);
                    Outcome::Failed(EmployeeFailure {
                        employee_id: employee.employee_id.clone(),
                        error: err.to_string(),
                    })
                }
            }
        })
        .collect();

    let mut result = BatchResult::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Computed(payslip) => result.succeeded.push(payslip),
            Outcome::Excluded(id) => result.excluded.push(id),
            Outcome::Failed(failure) => result.failed.push(failure),
        }
    }
    result.stats = PayrollStats::from_payslips(&result.succeeded);
    info!(
        "Payroll {} to {}: {} payslips, {} excluded, {} failed, total {:.2}",
        period.start,
        period.end,
        result.succeeded.len(),
        result.excluded.len(),
        result.failed.len(),
        result.stats.total_payroll
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::PayrollSettings;
    use crate::models::{AttendanceStatus, EmployeeStatus, PayFrequency, PayType, WorkedHours};
    use crate::tax::{ContributionRates, TaxBracket, TaxConfiguration};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn calculator() -> Calculator {
        let mut paye = BTreeMap::new();
        paye.insert(
            PayFrequency::Weekly,
            vec![TaxBracket { min: 0.0, max: Some(100_000.0), rate: 0.0, subtract: 0.0 }],
        );
        let tax = TaxConfiguration {
            acc: ContributionRates { employee: 1.0, employer: 1.0 },
            npf: ContributionRates { employee: 10.0, employer: 10.0 },
            paye,
        };
        Calculator::new(PayrollSettings::default(), tax)
    }

    fn employee(id: &str, frequency: PayFrequency) -> Employee {
        Employee {
            employee_id: id.into(),
            client_id: "5".into(),
            name: format!("Employee {}", id),
            email: format!("{}@example.com", id),
            pay_type: PayType::Hour,
            rate_per_hour: 20.0,
            pay_frequency: frequency,
            allowances: vec![],
            deductions: vec![],
            status: EmployeeStatus::Active,
        }
    }

    fn punch(id: &str, day: u32, hours: f64) -> RegularAttendance {
        RegularAttendance {
            employee_id: id.into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            total_working_hours: WorkedHours::Numeric(hours),
            status: AttendanceStatus::Approved,
            overtime_hours: None,
        }
    }

    fn week() -> PeriodMeta {
        PeriodMeta::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            40.0,
        )
        .unwrap()
    }

    #[test]
    fn test_results_follow_roster_order_and_exclude_absentees() {
        let mut inactive = employee("5-4", PayFrequency::Weekly);
        inactive.status = EmployeeStatus::Inactive;
        let data = EmployerData {
            roster: vec![
                employee("5-3", PayFrequency::Weekly),
                employee("5-1", PayFrequency::Weekly),
                employee("5-2", PayFrequency::Weekly),
                inactive,
            ],
            regular_attendance: vec![
                punch("5-3", 2, 8.0),
                punch("5-2", 3, 10.0),
                punch("5-4", 3, 10.0),
            ],
            ..EmployerData::default()
        };

        let result = run_payroll(&week(), &data, &calculator());
        let ids: Vec<&str> = result.succeeded.iter().map(|p| p.employee_id.as_str()).collect();
        assert_eq!(ids, vec!["5-3", "5-2"]);
        assert_eq!(result.excluded, vec!["5-1".to_string()]);
        assert_eq!(result.stats.total_employees, 2);
    }

    #[test]
    fn test_failures_are_reported_per_employee() {
        let data = EmployerData {
            roster: vec![
                employee("5-1", PayFrequency::Monthly),
                employee("5-2", PayFrequency::Weekly),
            ],
            regular_attendance: vec![punch("5-1", 2, 8.0), punch("5-2", 2, 8.0)],
            ..EmployerData::default()
        };

        let result = run_payroll(&week(), &data, &calculator());
        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].employee_id, "5-1");
        assert_eq!(result.stats.total_employees, 1);
    }

    #[test]
    fn test_stats() {
        let data = EmployerData {
            roster: vec![
                employee("5-1", PayFrequency::Weekly),
                employee("5-2", PayFrequency::Weekly),
            ],
            regular_attendance: vec![punch("5-1", 2, 10.0), punch("5-2", 2, 20.0)],
            ..EmployerData::default()
        };
        let result = run_payroll(&week(), &data, &calculator());
        // 200 and 400 base, 11% withheld
        assert!((result.stats.total_payroll - 534.0).abs() < 1e-9);
        assert!((result.stats.average_salary - 267.0).abs() < 1e-9);
        assert_eq!(PayrollStats::from_payslips(&[]).average_salary, 0.0);
    }
}
