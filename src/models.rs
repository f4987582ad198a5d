//! Data models for the Payroll Engine.
//!
//! The `models` module defines the serialisable records exchanged with
//! the upstream HR backend: employees, allowance and deduction catalog
//! entries, per-payroll overrides, payroll periods, attendance records
//! and the payslips produced by a payroll run. Wire names follow the
//! backend's camelCase JSON.

use crate::parse::convert_to_total_hours;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// How an employee's `rate_per_hour` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayType {
    /// `rate_per_hour` is a salary figure per week.
    Salary,
    /// `rate_per_hour` is an hourly rate applied to attended hours.
    Hour,
}

/// How often an employee is paid. Selects the PAYE bracket table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PayFrequency {
    Weekly,
    Fortnightly,
    Monthly,
}

/// Employees are never deleted, only flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
}

/// Represents an employee on an employer's roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    /// Tenant-scoped identifier of the form `"<clientNum>-<seq>"`.
    pub employee_id: String,
    /// The employer this employee belongs to.
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub pay_type: PayType,
    /// Hourly rate for `HOUR` employees, weekly salary figure for
    /// `SALARY` employees. Non-numeric values read as zero.
    #[serde(default, deserialize_with = "lenient_number")]
    pub rate_per_hour: f64,
    pub pay_frequency: PayFrequency,
    /// Ids into the employer's allowance catalog.
    #[serde(default)]
    pub allowances: Vec<String>,
    /// Ids into the employer's deduction catalog.
    #[serde(default)]
    pub deductions: Vec<String>,
    #[serde(default)]
    pub status: EmployeeStatus,
}

impl Employee {
    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }
}

/// An allowance or deduction catalog entry.
///
/// `rate` is either a flat amount (`"50"`) or a percentage of base
/// salary (`"10%"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rate: String,
    #[serde(default)]
    pub description: String,
}

/// A one-off allowance or deduction attached to a single payroll run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollOverride {
    pub employee_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rate: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payroll_id: Option<String>,
}

/// An administrator-defined payroll window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollPeriod {
    #[serde(alias = "payroll_id", alias = "_id")]
    pub payroll_id: String,
    #[serde(alias = "date_from")]
    pub date_from: NaiveDate,
    #[serde(alias = "date_to")]
    pub date_to: NaiveDate,
    #[serde(default, alias = "week_no")]
    pub week_no: u32,
    #[serde(default, alias = "month_no")]
    pub month_no: u32,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub is_processed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Pending,
    Approved,
    Rejected,
}

/// Worked hours as the backend stores them: either a number or a
/// `"Xh Ym"` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkedHours {
    Numeric(f64),
    Text(String),
}

impl WorkedHours {
    pub fn hours(&self) -> f64 {
        match self {
            WorkedHours::Numeric(h) if h.is_finite() => *h,
            WorkedHours::Numeric(_) => 0.0,
            WorkedHours::Text(s) => convert_to_total_hours(s),
        }
    }
}

impl Default for WorkedHours {
    fn default() -> Self {
        WorkedHours::Numeric(0.0)
    }
}

/// A single day's punch record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularAttendance {
    pub employee_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub total_working_hours: WorkedHours,
    pub status: AttendanceStatus,
    #[serde(default, alias = "overtime_hours")]
    pub overtime_hours: Option<f64>,
}

/// A block attendance entry covering a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicAttendance {
    pub employee_id: String,
    /// `"<start> to <end>"`.
    pub date_range: String,
    #[serde(default)]
    pub total_working_hours: WorkedHours,
    #[serde(default)]
    pub total_break_hours: WorkedHours,
    #[serde(default, deserialize_with = "lenient_number")]
    pub leaves: f64,
    pub status: AttendanceStatus,
}

/// Hours attributed to one employee for one payroll window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_work_hours: f64,
    pub overtime_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPeriodDetails {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i64,
    pub expected_base_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkDetails {
    pub total_work_hours: f64,
    pub overtime_hours: f64,
    pub hourly_rate: f64,
    pub overtime_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionBreakdown {
    pub paye: f64,
    pub acc: f64,
    pub npf: f64,
    pub other: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerContributions {
    pub acc: f64,
    pub npf: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollBreakdown {
    pub base_salary: f64,
    pub allowances: f64,
    pub deductions: DeductionBreakdown,
    pub employer_contributions: EmployerContributions,
    pub overtime_pay: f64,
    pub net_payable: f64,
}

/// One employee's computed pay for one payroll period.
///
/// `settings_snapshot` records the settings and tax tables the figures
/// were computed with, so a payslip can be reproduced later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payslip {
    pub employee_id: String,
    pub employee_name: String,
    pub employee_email: String,
    pub pay_type: PayType,
    #[serde(default)]
    pub payroll_id: Option<String>,
    pub week_no: u32,
    pub month_no: u32,
    pub year: i32,
    /// ISO week-numbering year that `week_no` belongs to.
    #[serde(default)]
    pub week_year: i32,
    pub pay_period_details: PayPeriodDetails,
    pub work_details: WorkDetails,
    pub payroll_breakdown: PayrollBreakdown,
    #[serde(default)]
    pub settings_snapshot: Value,
}

impl Payslip {
    /// Year to pair with `week_no`. Payslips stored before `week_year`
    /// existed fall back to `year`.
    pub fn week_numbering_year(&self) -> i32 {
        if self.week_year > 0 {
            self.week_year
        } else {
            self.year
        }
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_employee_rate_accepts_strings_and_garbage() {
        let employee: Employee = serde_json::from_value(json!({
            "employeeId": "12-1",
            "payType": "HOUR",
            "ratePerHour": "22.5",
            "payFrequency": "Weekly"
        }))
        .unwrap();
        assert_eq!(employee.rate_per_hour, 22.5);
        assert!(employee.is_active());

        let employee: Employee = serde_json::from_value(json!({
            "employeeId": "12-2",
            "payType": "SALARY",
            "ratePerHour": "n/a",
            "payFrequency": "Monthly",
            "status": "inactive"
        }))
        .unwrap();
        assert_eq!(employee.rate_per_hour, 0.0);
        assert!(!employee.is_active());
    }

    #[test]
    fn test_worked_hours_reads_both_shapes() {
        let numeric: WorkedHours = serde_json::from_value(json!(8)).unwrap();
        let text: WorkedHours = serde_json::from_value(json!("7h 30m")).unwrap();
        assert_eq!(numeric.hours(), 8.0);
        assert_eq!(text.hours(), 7.5);
    }

    #[test]
    fn test_payroll_period_accepts_snake_case_fields() {
        let period: PayrollPeriod = serde_json::from_value(json!({
            "payroll_id": "p-1",
            "date_from": "2024-01-01",
            "date_to": "2024-01-07",
            "week_no": 1,
            "month_no": 1,
            "year": 2024
        }))
        .unwrap();
        assert_eq!(period.payroll_id, "p-1");
        assert_eq!(period.date_to, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        assert!(!period.is_processed);
    }
}
