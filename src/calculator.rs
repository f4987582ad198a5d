//! Per-employee compensation calculation.
//!
//! `Calculator` turns an employee, their attendance summary and their
//! effective adjustments into a [`Payslip`]. It holds no mutable state,
//! so one instance is shared across every employee of a run.

use crate::adjustments::EffectiveAdjustments;
use crate::error::CalculationError;
use crate::models::{
    AttendanceSummary, DeductionBreakdown, Employee, EmployerContributions, PayPeriodDetails,
    PayType, PayrollBreakdown, Payslip, WorkDetails,
};
use crate::period::PeriodMeta;
use crate::tax::{PayeCalculator, SingleBracketPaye, TaxConfiguration};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Tunable constants of the pay calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayrollSettings {
    pub base_hours_per_week: f64,
    pub weekly_multiplier: f64,
    pub fortnightly_multiplier: f64,
    pub monthly_multiplier: f64,
    pub overtime_multiplier: f64,
    /// Per-day hours above which regular attendance counts as overtime.
    /// Falls back to `base_hours_per_week` when unset.
    pub daily_overtime_threshold: Option<f64>,
}

impl Default for PayrollSettings {
    fn default() -> Self {
        PayrollSettings {
            base_hours_per_week: 40.0,
            weekly_multiplier: 1.0,
            fortnightly_multiplier: 2.0,
            monthly_multiplier: 4.33,
            overtime_multiplier: 1.5,
            daily_overtime_threshold: None,
        }
    }
}

impl PayrollSettings {
    pub fn daily_threshold(&self) -> f64 {
        self.daily_overtime_threshold.unwrap_or(self.base_hours_per_week)
    }

    /// Number of weekly salaries paid for a period of `total_days`.
    pub fn period_multiplier(&self, total_days: i64) -> f64 {
        if total_days <= 7 {
            self.weekly_multiplier
        } else if total_days <= 14 {
            self.fortnightly_multiplier
        } else {
            self.monthly_multiplier
        }
    }
}

pub struct Calculator {
    settings: PayrollSettings,
    tax: TaxConfiguration,
    paye: Arc<dyn PayeCalculator>,
    snapshot: Value,
}

impl Calculator {
    /// Builds a calculator using the single-bracket PAYE formula.
    pub fn new(settings: PayrollSettings, tax: TaxConfiguration) -> Self {
        Self::with_paye(settings, tax, Arc::new(SingleBracketPaye))
    }

    pub fn with_paye(
        settings: PayrollSettings,
        tax: TaxConfiguration,
        paye: Arc<dyn PayeCalculator>,
    ) -> Self {
        let snapshot = json!({
            "settings": settings,
            "tax": tax,
            "payeMethod": paye.name(),
        });
        Calculator {
            settings,
            tax,
            paye,
            snapshot,
        }
    }

    pub fn settings(&self) -> &PayrollSettings {
        &self.settings
    }

    pub fn tax(&self) -> &TaxConfiguration {
        &self.tax
    }

    pub fn compute_for_employee(
        &self,
        employee: &Employee,
        summary: &AttendanceSummary,
        adjustments: &EffectiveAdjustments,
        period: &PeriodMeta,
    ) -> Result<Payslip, CalculationError> {
        let settings = &self.settings;
        if settings.base_hours_per_week.is_nan() || settings.base_hours_per_week <= 0.0 {
            return Err(CalculationError::InvalidBaseHours(settings.base_hours_per_week));
        }
        let brackets = self
            .tax
            .brackets(employee.pay_frequency)
            .ok_or(CalculationError::MissingBrackets(employee.pay_frequency))?;

        let rate = if employee.rate_per_hour.is_finite() {
            employee.rate_per_hour
        } else {
            0.0
        };
        let (base_salary, hourly_rate) = match employee.pay_type {
            PayType::Salary => (
                rate * settings.period_multiplier(period.total_days),
                rate / settings.base_hours_per_week,
            ),
            // Hours past the expected base are paid as overtime only.
            PayType::Hour => (
                summary.total_work_hours.min(period.expected_base_hours) * rate,
                rate,
            ),
        };

        let overtime_rate = hourly_rate * settings.overtime_multiplier;
        let overtime_pay = summary.overtime_hours * overtime_rate;

        let allowances = adjustments.total_allowances(base_salary);
        let other = adjustments.total_deductions(base_salary);

        let paye = self.paye.calculate(base_salary, brackets);
        let acc = self.tax.acc.employee_share(base_salary);
        let npf = self.tax.npf.employee_share(base_salary);
        let acc_employer = self.tax.acc.employer_share(base_salary);
        let npf_employer = self.tax.npf.employer_share(base_salary);

        let total_deductions = paye + acc + npf + other;
        let net_payable = base_salary + allowances + overtime_pay - total_deductions;

        Ok(Payslip {
            employee_id: employee.employee_id.clone(),
            employee_name: employee.name.clone(),
            employee_email: employee.email.clone(),
            pay_type: employee.pay_type,
            payroll_id: period.payroll_id.clone(),
            week_no: period.week_no,
            month_no: period.month_no,
            year: period.year,
            week_year: period.week_year,
            pay_period_details: PayPeriodDetails {
                start_date: period.start,
                end_date: period.end,
                total_days: period.total_days,
                expected_base_hours: period.expected_base_hours,
            },
            work_details: WorkDetails {
                total_work_hours: summary.total_work_hours,
                overtime_hours: summary.overtime_hours,
                hourly_rate,
                overtime_rate,
            },
            payroll_breakdown: PayrollBreakdown {
                base_salary,
                allowances,
                deductions: DeductionBreakdown {
                    paye,
                    acc,
                    npf,
                    other,
                    total: total_deductions,
                },
                employer_contributions: EmployerContributions {
                    acc: acc_employer,
                    npf: npf_employer,
                    total: acc_employer + npf_employer,
                },
                overtime_pay,
                net_payable,
            },
            settings_snapshot: self.snapshot.clone(),
        })
    }
}
