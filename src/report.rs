//! Regrouping of stored payslips for reports and export.

use crate::models::{DeductionBreakdown, EmployerContributions, PayrollBreakdown, Payslip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Weekly,
    Fortnightly,
    Monthly,
}

/// One employee's totals for one week, fortnight or month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRecord {
    pub employee_id: String,
    pub employee_name: String,
    pub period_type: ReportPeriod,
    pub year: i32,
    /// Week number, fortnight number (`ceil(week / 2)`) or month number.
    pub bucket: u32,
    pub payslip_count: usize,
    pub base_salary: f64,
    pub allowances: f64,
    pub overtime_pay: f64,
    pub deductions: DeductionBreakdown,
    pub employer_contributions: EmployerContributions,
    pub net_payable: f64,
}

type BucketKey = (String, i32, u32);

/// Groups payslips by employee and period bucket, summing every
/// breakdown field. Rows are ordered by employee, year, then bucket.
pub fn aggregate(payslips: &[Payslip], period: ReportPeriod) -> Vec<AggregatedRecord> {
    let rows = match period {
        ReportPeriod::Weekly => group(payslips, ReportPeriod::Weekly, week_bucket),
        ReportPeriod::Monthly => group(payslips, ReportPeriod::Monthly, |p| (p.year, p.month_no)),
        ReportPeriod::Fortnightly => {
            let weekly = group(payslips, ReportPeriod::Weekly, week_bucket);
            merge_fortnights(weekly)
        }
    };
    rows.into_values().map(round_record).collect()
}

/// Week buckets are keyed by the ISO week-numbering year, so the week
/// starting 2024-12-30 lands in week 1 of 2025.
fn week_bucket(payslip: &Payslip) -> (i32, u32) {
    (payslip.week_numbering_year(), payslip.week_no)
}

fn group<F>(payslips: &[Payslip], period: ReportPeriod, bucket_of: F) -> BTreeMap<BucketKey, AggregatedRecord>
where
    F: Fn(&Payslip) -> (i32, u32),
{
    let mut rows: BTreeMap<BucketKey, AggregatedRecord> = BTreeMap::new();
    for payslip in payslips {
        let (year, bucket) = bucket_of(payslip);
        let key = (payslip.employee_id.clone(), year, bucket);
        let row = rows.entry(key).or_insert_with(|| AggregatedRecord {
            employee_id: payslip.employee_id.clone(),
            employee_name: payslip.employee_name.clone(),
            period_type: period,
            year,
            bucket,
            payslip_count: 0,
            base_salary: 0.0,
            allowances: 0.0,
            overtime_pay: 0.0,
            deductions: DeductionBreakdown::default(),
            employer_contributions: EmployerContributions::default(),
            net_payable: 0.0,
        });
        row.add_breakdown(&payslip.payroll_breakdown, 1);
    }
    rows
}

fn merge_fortnights(
    weekly: BTreeMap<BucketKey, AggregatedRecord>,
) -> BTreeMap<BucketKey, AggregatedRecord> {
    let mut rows: BTreeMap<BucketKey, AggregatedRecord> = BTreeMap::new();
    for ((employee_id, year, week), week_row) in weekly {
        let fortnight = week.div_ceil(2);
        match rows.get_mut(&(employee_id.clone(), year, fortnight)) {
            Some(row) => row.add_record(&week_row),
            None => {
                let mut row = week_row;
                row.period_type = ReportPeriod::Fortnightly;
                row.bucket = fortnight;
                rows.insert((employee_id, year, fortnight), row);
            }
        }
    }
    rows
}

impl AggregatedRecord {
    fn add_breakdown(&mut self, b: &PayrollBreakdown, count: usize) {
        self.payslip_count += count;
        self.base_salary += b.base_salary;
        self.allowances += b.allowances;
        self.overtime_pay += b.overtime_pay;
        self.deductions.paye += b.deductions.paye;
        self.deductions.acc += b.deductions.acc;
        self.deductions.npf += b.deductions.npf;
        self.deductions.other += b.deductions.other;
        self.deductions.total += b.deductions.total;
        self.employer_contributions.acc += b.employer_contributions.acc;
        self.employer_contributions.npf += b.employer_contributions.npf;
        self.employer_contributions.total += b.employer_contributions.total;
        self.net_payable += b.net_payable;
    }

    fn add_record(&mut self, other: &AggregatedRecord) {
        let breakdown = PayrollBreakdown {
            base_salary: other.base_salary,
            allowances: other.allowances,
            deductions: other.deductions,
            employer_contributions: other.employer_contributions,
            overtime_pay: other.overtime_pay,
            net_payable: other.net_payable,
        };
        self.add_breakdown(&breakdown, other.payslip_count);
    }
}

/// Rounds to whole cents.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round_record(mut row: AggregatedRecord) -> AggregatedRecord {
    row.base_salary = round_currency(row.base_salary);
    row.allowances = round_currency(row.allowances);
    row.overtime_pay = round_currency(row.overtime_pay);
    row.net_payable = round_currency(row.net_payable);
    let d = &mut row.deductions;
    d.paye = round_currency(d.paye);
    d.acc = round_currency(d.acc);
    d.npf = round_currency(d.npf);
    d.other = round_currency(d.other);
    d.total = round_currency(d.total);
    let e = &mut row.employer_contributions;
    e.acc = round_currency(e.acc);
    e.npf = round_currency(e.npf);
    e.total = round_currency(e.total);
    row
}
