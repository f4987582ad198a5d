//! Resolution of an employee's allowances and deductions.
//!
//! Standing catalog entries referenced by the employee are combined
//! with the one-off overrides recorded against the current payroll run
//! into a single `EffectiveAdjustments` record.

use crate::models::{CatalogItem, Employee, PayrollOverride};
use crate::parse::calculate_adjustments;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentSource {
    Catalog,
    Override,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedAdjustment {
    pub description: String,
    pub rate: String,
    pub source: AdjustmentSource,
}

/// The allowances and deductions that apply to one employee in one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveAdjustments {
    pub allowances: Vec<AppliedAdjustment>,
    pub deductions: Vec<AppliedAdjustment>,
}

impl EffectiveAdjustments {
    pub fn total_allowances(&self, base_salary: f64) -> f64 {
        calculate_adjustments(self.allowances.iter().map(|a| a.rate.as_str()), base_salary)
    }

    pub fn total_deductions(&self, base_salary: f64) -> f64 {
        calculate_adjustments(self.deductions.iter().map(|d| d.rate.as_str()), base_salary)
    }
}

/// Employer-wide catalogs and the overrides for the run being processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentSources {
    #[serde(default)]
    pub allowance_catalog: Vec<CatalogItem>,
    #[serde(default)]
    pub deduction_catalog: Vec<CatalogItem>,
    #[serde(default)]
    pub allowance_overrides: Vec<PayrollOverride>,
    #[serde(default)]
    pub deduction_overrides: Vec<PayrollOverride>,
}

impl AdjustmentSources {
    /// Produces the adjustments for `employee`. Catalog ids that no
    /// longer resolve are skipped.
    pub fn resolve(&self, employee: &Employee) -> EffectiveAdjustments {
        EffectiveAdjustments {
            allowances: merge(
                employee,
                &employee.allowances,
                &self.allowance_catalog,
                &self.allowance_overrides,
                "allowance",
            ),
            deductions: merge(
                employee,
                &employee.deductions,
                &self.deduction_catalog,
                &self.deduction_overrides,
                "deduction",
            ),
        }
    }
}

fn merge(
    employee: &Employee,
    ids: &[String],
    catalog: &[CatalogItem],
    overrides: &[PayrollOverride],
    kind: &str,
) -> Vec<AppliedAdjustment> {
    let mut applied = Vec::with_capacity(ids.len());
    for id in ids {
        match catalog.iter().find(|item| &item.id == id) {
            Some(item) => applied.push(AppliedAdjustment {
                description: item.description.clone(),
                rate: item.rate.clone(),
                source: AdjustmentSource::Catalog,
            }),
            None => warn!(
                "Employee {} references unknown {} {}",
                employee.employee_id, kind, id
            ),
        }
    }
    applied.extend(
        overrides
            .iter()
            .filter(|o| o.employee_id == employee.employee_id)
            .map(|o| AppliedAdjustment {
                description: o.description.clone(),
                rate: o.rate.clone(),
                source: AdjustmentSource::Override,
            }),
    );
    applied
}
