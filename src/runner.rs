//! Fetch-and-compute driver for a payroll period.
//!
//! `PayrollRunner` pulls everything a run needs from a
//! [`PayrollSource`], hands it to [`engine::run_payroll`], and later
//! persists approved payslips. Only one run may be in flight at a time.

use crate::adjustments::AdjustmentSources;
use crate::calculator::Calculator;
use crate::client::PayrollSource;
use crate::engine::{self, BatchResult, EmployeeFailure, EmployerData};
use crate::error::PayrollError;
use crate::models::{PayrollPeriod, Payslip};
use crate::period::PeriodMeta;
use futures_util::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Failed(String),
}

/// Marks the runner busy for its lifetime. Dropping it without calling
/// `finish` (a cancelled run) leaves the runner `Failed`.
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
    finished: bool,
}

impl<'a> RunGuard<'a> {
    fn acquire(state: &'a Mutex<RunState>) -> Result<Self, PayrollError> {
        let mut current = state.lock().unwrap_or_else(|e| e.into_inner());
        if *current == RunState::Running {
            return Err(PayrollError::RunInProgress);
        }
        *current = RunState::Running;
        Ok(RunGuard {
            state,
            finished: false,
        })
    }

    fn finish(mut self, outcome: RunState) {
        self.set(outcome);
        self.finished = true;
    }

    fn set(&self, next: RunState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.set(RunState::Failed("run cancelled".to_string()));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Complete,
    Partial,
    Failed,
}

/// Which payslips were stored. A partial outcome needs the failed
/// remainder resubmitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    pub persisted: Vec<String>,
    pub failed: Vec<EmployeeFailure>,
}

impl ApprovalOutcome {
    pub fn status(&self) -> ApprovalStatus {
        match (self.persisted.is_empty(), self.failed.is_empty()) {
            (_, true) => ApprovalStatus::Complete,
            (true, false) => ApprovalStatus::Failed,
            (false, false) => ApprovalStatus::Partial,
        }
    }
}

pub struct PayrollRunner<S> {
    source: Arc<S>,
    calculator: Arc<Calculator>,
    state: Mutex<RunState>,
}

impl<S: PayrollSource + 'static> PayrollRunner<S> {
    pub fn new(source: Arc<S>, calculator: Arc<Calculator>) -> Self {
        PayrollRunner {
            source,
            calculator,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn calculator(&self) -> &Calculator {
        &self.calculator
    }

    pub fn state(&self) -> RunState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Computes payslips for `period`. Any upstream failure other than
    /// a missing attendance record aborts the run.
    pub async fn run(
        &self,
        employer_id: &str,
        period: &PayrollPeriod,
    ) -> Result<BatchResult, PayrollError> {
        let guard = RunGuard::acquire(&self.state)?;
        let result = self.run_inner(employer_id, period).await;
        match &result {
            Ok(_) => guard.finish(RunState::Idle),
            Err(err) => {
                error!("Payroll run for {} failed: {}", employer_id, err);
                guard.finish(RunState::Failed(err.to_string()));
            }
        }
        result
    }

    async fn run_inner(
        &self,
        employer_id: &str,
        period: &PayrollPeriod,
    ) -> Result<BatchResult, PayrollError> {
        let meta = PeriodMeta::from_period(period, self.calculator.settings().base_hours_per_week)?;
        info!(
            "Starting payroll {} for employer {} ({} to {})",
            period.payroll_id, employer_id, meta.start, meta.end
        );

        let source = &*self.source;
        let (
            roster,
            periodic_attendance,
            allowance_catalog,
            deduction_catalog,
            allowance_overrides,
            deduction_overrides,
        ) = tokio::try_join!(
            source.roster(employer_id),
            source.periodic_attendance(employer_id),
            source.allowance_catalog(employer_id),
            source.deduction_catalog(employer_id),
            source.allowance_overrides(&period.payroll_id),
            source.deduction_overrides(&period.payroll_id),
        )?;

        let active: Vec<_> = roster.into_iter().filter(|e| e.is_active()).collect();
        let attendance = try_join_all(
            active
                .iter()
                .map(|employee| source.regular_attendance(&employee.employee_id)),
        )
        .await?;
        let regular_attendance = attendance.into_iter().flatten().flatten().collect();

        let data = EmployerData {
            roster: active,
            regular_attendance,
            periodic_attendance,
            adjustments: AdjustmentSources {
                allowance_catalog,
                deduction_catalog,
                allowance_overrides,
                deduction_overrides,
            },
        };

        let calculator = Arc::clone(&self.calculator);
        tokio::task::spawn_blocking(move || engine::run_payroll(&meta, &data, &calculator))
            .await
            .map_err(|e| PayrollError::Internal(e.to_string()))
    }

    /// Persists every payslip concurrently. There is no rollback: the
    /// outcome lists what was stored and what was not.
    pub async fn approve(&self, payslips: &[Payslip]) -> ApprovalOutcome {
        let results = join_all(payslips.iter().map(|p| self.source.save_payslip(p))).await;

        let mut outcome = ApprovalOutcome::default();
        for (payslip, result) in payslips.iter().zip(results) {
            match result {
                Ok(()) => outcome.persisted.push(payslip.employee_id.clone()),
                Err(err) => {
                    warn!("Saving payslip for {} failed: {}", payslip.employee_id, err);
                    outcome.failed.push(EmployeeFailure {
                        employee_id: payslip.employee_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        info!(
            "Approved {} of {} payslips",
            outcome.persisted.len(),
            payslips.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejects_reentry_and_resets() {
        let state = Mutex::new(RunState::Idle);
        let guard = RunGuard::acquire(&state).unwrap();
        assert!(matches!(
            RunGuard::acquire(&state),
            Err(PayrollError::RunInProgress)
        ));
        guard.finish(RunState::Idle);
        assert_eq!(*state.lock().unwrap(), RunState::Idle);
    }

    #[test]
    fn test_dropped_guard_marks_run_failed() {
        let state = Mutex::new(RunState::Idle);
        {
            let _guard = RunGuard::acquire(&state).unwrap();
        }
        assert_eq!(
            *state.lock().unwrap(),
            RunState::Failed("run cancelled".to_string())
        );
        assert!(RunGuard::acquire(&state).is_ok());
    }

    #[test]
    fn test_approval_status() {
        let failure = EmployeeFailure {
            employee_id: "1-1".into(),
            error: "boom".into(),
        };
        let mut outcome = ApprovalOutcome::default();
        assert_eq!(outcome.status(), ApprovalStatus::Complete);
        outcome.failed.push(failure);
        assert_eq!(outcome.status(), ApprovalStatus::Failed);
        outcome.persisted.push("1-2".into());
        assert_eq!(outcome.status(), ApprovalStatus::Partial);
    }
}
