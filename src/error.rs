//! Error types shared across a payroll run.

use crate::client::ClientError;
use crate::models::PayFrequency;
use crate::period::PeriodError;
use thiserror::Error;

/// Failure computing a single employee's payslip.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculationError {
    #[error("no PAYE brackets configured for {0:?}")]
    MissingBrackets(PayFrequency),

    #[error("base hours per week must be positive, got {0}")]
    InvalidBaseHours(f64),
}

/// Failure of a payroll run as a whole.
#[derive(Error, Debug)]
pub enum PayrollError {
    #[error("upstream request failed")]
    Source(#[from] ClientError),

    #[error("invalid payroll period")]
    Period(#[from] PeriodError),

    #[error("a payroll run is already in progress")]
    RunInProgress,

    #[error("payroll calculation task failed: {0}")]
    Internal(String),
}
