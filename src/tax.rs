//! Tax configuration and PAYE calculators.
//!
//! The `tax` module defines the tenant tax configuration (ACC and NPF
//! contribution rates plus per-frequency PAYE bracket tables), loads it
//! from a JSON file, and provides the `PayeCalculator` trait so the
//! bracket formula can be swapped without touching callers.

use crate::models::PayFrequency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Employee and employer percentages for a statutory contribution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContributionRates {
    /// Percent of base salary withheld from the employee.
    pub employee: f64,
    /// Percent of base salary paid on top by the employer.
    pub employer: f64,
}

impl ContributionRates {
    pub fn employee_share(&self, base_salary: f64) -> f64 {
        base_salary * self.employee / 100.0
    }

    pub fn employer_share(&self, base_salary: f64) -> f64 {
        base_salary * self.employer / 100.0
    }
}

/// One PAYE bracket. `min` is exclusive, `max` inclusive; a missing
/// `max` means the bracket is unbounded. The last bracket of a table is
/// always read as unbounded, whatever its `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
    /// Percent applied to the whole amount.
    pub rate: f64,
    #[serde(default)]
    pub subtract: f64,
}

impl TaxBracket {
    pub fn upper(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }
}

/// Tax settings for one tenant, injected into the calculator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaxConfiguration {
    pub acc: ContributionRates,
    pub npf: ContributionRates,
    /// Ordered bracket tables keyed by pay frequency.
    pub paye: BTreeMap<PayFrequency, Vec<TaxBracket>>,
}

#[derive(Error, Debug)]
pub enum TaxConfigError {
    #[error("failed to read tax configuration {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tax configuration is not valid JSON")]
    Json(#[from] serde_json::Error),

    #[error("no PAYE brackets configured for {0:?}")]
    MissingBrackets(PayFrequency),

    #[error("{frequency:?} brackets must start at 0, first bracket starts at {min}")]
    DoesNotStartAtZero { frequency: PayFrequency, min: f64 },

    #[error("{frequency:?} bracket {index} is not contiguous with the previous bracket")]
    NotContiguous { frequency: PayFrequency, index: usize },

    #[error("{frequency:?} bracket {index} is empty or inverted")]
    EmptyBracket { frequency: PayFrequency, index: usize },

    #[error("{frequency:?} bracket {index} is unbounded but is not the last bracket")]
    UnboundedBeforeEnd { frequency: PayFrequency, index: usize },

    #[error("contribution and bracket rates must be finite and non-negative")]
    InvalidRate,
}

impl TaxConfiguration {
    /// Parses and validates a configuration document.
    pub fn from_json_str(data: &str) -> Result<Self, TaxConfigError> {
        let config: TaxConfiguration = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, TaxConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| TaxConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn brackets(&self, frequency: PayFrequency) -> Option<&[TaxBracket]> {
        self.paye.get(&frequency).map(Vec::as_slice)
    }

    /// Checks that every bracket table is ordered, contiguous and starts at 0.
    pub fn validate(&self) -> Result<(), TaxConfigError> {
        let rates = [
            self.acc.employee,
            self.acc.employer,
            self.npf.employee,
            self.npf.employer,
        ];
        if rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(TaxConfigError::InvalidRate);
        }

        for (&frequency, brackets) in &self.paye {
            let first = brackets
                .first()
                .ok_or(TaxConfigError::MissingBrackets(frequency))?;
            if first.min != 0.0 {
                return Err(TaxConfigError::DoesNotStartAtZero {
                    frequency,
                    min: first.min,
                });
            }
            for (index, bracket) in brackets.iter().enumerate() {
                if !bracket.rate.is_finite() || bracket.rate < 0.0 {
                    return Err(TaxConfigError::InvalidRate);
                }
                if bracket.upper() <= bracket.min {
                    return Err(TaxConfigError::EmptyBracket { frequency, index });
                }
                if index > 0 {
                    let previous = &brackets[index - 1];
                    match previous.max {
                        None => {
                            return Err(TaxConfigError::UnboundedBeforeEnd {
                                frequency,
                                index: index - 1,
                            })
                        }
                        Some(max) if max != bracket.min => {
                            return Err(TaxConfigError::NotContiguous { frequency, index })
                        }
                        Some(_) => {}
                    }
                }
            }
            if let Some(last) = brackets.last().and_then(|b| b.max) {
                warn!(
                    "{:?} PAYE brackets end at {}; the last bracket is treated as unbounded",
                    frequency, last
                );
            }
        }
        Ok(())
    }
}

/// Computes PAYE owed on an amount from a bracket table.
///
/// Calculators must be thread-safe (`Send + Sync`) because the engine
/// invokes them concurrently across multiple threads.
pub trait PayeCalculator: Send + Sync {
    fn name(&self) -> &str;
    fn calculate(&self, amount: f64, brackets: &[TaxBracket]) -> f64;
}

/// Taxes the whole amount at the single matching bracket's rate, minus
/// that bracket's subtraction constant. This is how the tenants'
/// published tables are meant to be read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleBracketPaye;

impl PayeCalculator for SingleBracketPaye {
    fn name(&self) -> &str {
        "single-bracket"
    }

    fn calculate(&self, amount: f64, brackets: &[TaxBracket]) -> f64 {
        calculate_paye(amount, brackets)
    }
}

/// Marginal accumulation: each slice of the amount is taxed at its own
/// bracket's rate. `subtract` is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressivePaye;

impl PayeCalculator for ProgressivePaye {
    fn name(&self) -> &str {
        "progressive"
    }

    fn calculate(&self, amount: f64, brackets: &[TaxBracket]) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        brackets
            .iter()
            .enumerate()
            .filter(|(_, b)| amount > b.min)
            .map(|(index, b)| (amount.min(upper_at(brackets, index)) - b.min) * b.rate / 100.0)
            .sum()
    }
}

/// Upper bound of `brackets[index]`, open-ended for the last bracket.
fn upper_at(brackets: &[TaxBracket], index: usize) -> f64 {
    if index + 1 == brackets.len() {
        f64::INFINITY
    } else {
        brackets[index].upper()
    }
}

/// First bracket with `min < amount <= max` wins; amounts that match no
/// bracket (including zero and negatives) owe nothing.
pub fn calculate_paye(amount: f64, brackets: &[TaxBracket]) -> f64 {
    brackets
        .iter()
        .enumerate()
        .find(|(index, b)| amount > b.min && amount <= upper_at(brackets, *index))
        .map(|(_, b)| amount * (b.rate / 100.0) - b.subtract)
        .unwrap_or(0.0)
}

/// Looks a calculator up by the name used in configuration.
pub fn paye_calculator_by_name(name: &str) -> Option<Box<dyn PayeCalculator>> {
    match name {
        "single-bracket" => Some(Box::new(SingleBracketPaye)),
        "progressive" => Some(Box::new(ProgressivePaye)),
        _ => None,
    }
}
