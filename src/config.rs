//! Environment-driven configuration for the server binary.
//!
//! Every setting is read from a `PAYROLL_`-prefixed environment
//! variable and falls back to a default when unset.

use crate::calculator::PayrollSettings;
use crate::client::DEFAULT_TIMEOUT_SECS;
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bind_addr: String,
    pub upstream_base_url: String,
    pub request_timeout: Duration,
    pub tax_config_path: PathBuf,
    /// `single-bracket` or `progressive`.
    pub paye_method: String,
    pub settings: PayrollSettings,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests need not
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PayrollSettings::default();
        let settings = PayrollSettings {
            base_hours_per_week: parse_or(&lookup, "PAYROLL_BASE_HOURS_PER_WEEK", defaults.base_hours_per_week)?,
            weekly_multiplier: parse_or(&lookup, "PAYROLL_WEEKLY_MULTIPLIER", defaults.weekly_multiplier)?,
            fortnightly_multiplier: parse_or(&lookup, "PAYROLL_FORTNIGHTLY_MULTIPLIER", defaults.fortnightly_multiplier)?,
            monthly_multiplier: parse_or(&lookup, "PAYROLL_MONTHLY_MULTIPLIER", defaults.monthly_multiplier)?,
            overtime_multiplier: parse_or(&lookup, "PAYROLL_OVERTIME_MULTIPLIER", defaults.overtime_multiplier)?,
            daily_overtime_threshold: lookup("PAYROLL_DAILY_OVERTIME_THRESHOLD")
                .map(|v| parse_value::<f64>("PAYROLL_DAILY_OVERTIME_THRESHOLD", &v))
                .transpose()?,
        };
        if settings.base_hours_per_week <= 0.0 {
            return Err(anyhow!("PAYROLL_BASE_HOURS_PER_WEEK must be positive"));
        }

        Ok(EngineConfig {
            bind_addr: lookup("PAYROLL_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string()),
            upstream_base_url: lookup("PAYROLL_UPSTREAM_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8080/api".to_string()),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PAYROLL_REQUEST_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            tax_config_path: PathBuf::from(
                lookup("PAYROLL_TAX_CONFIG").unwrap_or_else(|| "tax_config.json".to_string()),
            ),
            paye_method: lookup("PAYROLL_PAYE_METHOD").unwrap_or_else(|| "single-bracket".to_string()),
            settings,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("invalid value for {}: {:?}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.settings, PayrollSettings::default());
        assert_eq!(config.paye_method, "single-bracket");
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("PAYROLL_DAILY_OVERTIME_THRESHOLD", "8"),
            ("PAYROLL_OVERTIME_MULTIPLIER", "2"),
            ("PAYROLL_REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.settings.daily_threshold(), 8.0);
        assert_eq!(config.settings.overtime_multiplier, 2.0);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(EngineConfig::from_lookup(lookup_from(&[("PAYROLL_MONTHLY_MULTIPLIER", "lots")])).is_err());
        assert!(EngineConfig::from_lookup(lookup_from(&[("PAYROLL_BASE_HOURS_PER_WEEK", "0")])).is_err());
    }
}
