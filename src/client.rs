//! HTTP client for the upstream HR backend.
//!
//! The backend owns rosters, attendance, catalogs, payroll periods and
//! stored payslips. `HrClient` wraps its REST endpoints; the
//! [`PayrollSource`] trait is the seam the runner depends on so a run
//! can be driven from any source.

use crate::models::{
    CatalogItem, Employee, PayrollOverride, PayrollPeriod, Payslip, PeriodicAttendance,
    RegularAttendance,
};
use crate::period::NewPayrollPeriod;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("HR backend error: Status={status}, Message='{message}'")]
    Api { status: StatusCode, message: String },

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// The backend answers either with a bare JSON value or wrapped in `{"data": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(data) => data,
        }
    }
}

/// Data a payroll run reads, and where its approved payslips go.
#[async_trait]
pub trait PayrollSource: Send + Sync {
    async fn roster(&self, employer_id: &str) -> Result<Vec<Employee>, ClientError>;
    async fn periodic_attendance(
        &self,
        employer_id: &str,
    ) -> Result<Vec<PeriodicAttendance>, ClientError>;
    /// `None` when the backend has no attendance for the employee.
    async fn regular_attendance(
        &self,
        employee_id: &str,
    ) -> Result<Option<Vec<RegularAttendance>>, ClientError>;
    async fn allowance_catalog(&self, employer_id: &str) -> Result<Vec<CatalogItem>, ClientError>;
    async fn deduction_catalog(&self, employer_id: &str) -> Result<Vec<CatalogItem>, ClientError>;
    async fn allowance_overrides(
        &self,
        payroll_id: &str,
    ) -> Result<Vec<PayrollOverride>, ClientError>;
    async fn deduction_overrides(
        &self,
        payroll_id: &str,
    ) -> Result<Vec<PayrollOverride>, ClientError>;
    async fn save_payslip(&self, payslip: &Payslip) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePeriodBody<'a> {
    employer_id: &'a str,
    #[serde(flatten)]
    period: &'a NewPayrollPeriod,
}

#[derive(Clone, Debug)]
pub struct HrClient {
    http_client: Client,
    base_url: String,
}

impl HrClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(HrClient {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.url(endpoint))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Vec<u8>, ClientError> {
        debug!("Sending request to {}", endpoint);
        let response = request.send().await.map_err(|e| timeout_or(e, endpoint))?;
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await.map_err(|e| timeout_or(e, endpoint))?;
            return Ok(bytes.to_vec());
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
        if status != StatusCode::NOT_FOUND {
            error!("HR backend error for {}: Status={}, Body='{}'", endpoint, status, message);
        }
        Err(ClientError::Api { status, message })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ClientError> {
        let body = self.send(self.request(Method::GET, endpoint), endpoint).await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        Ok(envelope.into_inner())
    }

    pub async fn list_periods(&self, employer_id: &str) -> Result<Vec<PayrollPeriod>, ClientError> {
        self.get(&format!("payroll-process?employerId={}", employer_id)).await
    }

    /// Creates a period. Callers validate it against
    /// [`HrClient::list_periods`] first.
    pub async fn create_period(
        &self,
        employer_id: &str,
        period: &NewPayrollPeriod,
    ) -> Result<PayrollPeriod, ClientError> {
        let endpoint = "payroll-process";
        let request = self
            .request(Method::POST, endpoint)
            .json(&CreatePeriodBody { employer_id, period });
        let body = self.send(request, endpoint).await?;
        let envelope: Envelope<PayrollPeriod> = serde_json::from_slice(&body)?;
        info!("Created payroll period {} to {}", period.date_from, period.date_to);
        Ok(envelope.into_inner())
    }

    pub async fn delete_period(&self, payroll_id: &str) -> Result<(), ClientError> {
        let endpoint = format!("payroll-process/{}", payroll_id);
        self.send(self.request(Method::DELETE, &endpoint), &endpoint)
            .await?;
        Ok(())
    }
}

fn timeout_or(err: reqwest::Error, endpoint: &str) -> ClientError {
    if err.is_timeout() {
        error!("Request to {} timed out", endpoint);
        ClientError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        ClientError::Request(err)
    }
}

#[async_trait]
impl PayrollSource for HrClient {
    async fn roster(&self, employer_id: &str) -> Result<Vec<Employee>, ClientError> {
        self.get(&format!("employees?employerId={}", employer_id)).await
    }

    async fn periodic_attendance(
        &self,
        employer_id: &str,
    ) -> Result<Vec<PeriodicAttendance>, ClientError> {
        self.get(&format!("periodicAttendance?employerId={}", employer_id))
            .await
    }

    async fn regular_attendance(
        &self,
        employee_id: &str,
    ) -> Result<Option<Vec<RegularAttendance>>, ClientError> {
        match self.get(&format!("users/attendance/{}", employee_id)).await {
            Ok(records) => Ok(Some(records)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn allowance_catalog(&self, employer_id: &str) -> Result<Vec<CatalogItem>, ClientError> {
        self.get(&format!("allownce?employerId={}", employer_id)).await
    }

    async fn deduction_catalog(&self, employer_id: &str) -> Result<Vec<CatalogItem>, ClientError> {
        self.get(&format!("deduction?employerId={}", employer_id)).await
    }

    async fn allowance_overrides(
        &self,
        payroll_id: &str,
    ) -> Result<Vec<PayrollOverride>, ClientError> {
        self.get(&format!("payrollAllownce/{}", payroll_id)).await
    }

    async fn deduction_overrides(
        &self,
        payroll_id: &str,
    ) -> Result<Vec<PayrollOverride>, ClientError> {
        self.get(&format!("payrollDeduction/{}", payroll_id)).await
    }

    async fn save_payslip(&self, payslip: &Payslip) -> Result<(), ClientError> {
        let endpoint = "payslip";
        let request = self.request(Method::POST, endpoint).json(payslip);
        self.send(request, endpoint).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_joined_with_a_single_slash() {
        let client = HrClient::new("http://hr.local/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url("/employees?employerId=4"),
            "http://hr.local/api/employees?employerId=4"
        );
        assert_eq!(client.url("payslip"), "http://hr.local/api/payslip");
    }

    #[test]
    fn test_envelopes_unwrap_both_shapes() {
        let wrapped: Envelope<Vec<u32>> = serde_json::from_str(r#"{"data": [1, 2]}"#).unwrap();
        let bare: Envelope<Vec<u32>> = serde_json::from_str("[3]").unwrap();
        assert_eq!(wrapped.into_inner(), vec![1, 2]);
        assert_eq!(bare.into_inner(), vec![3]);
    }

    #[test]
    fn test_not_found_is_distinguished() {
        let missing = ClientError::Api {
            status: StatusCode::NOT_FOUND,
            message: "no attendance".into(),
        };
        let broken = ClientError::Api {
            status: StatusCode::BAD_GATEWAY,
            message: "upstream down".into(),
        };
        assert!(missing.is_not_found());
        assert!(!broken.is_not_found());
    }
}
