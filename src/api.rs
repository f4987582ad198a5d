//! HTTP API for the Payroll Engine.
//!
//! This module exposes the engine using the
//! [`axum`](https://crates.io/crates/axum) framework. Clients can run a
//! payroll against the upstream HR backend, compute one from data they
//! supply, approve payslips, aggregate stored payslips for reports and
//! manage payroll periods.

use crate::calculator::Calculator;
use crate::client::{ClientError, HrClient};
use crate::config::EngineConfig;
use crate::engine::{run_payroll, BatchResult, EmployerData};
use crate::error::PayrollError;
use crate::models::{PayrollPeriod, Payslip};
use crate::period::{validate_new_period, PeriodError, PeriodMeta, PeriodRequest};
use crate::report::{aggregate, AggregatedRecord, ReportPeriod};
use crate::runner::{ApprovalOutcome, ApprovalStatus, PayrollRunner, RunState};
use crate::tax::{paye_calculator_by_name, TaxConfiguration};
use anyhow::{anyhow, Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Application state shared across requests.
pub struct AppState {
    pub calculator: Arc<Calculator>,
    pub runner: PayrollRunner<HrClient>,
}

impl AppState {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let tax = TaxConfiguration::load(&config.tax_config_path).with_context(|| {
            format!("loading tax configuration from {}", config.tax_config_path.display())
        })?;
        let paye = paye_calculator_by_name(&config.paye_method)
            .ok_or_else(|| anyhow!("unknown PAYE method {:?}", config.paye_method))?;
        let calculator = Arc::new(Calculator::with_paye(
            config.settings.clone(),
            tax,
            Arc::from(paye),
        ));
        let client = HrClient::new(&config.upstream_base_url, config.request_timeout)?;
        Ok(AppState {
            runner: PayrollRunner::new(Arc::new(client), Arc::clone(&calculator)),
            calculator,
        })
    }
}

/// Build the API router around the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/payroll/calculate", post(calculate_handler))
        .route("/api/payroll/run", post(run_handler))
        .route("/api/payroll/status", get(status_handler))
        .route("/api/payroll/approve", post(approve_handler))
        .route("/api/reports/aggregate", post(aggregate_handler))
        .route("/api/periods", post(create_period_handler))
        .route("/api/periods/:payroll_id", delete(delete_period_handler))
        .route("/api/employers/:employer_id/periods", get(list_periods_handler))
        .with_state(state)
}

/// Errors surfaced to API clients as `{"error": ...}` bodies.
pub enum ApiError {
    Payroll(PayrollError),
    Period(PeriodError),
    Upstream(ClientError),
}

impl From<PayrollError> for ApiError {
    fn from(err: PayrollError) -> Self {
        ApiError::Payroll(err)
    }
}

impl From<PeriodError> for ApiError {
    fn from(err: PeriodError) -> Self {
        ApiError::Period(err)
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        ApiError::Upstream(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Period(err) | ApiError::Payroll(PayrollError::Period(err)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            ApiError::Payroll(PayrollError::RunInProgress) => {
                (StatusCode::CONFLICT, PayrollError::RunInProgress.to_string())
            }
            ApiError::Payroll(PayrollError::Source(err)) | ApiError::Upstream(err) => {
                (StatusCode::BAD_GATEWAY, format!("payroll calculation failed: {}", err))
            }
            ApiError::Payroll(err @ PayrollError::Internal(_)) => {
                error!("Internal payroll error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub period: PayrollPeriod,
    pub data: EmployerData,
}

/// Handler for POST /api/payroll/calculate
async fn calculate_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CalculateRequest>,
) -> Result<Json<BatchResult>, ApiError> {
    let calculator = Arc::clone(&state.calculator);
    let meta = PeriodMeta::from_period(&input.period, calculator.settings().base_hours_per_week)?;
    let data = input.data;
    let result = tokio::task::spawn_blocking(move || run_payroll(&meta, &data, &calculator))
        .await
        .map_err(|e| PayrollError::Internal(e.to_string()))?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub employer_id: String,
    pub period: PayrollPeriod,
}

/// Handler for POST /api/payroll/run
async fn run_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RunRequest>,
) -> Result<Json<BatchResult>, ApiError> {
    let result = state.runner.run(&input.employer_id, &input.period).await?;
    Ok(Json(result))
}

/// Handler for GET /api/payroll/status
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<RunState> {
    Json(state.runner.state())
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub payslips: Vec<Payslip>,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub status: ApprovalStatus,
    #[serde(flatten)]
    pub outcome: ApprovalOutcome,
}

/// Handler for POST /api/payroll/approve
async fn approve_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ApproveRequest>,
) -> impl IntoResponse {
    let outcome = state.runner.approve(&input.payslips).await;
    let status = outcome.status();
    let code = match status {
        ApprovalStatus::Complete => StatusCode::OK,
        ApprovalStatus::Partial => StatusCode::MULTI_STATUS,
        ApprovalStatus::Failed => StatusCode::BAD_GATEWAY,
    };
    (code, Json(ApproveResponse { status, outcome }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    pub payslips: Vec<Payslip>,
    pub period_type: ReportPeriod,
}

/// Handler for POST /api/reports/aggregate
async fn aggregate_handler(Json(input): Json<AggregateRequest>) -> Json<Vec<AggregatedRecord>> {
    Json(aggregate(&input.payslips, input.period_type))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePeriodRequest {
    pub employer_id: String,
    #[serde(flatten)]
    pub dates: PeriodRequest,
}

/// Handler for POST /api/periods. The selection is validated locally
/// before anything is created upstream.
async fn create_period_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreatePeriodRequest>,
) -> Result<(StatusCode, Json<PayrollPeriod>), ApiError> {
    validate_new_period(&input.dates, &[])?;
    let client = state.runner.source();
    let existing = client.list_periods(&input.employer_id).await?;
    let period = validate_new_period(&input.dates, &existing)?;
    let created = client.create_period(&input.employer_id, &period).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler for GET /api/employers/:employer_id/periods
async fn list_periods_handler(
    State(state): State<Arc<AppState>>,
    Path(employer_id): Path<String>,
) -> Result<Json<Vec<PayrollPeriod>>, ApiError> {
    Ok(Json(state.runner.source().list_periods(&employer_id).await?))
}

/// Handler for DELETE /api/periods/:payroll_id
async fn delete_period_handler(
    State(state): State<Arc<AppState>>,
    Path(payroll_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.runner.source().delete_period(&payroll_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Launch the API server. This function builds the router from the
/// given configuration and binds to its address. It blocks until the
/// server terminates (e.g. when interrupted).
pub async fn serve(config: EngineConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("Server listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
