//! Payroll Engine library crate.
//!
//! This crate exposes the payroll period engine and API components as
//! reusable modules. External applications may depend on the
//! `payroll_engine` crate and call into `engine::run_payroll` with data
//! they already hold, drive a full fetch-and-compute cycle through
//! `runner::PayrollRunner`, or embed the API via `api::build_router`.

pub mod adjustments;
pub mod api;
pub mod attendance;
pub mod calculator;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod parse;
pub mod period;
pub mod report;
pub mod runner;
pub mod tax;
