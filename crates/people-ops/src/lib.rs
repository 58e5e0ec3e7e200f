//! Core library of the HR operations portal: the performance evaluation
//! workflow engine plus the configuration and telemetry shell shared by the
//! deployable services.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
