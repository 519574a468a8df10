//! Error types for granary using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase. Statement failures always carry
//! the name of the typed step that failed, never a bare SQL string.

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// A required configuration value is empty.
    #[snafu(display("Configuration value '{field}' must not be empty"))]
    MissingValue { field: &'static str },

    /// A storage URI does not point at object storage.
    #[snafu(display("Configuration value '{field}' must be an s3:// URI, got '{uri}'"))]
    InvalidStorageUri { field: &'static str, uri: String },
}

// ============ Session Errors ============

/// Errors that can occur while opening the warehouse session.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SessionError {
    /// Could not reach or authenticate to the warehouse.
    #[snafu(display("Failed to connect to warehouse at {host}:{port}"))]
    Connect {
        host: String,
        port: u16,
        source: sqlx::Error,
    },
}

// ============ Step Errors ============

/// Errors raised by a single named statement against the warehouse.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StepError {
    /// A DDL/DML statement failed.
    #[snafu(display("Step '{step}' failed to execute"))]
    Execute {
        step: &'static str,
        source: sqlx::Error,
    },

    /// A read-only query failed.
    #[snafu(display("Step '{step}' failed to run"))]
    Query {
        step: &'static str,
        source: sqlx::Error,
    },

    /// A result row could not be decoded into its typed form.
    #[snafu(display("Step '{step}' returned a row that could not be decoded"))]
    Decode {
        step: &'static str,
        source: sqlx::Error,
    },
}

impl StepError {
    /// Name of the step that failed.
    pub fn step(&self) -> &'static str {
        match self {
            StepError::Execute { step, .. }
            | StepError::Query { step, .. }
            | StepError::Decode { step, .. } => step,
        }
    }
}

// ============ Etl Error (top-level) ============

/// Top-level errors that tag which phase of a sequence failed.
///
/// Effects already committed by earlier statements remain in place; see the
/// per-phase retry notes in DESIGN.md.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EtlError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Session error.
    #[snafu(display("Session error"))]
    Session { source: SessionError },

    /// Schema provisioning failed.
    #[snafu(display("Provisioning failed"))]
    Provision { source: StepError },

    /// Staging bulk load failed. Staging tables must be re-provisioned
    /// before a retry; rows copied before the failure remain.
    #[snafu(display("Staging load failed"))]
    StagingLoad { source: StepError },

    /// A transform step failed. Downstream tables are empty or incomplete;
    /// retry the whole run after re-provisioning.
    #[snafu(display("Transform failed"))]
    Transform { source: StepError },

    /// A verification or insight query failed. Loaded data is unaffected.
    #[snafu(display("Report failed"))]
    Report { source: StepError },
}
