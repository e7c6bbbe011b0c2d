//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use pethub_config::ConfigError;
use pethub_core::{AuthCause, CoreError, DecodeError, Vendor};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const AUTH: i32 = 4;
    pub const UNAVAILABLE: i32 = 5;
    pub const RATE_LIMITED: i32 = 6;
    pub const REJECTED: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("{vendor} is not configured")]
    #[diagnostic(
        code(pethub::not_configured),
        help(
            "Add a [{vendor}] section to the config file.\n\
             Run: pethub config path"
        )
    )]
    NotConfigured { vendor: Vendor },

    #[error("No credentials configured for {vendor}")]
    #[diagnostic(
        code(pethub::no_credentials),
        help(
            "Set the account in the [{vendor}] section, then store the password with:\n\
             pethub config set-password {vendor}"
        )
    )]
    NoCredentials { vendor: Vendor },

    #[error(transparent)]
    #[diagnostic(code(pethub::config))]
    Config(ConfigError),

    // ── Authentication ───────────────────────────────────────────────
    #[error("{vendor} rejected the configured credentials")]
    #[diagnostic(
        code(pethub::auth_failed),
        help(
            "{message}\n\
             Verify the account, then run: pethub config set-password {vendor}"
        )
    )]
    AuthFailed { vendor: Vendor, message: String },

    // ── Vendor ───────────────────────────────────────────────────────
    #[error("{vendor} is unavailable")]
    #[diagnostic(
        code(pethub::unavailable),
        help("{message}\nThe vendor cloud may be down; try again later.")
    )]
    Unavailable { vendor: Vendor, message: String },

    #[error("{vendor} is rate limiting requests")]
    #[diagnostic(code(pethub::rate_limited), help("Wait {wait} before retrying."))]
    RateLimited { vendor: Vendor, wait: String },

    #[error("{vendor} rejected the request: {message}")]
    #[diagnostic(
        code(pethub::rejected),
        help("The device may be busy or offline. Try again shortly.")
    )]
    Rejected { vendor: Vendor, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pethub::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(pethub::decode),
        help("Pass the full 13-byte service-data frame as hex.")
    )]
    Decode(#[from] DecodeError),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(pethub::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotConfigured { .. } | Self::NoCredentials { .. } | Self::Config(_) => {
                exit_code::CONFIG
            }
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Unavailable { .. } => exit_code::UNAVAILABLE,
            Self::RateLimited { .. } => exit_code::RATE_LIMITED,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::Decode(_) => exit_code::USAGE,
            Self::Internal(_) | Self::Io(_) | Self::Json(_) | Self::Yaml(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { vendor } => Self::NoCredentials { vendor },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Auth {
                vendor,
                cause: AuthCause::Unreachable,
                message,
                ..
            } => Self::Unavailable { vendor, message },

            CoreError::Auth {
                vendor, message, ..
            } => Self::AuthFailed { vendor, message },

            CoreError::VendorUnavailable {
                vendor,
                attempts,
                message,
                ..
            } => Self::Unavailable {
                vendor,
                message: format!("{message} (after {attempts} attempt(s))"),
            },

            CoreError::RateLimited {
                vendor,
                retry_after_secs,
                ..
            } => Self::RateLimited {
                vendor,
                wait: retry_after_secs.map_or_else(|| "a moment".into(), |secs| format!("{secs}s")),
            },

            CoreError::Rejected {
                vendor, message, ..
            } => Self::Rejected { vendor, message },

            CoreError::Validation { message, .. } => Self::Validation {
                field: "request".into(),
                reason: message,
            },

            CoreError::Decode(err) => Self::Decode(err),

            CoreError::NotConfigured { vendor } => Self::NotConfigured { vendor },

            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}
