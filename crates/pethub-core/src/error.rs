// ── Core error types ──
//
// User-facing errors from pethub-core. Consumers never see HTTP status
// codes or envelope codes directly: `CoreError::from_api` classifies
// wire-level failures into the taxonomy below, and every variant names
// the vendor and operation it came from.

use pethub_api::Vendor;
use thiserror::Error;

use crate::dispatch::Operation;
use crate::telemetry::DecodeError;

/// Why an authentication failure is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum AuthCause {
    /// The vendor refused the stored credentials.
    InvalidCredentials,
    /// The vendor rejected a freshly issued session a second time.
    Repeated,
    /// Login could not reach the vendor within the retry budget.
    Unreachable,
}

/// What a caller should offer the user after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Remedy {
    /// The action likely failed; trying again later may succeed.
    Retry,
    /// Credentials or configuration must be fixed first.
    Reconfigure,
    /// The request itself is wrong (unknown device, unsupported action).
    FixRequest,
    /// Nothing actionable.
    None,
}

/// Unified error type for the core crate.
///
/// `Clone` so one login outcome can be handed to every waiter of a
/// shared session refresh.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Authentication ──────────────────────────────────────────────
    #[error("{vendor}: authentication failed during {operation} ({cause}): {message}")]
    Auth {
        vendor: Vendor,
        operation: Operation,
        cause: AuthCause,
        message: String,
    },

    // ── Vendor availability ─────────────────────────────────────────
    #[error("{vendor} unavailable during {operation} after {attempts} attempt(s): {message}")]
    VendorUnavailable {
        vendor: Vendor,
        operation: Operation,
        attempts: u32,
        message: String,
    },

    #[error("{vendor} rate limited {operation}")]
    RateLimited {
        vendor: Vendor,
        operation: Operation,
        retry_after_secs: Option<u64>,
    },

    #[error("{vendor} rejected {operation}: {message}")]
    Rejected {
        vendor: Vendor,
        operation: Operation,
        message: String,
    },

    // ── Caller errors ───────────────────────────────────────────────
    #[error("Invalid {operation} request for {vendor}: {message}")]
    Validation {
        vendor: Vendor,
        operation: Operation,
        message: String,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    // ── Configuration ───────────────────────────────────────────────
    #[error("{vendor} is not configured")]
    NotConfigured { vendor: Vendor },

    // ── Internal errors ─────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Classify a wire-level failure that the dispatcher did not recover.
    pub fn from_api(vendor: Vendor, operation: Operation, err: pethub_api::Error) -> Self {
        use pethub_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } | ApiError::SessionExpired { message } => {
                Self::Auth {
                    vendor,
                    operation,
                    cause: AuthCause::InvalidCredentials,
                    message,
                }
            }
            ApiError::RateLimited { retry_after_secs } => Self::RateLimited {
                vendor,
                operation,
                retry_after_secs,
            },
            ApiError::Vendor { code, message } => Self::Rejected {
                vendor,
                operation,
                message: format!("code {code}: {message}"),
            },
            ApiError::Rejected { message } => Self::Rejected {
                vendor,
                operation,
                message,
            },
            ApiError::Http { status, message } if (400..500).contains(&status) => {
                Self::Rejected {
                    vendor,
                    operation,
                    message: format!("HTTP {status}: {message}"),
                }
            }
            ApiError::InvalidUrl(e) => Self::Internal(format!("invalid {vendor} endpoint: {e}")),
            other @ (ApiError::Transport(_)
            | ApiError::Timeout { .. }
            | ApiError::Tls(_)
            | ApiError::Http { .. }
            | ApiError::Deserialization { .. }) => Self::VendorUnavailable {
                vendor,
                operation,
                attempts: 1,
                message: other.to_string(),
            },
        }
    }

    /// The user-facing course of action for this error.
    pub fn remedy(&self) -> Remedy {
        match self {
            Self::Auth {
                cause: AuthCause::Unreachable,
                ..
            }
            | Self::VendorUnavailable { .. }
            | Self::RateLimited { .. }
            | Self::Rejected { .. } => Remedy::Retry,
            Self::Auth { .. } | Self::NotConfigured { .. } => Remedy::Reconfigure,
            Self::Validation { .. } => Remedy::FixRequest,
            Self::Decode(_) | Self::Internal(_) => Remedy::None,
        }
    }

    /// The vendor's `Retry-After` hint, for throttling errors that carried one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    /// The vendor this error concerns, if any.
    pub fn vendor(&self) -> Option<Vendor> {
        match self {
            Self::Auth { vendor, .. }
            | Self::VendorUnavailable { vendor, .. }
            | Self::RateLimited { vendor, .. }
            | Self::Rejected { vendor, .. }
            | Self::Validation { vendor, .. }
            | Self::NotConfigured { vendor } => Some(*vendor),
            Self::Decode(_) | Self::Internal(_) => None,
        }
    }
}
