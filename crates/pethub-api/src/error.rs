use thiserror::Error;

/// Top-level error type for the `pethub-api` crate.
///
/// Covers every wire-level failure mode across both vendor clouds:
/// authentication, transport, throttling, vendor envelopes and decoding.
/// `pethub-core` classifies these into the user-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login refused (wrong credentials, locked account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The session token was rejected on a regular call (expired or revoked).
    #[error("Session expired -- re-authentication required: {message}")]
    SessionExpired { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Throttling ──────────────────────────────────────────────────
    /// The vendor throttled the request. `retry_after_secs` comes from the
    /// `Retry-After` header when the vendor sends one.
    #[error("Rate limited by vendor")]
    RateLimited { retry_after_secs: Option<u64> },

    // ── Vendor responses ────────────────────────────────────────────
    /// Non-success HTTP status that is not auth or throttling related.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Error reported inside the vendor's JSON envelope.
    #[error("Vendor error {code}: {message}")]
    Vendor { code: i64, message: String },

    /// The vendor accepted the request but declined to carry out the action.
    #[error("Action rejected: {message}")]
    Rejected { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the vendor rejected the session token and a fresh
    /// login might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. } | Self::Authentication { .. })
    }

    /// Returns `true` for transport-level failures worth retrying:
    /// timeouts, refused connections, and gateway errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Http { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Returns `true` if the vendor is throttling us.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns `true` if the endpoint itself does not exist (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }

    /// The `Retry-After` hint, if this is a throttling error that carried one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }
}
