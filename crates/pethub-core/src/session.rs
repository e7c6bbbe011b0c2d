// ── Session manager ──
//
// One authentication session per vendor. `get_valid_session` hands out
// the cached session while it is valid and otherwise performs a login,
// shared by every concurrent caller (single-flight). The login runs on
// its own task: a caller that gives up waiting does not cancel it for
// the others.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::BoxFuture;
use pethub_api::{LoginGrant, Vendor};
use secrecy::SecretString;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::credentials::{Credential, CredentialStore};
use crate::dispatch::Operation;
use crate::error::{AuthCause, CoreError};

// ── Authenticator ───────────────────────────────────────────────────

/// Performs the vendor-specific login call.
///
/// The returned future is `'static` so the manager can drive it on a
/// detached task.
pub trait Authenticator: Send + Sync {
    fn login(
        &self,
        credential: Arc<Credential>,
    ) -> BoxFuture<'static, Result<LoginGrant, pethub_api::Error>>;

    /// Lifetime assumed when the vendor does not report one.
    fn default_session_ttl(&self) -> Duration;
}

// ── Session ─────────────────────────────────────────────────────────

/// Lifecycle of a vendor's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Expired,
}

/// An issued vendor session. Immutable; a refresh produces a new one
/// with a higher `generation`.
#[derive(Clone)]
pub struct Session {
    vendor: Vendor,
    token: SecretString,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    generation: u64,
}

impl Session {
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Estimated expiry (vendor-reported or inferred).
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn is_expired(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        let skew = TimeDelta::from_std(skew).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(skew)
            .is_none_or(|deadline| deadline >= self.expires_at)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("vendor", &self.vendor)
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("generation", &self.generation)
            .finish()
    }
}

// ── Per-vendor slot ─────────────────────────────────────────────────

type LoginOutcome = Option<Result<Arc<Session>, CoreError>>;

struct SlotState {
    status: SessionStatus,
    current: Option<Arc<Session>>,
    /// Present while a login is running; joined by later callers.
    inflight: Option<watch::Receiver<LoginOutcome>>,
    generation: u64,
}

struct VendorSlot {
    vendor: Vendor,
    authenticator: Arc<dyn Authenticator>,
    state: Mutex<SlotState>,
}

// ── SessionManager ──────────────────────────────────────────────────

/// Owns every vendor session. Sessions are only mutated here.
pub struct SessionManager {
    slots: HashMap<Vendor, Arc<VendorSlot>>,
    credentials: CredentialStore,
    retry: RetryPolicy,
    expiry_skew: Duration,
    cancel: CancellationToken,
}

impl SessionManager {
    pub fn new(
        credentials: CredentialStore,
        retry: RetryPolicy,
        expiry_skew: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            slots: HashMap::new(),
            credentials,
            retry,
            expiry_skew,
            cancel,
        }
    }

    /// Register the login implementation for a vendor.
    pub fn with_authenticator(mut self, vendor: Vendor, authenticator: Arc<dyn Authenticator>) -> Self {
        self.slots.insert(
            vendor,
            Arc::new(VendorSlot {
                vendor,
                authenticator,
                state: Mutex::new(SlotState {
                    status: SessionStatus::Unauthenticated,
                    current: None,
                    inflight: None,
                    generation: 0,
                }),
            }),
        );
        self
    }

    /// Return a session that is authenticated right now, logging in if
    /// needed. Concurrent callers share one login and its outcome.
    pub async fn get_valid_session(&self, vendor: Vendor) -> Result<Arc<Session>, CoreError> {
        let slot = self
            .slots
            .get(&vendor)
            .ok_or(CoreError::NotConfigured { vendor })?;

        let mut rx = {
            let mut state = slot.state.lock().await;

            // A login task that panicked drops its sender without clearing
            // the slot.
            if state.inflight.as_ref().is_some_and(|rx| rx.has_changed().is_err()) {
                warn!(%vendor, "previous login ended without a result, starting over");
                state.inflight = None;
                state.current = None;
                state.status = SessionStatus::Unauthenticated;
            }

            if let Some(rx) = &state.inflight {
                debug!(%vendor, "joining in-flight login");
                rx.clone()
            } else {
                if state.status == SessionStatus::Authenticated {
                    match &state.current {
                        Some(session) if !session.is_expired(Utc::now(), self.expiry_skew) => {
                            return Ok(Arc::clone(session));
                        }
                        _ => {
                            info!(%vendor, "session reached its estimated expiry");
                            state.status = SessionStatus::Expired;
                        }
                    }
                }

                let credential = self
                    .credentials
                    .get(vendor)
                    .ok_or(CoreError::NotConfigured { vendor })?;

                let (tx, rx) = watch::channel(None);
                state.status = SessionStatus::Authenticating;
                state.inflight = Some(rx.clone());
                info!(%vendor, "starting login");

                tokio::spawn(login_task(
                    Arc::clone(slot),
                    credential,
                    self.retry,
                    self.cancel.clone(),
                    tx,
                ));
                rx
            }
        };

        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CoreError::Internal(format!("{vendor} login ended without a result")))?;

        match &*outcome {
            Some(result) => result.clone(),
            None => Err(CoreError::Internal(format!("{vendor} login ended without a result"))),
        }
    }

    /// Mark the vendor's session expired; the next request logs in again.
    pub async fn invalidate(&self, vendor: Vendor) {
        let Some(slot) = self.slots.get(&vendor) else {
            return;
        };
        let mut state = slot.state.lock().await;
        if state.status == SessionStatus::Authenticated {
            info!(%vendor, "session invalidated");
            state.status = SessionStatus::Expired;
            state.current = None;
        }
    }

    /// Invalidate only if `session` is still the current one.
    ///
    /// A caller holding an older session must not expire a fresher one
    /// that another request already obtained. Returns whether the
    /// current session was invalidated.
    pub async fn invalidate_session(&self, session: &Session) -> bool {
        let Some(slot) = self.slots.get(&session.vendor) else {
            return false;
        };
        let mut state = slot.state.lock().await;
        let is_current = state
            .current
            .as_ref()
            .is_some_and(|current| current.generation == session.generation);

        if is_current && state.status == SessionStatus::Authenticated {
            info!(vendor = %session.vendor, generation = session.generation, "session invalidated");
            state.status = SessionStatus::Expired;
            state.current = None;
            true
        } else {
            debug!(
                vendor = %session.vendor,
                generation = session.generation,
                "stale session already replaced"
            );
            false
        }
    }

    /// Current lifecycle status, or `None` if the vendor is not registered.
    pub async fn status(&self, vendor: Vendor) -> Option<SessionStatus> {
        let slot = self.slots.get(&vendor)?;
        Some(slot.state.lock().await.status)
    }

    pub fn is_registered(&self, vendor: Vendor) -> bool {
        self.slots.contains_key(&vendor)
    }
}

// ── Login task ──────────────────────────────────────────────────────

async fn login_task(
    slot: Arc<VendorSlot>,
    credential: Arc<Credential>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    tx: watch::Sender<LoginOutcome>,
) {
    let vendor = slot.vendor;
    let outcome = tokio::select! {
        () = cancel.cancelled() => Err(CoreError::Internal("shutting down".into())),
        result = login_with_retry(&slot, credential, retry) => result,
    };

    let mut state = slot.state.lock().await;
    state.inflight = None;

    let shared = match outcome {
        Ok(grant) => {
            state.generation += 1;
            let issued_at = Utc::now();
            let ttl = grant
                .expires_in
                .unwrap_or_else(|| slot.authenticator.default_session_ttl());
            let expires_at = TimeDelta::from_std(ttl)
                .ok()
                .and_then(|ttl| issued_at.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);

            let session = Arc::new(Session {
                vendor,
                token: grant.token,
                issued_at,
                expires_at,
                generation: state.generation,
            });
            state.current = Some(Arc::clone(&session));
            state.status = SessionStatus::Authenticated;
            info!(%vendor, generation = session.generation, %expires_at, "login succeeded");
            Ok(session)
        }
        Err(e) => {
            state.current = None;
            state.status = SessionStatus::Unauthenticated;
            warn!(%vendor, error = %e, "login failed");
            Err(e)
        }
    };

    tx.send_replace(Some(shared));
}

async fn login_with_retry(
    slot: &VendorSlot,
    credential: Arc<Credential>,
    retry: RetryPolicy,
) -> Result<LoginGrant, CoreError> {
    let attempts = retry.transport_attempts.max(1);
    let mut attempt = 1;

    loop {
        match slot.authenticator.login(Arc::clone(&credential)).await {
            Ok(grant) => return Ok(grant),
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = retry.backoff(attempt);
                warn!(vendor = %slot.vendor, attempt, error = %e, ?delay, "login attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(classify_login_error(slot.vendor, e, attempt)),
        }
    }
}

fn classify_login_error(vendor: Vendor, err: pethub_api::Error, attempts: u32) -> CoreError {
    use pethub_api::Error as ApiError;

    let operation = Operation::Login;
    match err {
        ApiError::RateLimited { retry_after_secs } => CoreError::RateLimited {
            vendor,
            operation,
            retry_after_secs,
        },
        ApiError::Authentication { message }
        | ApiError::SessionExpired { message }
        | ApiError::Rejected { message } => CoreError::Auth {
            vendor,
            operation,
            cause: AuthCause::InvalidCredentials,
            message,
        },
        ApiError::Vendor { code, message } => CoreError::Auth {
            vendor,
            operation,
            cause: AuthCause::InvalidCredentials,
            message: format!("code {code}: {message}"),
        },
        ApiError::Http { status, message } if (400..500).contains(&status) => CoreError::Auth {
            vendor,
            operation,
            cause: AuthCause::InvalidCredentials,
            message: format!("HTTP {status}: {message}"),
        },
        ApiError::InvalidUrl(e) => CoreError::Internal(format!("invalid {vendor} endpoint: {e}")),
        other => CoreError::Auth {
            vendor,
            operation,
            cause: AuthCause::Unreachable,
            message: format!("{other} (after {attempts} attempt(s))"),
        },
    }
}
