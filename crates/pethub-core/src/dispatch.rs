// ── Request dispatcher ──
//
// Wraps every vendor call with the recovery protocol:
//   * an auth-expired response invalidates the session and retries once
//     with a fresh one; a second one is terminal,
//   * transport failures retry up to `RetryPolicy::transport_attempts`
//     with backoff,
//   * throttling is surfaced immediately.
// Everything else is classified by `CoreError::from_api`.

use std::future::Future;
use std::sync::Arc;

use pethub_api::Vendor;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{AuthCause, CoreError};
use crate::session::{Session, SessionManager};

/// The abstract operation a request performs, carried by every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Operation {
    Login,
    ListDevices,
    TriggerAction,
    FetchStats,
    ListPlans,
    AddPlan,
    UpdatePlan,
    DeletePlan,
}

/// Runs vendor calls under the session/retry protocol.
#[derive(Clone)]
pub struct Dispatcher {
    sessions: Arc<SessionManager>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(sessions: Arc<SessionManager>, retry: RetryPolicy) -> Self {
        Self { sessions, retry }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Execute `call` with a valid session for `vendor`.
    ///
    /// `call` may run more than once (transport retry, one re-login
    /// retry), so it must build its request from scratch each time.
    pub async fn dispatch<T, F, Fut>(
        &self,
        vendor: Vendor,
        operation: Operation,
        call: F,
    ) -> Result<T, CoreError>
    where
        F: Fn(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T, pethub_api::Error>>,
    {
        let attempts = self.retry.transport_attempts.max(1);
        let mut transport_attempt = 1;
        let mut reauthenticated = false;
        let mut session = self.sessions.get_valid_session(vendor).await?;

        loop {
            debug!(%vendor, %operation, transport_attempt, generation = session.generation(), "dispatching");

            let err = match call(Arc::clone(&session)).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if err.is_auth_expired() {
                if reauthenticated {
                    warn!(%vendor, %operation, error = %err, "fresh session rejected again");
                    return Err(CoreError::Auth {
                        vendor,
                        operation,
                        cause: AuthCause::Repeated,
                        message: err.to_string(),
                    });
                }
                warn!(%vendor, %operation, error = %err, "session rejected, re-authenticating once");
                self.sessions.invalidate_session(&session).await;
                session = self.sessions.get_valid_session(vendor).await?;
                reauthenticated = true;
                continue;
            }

            if err.is_rate_limited() {
                return Err(CoreError::RateLimited {
                    vendor,
                    operation,
                    retry_after_secs: err.retry_after_secs(),
                });
            }

            if err.is_transient() {
                if transport_attempt >= attempts {
                    return Err(CoreError::VendorUnavailable {
                        vendor,
                        operation,
                        attempts: transport_attempt,
                        message: err.to_string(),
                    });
                }
                let delay = self.retry.backoff(transport_attempt);
                warn!(%vendor, %operation, transport_attempt, error = %err, ?delay, "transport failure, retrying");
                tokio::time::sleep(delay).await;
                transport_attempt += 1;
                continue;
            }

            return Err(CoreError::from_api(vendor, operation, err));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::future::BoxFuture;
    use pethub_api::LoginGrant;
    use secrecy::SecretString;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::credentials::{Credential, CredentialStore};
    use crate::session::Authenticator;

    struct CountingAuth(Arc<AtomicUsize>);

    impl Authenticator for CountingAuth {
        fn login(
            &self,
            _credential: Arc<Credential>,
        ) -> BoxFuture<'static, Result<LoginGrant, pethub_api::Error>> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok(LoginGrant::new(format!("tok-{n}"), None)) })
        }

        fn default_session_ttl(&self) -> Duration {
            Duration::from_secs(1800)
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<AtomicUsize>) {
        let logins = Arc::new(AtomicUsize::new(0));
        let retry = RetryPolicy {
            transport_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        };
        let credentials = CredentialStore::new([Credential::new(
            Vendor::CloudPets,
            "17700000000",
            SecretString::from("pw".to_string()),
        )]);
        let sessions = SessionManager::new(
            credentials,
            retry,
            Duration::from_secs(30),
            CancellationToken::new(),
        )
        .with_authenticator(Vendor::CloudPets, Arc::new(CountingAuth(Arc::clone(&logins))));
        (Dispatcher::new(Arc::new(sessions), retry), logins)
    }

    /// Replays `script` one entry per call, then succeeds.
    async fn run(
        dispatcher: &Dispatcher,
        script: Vec<pethub_api::Error>,
    ) -> (Result<u64, CoreError>, usize) {
        let script = Mutex::new(VecDeque::from(script));
        let calls = AtomicUsize::new(0);
        let result = dispatcher
            .dispatch(Vendor::CloudPets, Operation::FetchStats, |session| {
                calls.fetch_add(1, Ordering::SeqCst);
                let next = script.lock().unwrap().pop_front();
                async move {
                    match next {
                        Some(err) => Err(err),
                        None => Ok(session.generation()),
                    }
                }
            })
            .await;
        (result, calls.load(Ordering::SeqCst))
    }

    fn expired() -> pethub_api::Error {
        pethub_api::Error::SessionExpired {
            message: "token invalid".into(),
        }
    }

    fn timeout() -> pethub_api::Error {
        pethub_api::Error::Timeout { timeout_secs: 10 }
    }

    #[tokio::test]
    async fn single_auth_expiry_relogs_and_retries_once() {
        let (dispatcher, logins) = dispatcher();

        let (result, calls) = run(&dispatcher, vec![expired()]).await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 2);
        assert_eq!(logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_auth_expiry_is_terminal() {
        let (dispatcher, logins) = dispatcher();

        let (result, calls) = run(&dispatcher, vec![expired(), expired(), expired()]).await;

        assert!(matches!(
            result,
            Err(CoreError::Auth {
                cause: AuthCause::Repeated,
                ..
            })
        ));
        assert_eq!(calls, 2);
        assert_eq!(logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transport_failures_are_bounded() {
        let (dispatcher, logins) = dispatcher();

        let (result, calls) = run(&dispatcher, vec![timeout(), timeout(), timeout()]).await;

        assert!(matches!(
            result,
            Err(CoreError::VendorUnavailable { attempts: 2, .. })
        ));
        assert_eq!(calls, 2);
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_then_success() {
        let (dispatcher, _) = dispatcher();

        let (result, calls) = run(&dispatcher, vec![timeout()]).await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn rate_limit_is_never_retried() {
        let (dispatcher, _) = dispatcher();

        let (result, calls) = run(
            &dispatcher,
            vec![pethub_api::Error::RateLimited {
                retry_after_secs: Some(5),
            }],
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.retry_after_secs(), Some(5));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn vendor_refusal_is_surfaced_as_rejection() {
        let (dispatcher, _) = dispatcher();

        let (result, calls) = run(
            &dispatcher,
            vec![pethub_api::Error::Vendor {
                code: 500,
                message: "feeder offline".into(),
            }],
        )
        .await;

        assert!(matches!(result, Err(CoreError::Rejected { .. })));
        assert_eq!(calls, 1);
    }
}
