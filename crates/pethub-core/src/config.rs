// ── Runtime hub configuration ──
//
// These types describe *which* vendor clouds to talk to and how hard to
// try. They never touch disk: pethub-config (or any host) builds a
// `HubConfig` and hands it to `Hub::new`.

use std::time::Duration;

use pethub_api::{TlsMode, TransportConfig};

/// PetKit cloud endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetKitConfig {
    pub base_url: String,
    /// Account region code, sent with the login form.
    pub region: String,
    /// IANA timezone name, sent with every request.
    pub timezone: String,
}

impl Default for PetKitConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.petkit.cn/6/".into(),
            region: "CN".into(),
            timezone: "Asia/Shanghai".into(),
        }
    }
}

/// CloudPets cloud endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudPetsConfig {
    pub base_url: String,
    /// Family (household) whose feeders are listed.
    pub family_id: String,
}

impl Default for CloudPetsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cn.cloudpets.net".into(),
            family_id: String::new(),
        }
    }
}

/// Bounds for transport-level retries (also applied to logins).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub transport_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transport_attempts: 2,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (1-based).
    ///
    /// Exponential with a deterministic jitter seeded from the attempt
    /// number, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.initial_backoff.as_secs_f64() * 2.0_f64.powi(exponent);
        let capped = base.min(self.max_backoff.as_secs_f64());

        let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
        let with_jitter = (capped * jitter_factor).clamp(0.0, self.max_backoff.as_secs_f64());

        Duration::from_secs_f64(with_jitter)
    }
}

/// Configuration for a `Hub`.
///
/// A vendor whose section is `None` is not configured: every call for
/// it fails with `CoreError::NotConfigured`.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub petkit: Option<PetKitConfig>,
    pub cloudpets: Option<CloudPetsConfig>,
    pub tls: TlsMode,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// A session this close to its estimated expiry is treated as expired.
    pub expiry_skew: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            petkit: None,
            cloudpets: None,
            tls: TlsMode::default(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            expiry_skew: Duration::from_secs(30),
        }
    }
}

impl HubConfig {
    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_policy_allows_two_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.transport_attempts, 2);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            transport_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        let first = policy.backoff(1);
        let third = policy.backoff(3);
        assert!(first < third, "{first:?} should be shorter than {third:?}");
        assert!(policy.backoff(10) <= Duration::from_millis(500));
        assert_eq!(policy.backoff(2), policy.backoff(2));
    }
}
