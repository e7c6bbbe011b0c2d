// PetKit HTTP client
//
// Wraps `reqwest::Client` with PetKit URL construction and envelope
// unwrapping. Endpoint groups (auth, devices) are implemented as inherent
// methods in sibling files to keep this module focused on transport.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::petkit::models::Envelope;
use crate::transport::{TransportConfig, preview, retry_after};

/// Envelope error code PetKit uses for an expired or unknown session.
const SESSION_EXPIRED_CODE: i64 = 5;

/// Raw HTTP client for the PetKit cloud.
///
/// Stateless apart from the account's region settings: the session token
/// is passed into every authenticated call.
#[derive(Clone)]
pub struct PetKitClient {
    http: reqwest::Client,
    base_url: Url,
    region: String,
    timezone: String,
}

impl PetKitClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the regional API root (e.g. `https://api.petkit.cn/6/`).
    pub fn new(
        base_url: &str,
        region: impl Into<String>,
        timezone: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(
            transport.build_client()?,
            normalize_base_url(base_url)?,
            region,
            timezone,
        ))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        region: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            region: region.into(),
            timezone: timezone.into(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Join a relative endpoint path onto the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// POST a form without a session (login).
    pub(crate) async fn post_anonymous<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &(impl Serialize + Sync),
    ) -> Result<Option<T>, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).form(form).send().await?;
        self.parse_envelope(resp).await
    }

    /// POST a form with the session headers attached.
    pub(crate) async fn post_form<T: DeserializeOwned>(
        &self,
        session: &SecretString,
        path: &str,
        form: &(impl Serialize + Sync),
    ) -> Result<Option<T>, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let token = session.expose_secret();
        let resp = self
            .http
            .post(url)
            .header("X-Session", token)
            .header("F-Session", token)
            .header("X-Timezone", &self.timezone)
            .form(form)
            .send()
            .await?;
        self.parse_envelope(resp).await
    }

    /// Map HTTP status + `{ result, error }` envelope into `result`.
    async fn parse_envelope<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<Option<T>, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired {
                message: "HTTP 401".into(),
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                retry_after_secs: retry_after(resp.headers()),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: preview(&body).to_owned(),
            });
        }

        let body = resp.text().await?;
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&body)),
                body: body.clone(),
            })?;

        if let Some(err) = envelope.error {
            let message = err.msg.unwrap_or_default();
            return Err(if err.code == SESSION_EXPIRED_CODE {
                Error::SessionExpired { message }
            } else {
                Error::Vendor {
                    code: err.code,
                    message,
                }
            });
        }

        Ok(envelope.result)
    }
}

/// Ensure the base URL ends with `/` so relative joins append instead of
/// replacing the last path segment.
fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
