// CloudPets HTTP client
//
// Wraps `reqwest::Client` with the CloudPets default headers, per-call
// `authorization` injection, and `{ code, msg, result }` unwrapping.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::cloudpets::models::{Envelope, Status};
use crate::error::Error;
use crate::transport::{TransportConfig, preview, retry_after};

/// Raw HTTP client for the CloudPets cloud.
///
/// Family-scoped: the `x-cp-familyid` header is fixed at construction.
/// The session token is passed into every authenticated call.
#[derive(Clone)]
pub struct CloudPetsClient {
    http: reqwest::Client,
    base_url: Url,
    family_id: String,
}

impl CloudPetsClient {
    /// Create a new client for one family.
    ///
    /// `base_url` is the cloud root (e.g. `https://cn.cloudpets.net`).
    pub fn new(
        base_url: &str,
        family_id: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let family_id = family_id.into();

        let mut headers = HeaderMap::new();
        headers.insert("lang", HeaderValue::from_static("zh_CN"));
        headers.insert("platform", HeaderValue::from_static("Android"));
        headers.insert("x-cp-client", HeaderValue::from_static("1"));
        headers.insert(
            "x-cp-familyid",
            HeaderValue::from_str(&family_id).map_err(|e| Error::Authentication {
                message: format!("invalid family id header value: {e}"),
            })?,
        );

        let http = transport.build_client_with_headers(headers)?;
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            family_id,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn family_id(&self) -> &str {
        &self.family_id
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Build a request with the session token attached.
    pub(crate) fn authorized(
        &self,
        method: reqwest::Method,
        session: &SecretString,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let url = self.url(path)?;
        debug!("{method} {url}");

        let mut token = HeaderValue::from_str(session.expose_secret()).map_err(|e| {
            Error::SessionExpired {
                message: format!("unusable session token: {e}"),
            }
        })?;
        token.set_sensitive(true);

        Ok(self.http.request(method, url).header("authorization", token))
    }

    /// Send a request and unwrap `result` from the envelope.
    ///
    /// Returns `Ok(None)` for an empty body or an envelope without `result`.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<Option<T>, Error> {
        let resp = builder.send().await?;
        let body = check_response(resp).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let envelope: Envelope<T> = decode(&body)?;
        Ok(envelope.result)
    }

    /// Send a request and hand back the checked raw body for callers with
    /// irregular response shapes (plan lists).
    pub(crate) async fn send_raw(&self, builder: reqwest::RequestBuilder) -> Result<String, Error> {
        let resp = builder.send().await?;
        check_response(resp).await
    }
}

/// Apply HTTP status and envelope `code` checks, returning the body.
pub(crate) async fn check_response(resp: reqwest::Response) -> Result<String, Error> {
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

    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
            message: preview(&body).to_owned(),
        });
    }

    if body.trim().is_empty() {
        return Ok(body);
    }

    let envelope: Status = decode(&body)?;
    match envelope.code {
        None | Some(0 | 200) => Ok(body),
        Some(401) => Err(Error::SessionExpired {
            message: envelope.msg.unwrap_or_default(),
        }),
        Some(429) => Err(Error::RateLimited {
            retry_after_secs: None,
        }),
        Some(code) => Err(Error::Vendor {
            code,
            message: envelope.msg.unwrap_or_default(),
        }),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })
}
