// CloudPets authentication
//
// Account/password login. The token may come back at the top level of the
// body, inside `result`, or as a response header.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::auth::LoginGrant;
use crate::cloudpets::client::{CloudPetsClient, check_response, decode};
use crate::cloudpets::models::LoginBody;
use crate::error::Error;

/// Strip the `+86-` / `86-` / `+86` country prefix the mobile app stores with
/// phone-number accounts. CloudPets expects the bare number.
pub fn normalize_account(account: &str) -> &str {
    ["+86-", "86-", "+86"]
        .iter()
        .find_map(|prefix| account.strip_prefix(prefix))
        .unwrap_or(account)
}

impl CloudPetsClient {
    /// Authenticate with the CloudPets cloud.
    ///
    /// CloudPets does not report a token lifetime, so the grant carries
    /// no expiry.
    pub async fn login(&self, account: &str, password: &SecretString) -> Result<LoginGrant, Error> {
        let account = normalize_account(account);
        debug!("logging in to CloudPets");

        let url = self.url("app/terminal/user/login")?;
        let form = [
            ("account", account),
            ("pwd", password.expose_secret()),
            ("userType", "1"),
        ];

        let resp = self.http().post(url).form(&form).send().await?;
        let header_token = resp
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = check_response(resp).await.map_err(|e| match e {
            Error::Vendor { code, message } => Error::Authentication {
                message: format!("login refused (code {code}): {message}"),
            },
            Error::SessionExpired { message } => Error::Authentication { message },
            other => other,
        })?;

        let parsed: Option<LoginBody> = if body.trim().is_empty() {
            None
        } else {
            Some(decode(&body)?)
        };

        let token = parsed
            .and_then(|b| {
                b.authorization.or_else(|| {
                    b.result
                        .as_ref()
                        .and_then(|r| r.get("authorization"))
                        .and_then(serde_json::Value::as_str)
                        .map(String::from)
                })
            })
            .or(header_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no authorization token".into(),
            })?;

        debug!("CloudPets login successful");
        Ok(LoginGrant::new(token, None))
    }
}
