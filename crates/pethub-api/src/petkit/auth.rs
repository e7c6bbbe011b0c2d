// PetKit authentication
//
// Username/password login returning an opaque session id. The session is
// sent back as `X-Session` on every call (see `client.rs`).

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::auth::LoginGrant;
use crate::error::Error;
use crate::petkit::client::PetKitClient;
use crate::petkit::models::LoginResult;

impl PetKitClient {
    /// Authenticate with the PetKit cloud.
    ///
    /// Envelope errors from the login endpoint are always credential
    /// problems, so they surface as [`Error::Authentication`] rather than
    /// [`Error::SessionExpired`].
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<LoginGrant, Error> {
        debug!(region = %self.region(), "logging in to PetKit");

        let form = [
            ("username", username),
            ("password", password.expose_secret()),
            ("region", self.region()),
            ("timezone", self.timezone()),
            ("encrypt", "0"),
        ];

        let result: Option<LoginResult> = self
            .post_anonymous("user/login", &form)
            .await
            .map_err(|e| match e {
                Error::Vendor { code, message } => Error::Authentication {
                    message: format!("login refused (code {code}): {message}"),
                },
                Error::SessionExpired { message } => Error::Authentication { message },
                other => other,
            })?;

        let session = result
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no session".into(),
            })?
            .session;

        debug!("PetKit login successful");
        Ok(LoginGrant::new(
            session.id,
            session.expires_in.map(Duration::from_secs),
        ))
    }
}
