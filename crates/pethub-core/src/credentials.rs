// ── Credential store ──
//
// Per-vendor account secrets, loaded once at startup and read-only
// afterwards. Secrets stay wrapped in `SecretString` and never reach a
// log line: `Debug` output is redacted.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use pethub_api::Vendor;
use secrecy::SecretString;

/// One vendor account.
#[derive(Clone)]
pub struct Credential {
    pub vendor: Vendor,
    /// Account handle (email, phone number).
    pub principal: String,
    pub secret: SecretString,
}

impl Credential {
    pub fn new(vendor: Vendor, principal: impl Into<String>, secret: SecretString) -> Self {
        Self {
            vendor,
            principal: principal.into(),
            secret,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("vendor", &self.vendor)
            .field("principal", &self.principal)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Immutable map of vendor to credential.
///
/// Built once (from a credential source) and shared; there are no
/// mutators. A later credential for the same vendor replaces an earlier
/// one during construction.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: HashMap<Vendor, Arc<Credential>>,
}

impl CredentialStore {
    pub fn new(credentials: impl IntoIterator<Item = Credential>) -> Self {
        credentials.into_iter().collect()
    }

    pub fn get(&self, vendor: Vendor) -> Option<Arc<Credential>> {
        self.entries.get(&vendor).cloned()
    }

    pub fn contains(&self, vendor: Vendor) -> bool {
        self.entries.contains_key(&vendor)
    }

    /// Vendors with a stored credential, in a stable order.
    pub fn vendors(&self) -> Vec<Vendor> {
        let mut vendors: Vec<Vendor> = self.entries.keys().copied().collect();
        vendors.sort();
        vendors
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Credential> for CredentialStore {
    fn from_iter<I: IntoIterator<Item = Credential>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|credential| (credential.vendor, Arc::new(credential)))
                .collect(),
        }
    }
}
