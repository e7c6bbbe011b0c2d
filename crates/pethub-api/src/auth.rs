use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// The vendor clouds the hub talks to.
///
/// Used as the key for credentials, sessions and adapters throughout the
/// workspace. Parses from and displays as the lowercase vendor name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Vendor {
    /// PetKit litter boxes (T3 / T4 / T5).
    PetKit,
    /// CloudPets smart feeders.
    CloudPets,
}

/// Result of a successful login call.
///
/// The token is opaque; `expires_in` is only set when the vendor reports
/// a lifetime. Callers infer one otherwise.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: SecretString,
    pub expires_in: Option<Duration>,
}

impl LoginGrant {
    pub fn new(token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_in,
        }
    }
}
