//! Configuration for pethub hosts.
//!
//! A TOML file with one section per vendor, overlaid with `PETHUB_*`
//! environment variables, credential resolution (env + keyring +
//! plaintext), and translation to `pethub_core::HubConfig` plus a
//! populated `CredentialStore`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pethub_core::{
    CloudPetsConfig, Credential, CredentialStore, HubConfig, PetKitConfig, RetryPolicy, TlsMode,
    Vendor,
};

/// Keyring service name; entries are `<vendor>/password`.
pub const KEYRING_SERVICE: &str = "pethub";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for {vendor}")]
    NoCredentials { vendor: Vendor },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// PetKit account; absent means PetKit is not configured.
    pub petkit: Option<PetKitSection>,

    /// CloudPets account; absent means CloudPets is not configured.
    pub cloudpets: Option<CloudPetsSection>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Attempts per vendor call on transport failure, including the first.
    #[serde(default = "default_transport_attempts")]
    pub transport_attempts: u32,

    /// Seconds before estimated session expiry at which to log in again.
    #[serde(default = "default_expiry_skew")]
    pub expiry_skew: u64,

    /// Extra CA certificate (PEM) to trust.
    pub ca_cert: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            transport_attempts: default_transport_attempts(),
            expiry_skew: default_expiry_skew(),
            ca_cert: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_transport_attempts() -> u32 {
    2
}
fn default_expiry_skew() -> u64 {
    30
}

/// PetKit account and endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PetKitSection {
    /// Account email or phone number.
    pub username: Option<String>,

    /// Password (plaintext: prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    pub base_url: String,
    pub region: String,
    pub timezone: String,
}

impl Default for PetKitSection {
    fn default() -> Self {
        let endpoint = PetKitConfig::default();
        Self {
            username: None,
            password: None,
            password_env: None,
            base_url: endpoint.base_url,
            region: endpoint.region,
            timezone: endpoint.timezone,
        }
    }
}

/// CloudPets account and endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloudPetsSection {
    /// Account phone number, with or without the `86-` prefix.
    pub account: Option<String>,

    /// Password (plaintext: prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    pub base_url: String,

    /// Household whose feeders are managed.
    pub family_id: String,
}

impl Default for CloudPetsSection {
    fn default() -> Self {
        let endpoint = CloudPetsConfig::default();
        Self {
            account: None,
            password: None,
            password_env: None,
            base_url: endpoint.base_url,
            family_id: endpoint.family_id,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "pethub", "pethub").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("pethub");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) overlaid with `PETHUB_*`
/// variables, e.g. `PETHUB_PETKIT__USERNAME`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PETHUB_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Credential resolution ───────────────────────────────────────────

/// Environment variable consulted when a section names none.
pub fn default_password_env(vendor: Vendor) -> &'static str {
    match vendor {
        Vendor::PetKit => "PETKIT_PASSWORD",
        Vendor::CloudPets => "CLOUDPETS_PASSWORD",
    }
}

/// Resolve a vendor password from the credential chain.
pub fn resolve_password(
    vendor: Vendor,
    password_env: Option<&str>,
    plaintext: Option<&str>,
) -> Result<SecretString, ConfigError> {
    // 1. Env var
    let env_name = password_env.unwrap_or_else(|| default_password_env(vendor));
    if let Ok(val) = std::env::var(env_name) {
        if !val.is_empty() {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{vendor}/password")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(pw) = plaintext {
        return Ok(SecretString::from(pw.to_owned()));
    }

    Err(ConfigError::NoCredentials { vendor })
}

/// Store a vendor password in the system keyring.
pub fn store_password(vendor: Vendor, password: &str) -> Result<(), ConfigError> {
    let keyring_error = |e: keyring::Error| ConfigError::Validation {
        field: "keyring".into(),
        reason: e.to_string(),
    };
    keyring::Entry::new(KEYRING_SERVICE, &format!("{vendor}/password"))
        .and_then(|entry| entry.set_password(password))
        .map_err(keyring_error)
}

fn principal(vendor: Vendor, value: Option<&String>) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::NoCredentials { vendor })
}

fn check_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    url::Url::parse(raw).map(drop).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

// ── Translation to core types ───────────────────────────────────────

/// Build the hub configuration and credential store from a loaded config.
///
/// Every configured vendor section must resolve a principal and a
/// password.
pub fn to_hub(config: &Config) -> Result<(HubConfig, CredentialStore), ConfigError> {
    let mut credentials = Vec::new();

    let petkit = match &config.petkit {
        Some(section) => {
            check_url("petkit.base_url", &section.base_url)?;
            let username = principal(Vendor::PetKit, section.username.as_ref())?;
            let password = resolve_password(
                Vendor::PetKit,
                section.password_env.as_deref(),
                section.password.as_deref(),
            )?;
            credentials.push(Credential::new(Vendor::PetKit, username, password));
            Some(PetKitConfig {
                base_url: section.base_url.clone(),
                region: section.region.clone(),
                timezone: section.timezone.clone(),
            })
        }
        None => None,
    };

    let cloudpets = match &config.cloudpets {
        Some(section) => {
            check_url("cloudpets.base_url", &section.base_url)?;
            if section.family_id.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: "cloudpets.family_id".into(),
                    reason: "must not be empty".into(),
                });
            }
            let account = principal(Vendor::CloudPets, section.account.as_ref())?;
            let password = resolve_password(
                Vendor::CloudPets,
                section.password_env.as_deref(),
                section.password.as_deref(),
            )?;
            credentials.push(Credential::new(Vendor::CloudPets, account, password));
            Some(CloudPetsConfig {
                base_url: section.base_url.clone(),
                family_id: section.family_id.trim().to_owned(),
            })
        }
        None => None,
    };

    if config.defaults.transport_attempts == 0 {
        return Err(ConfigError::Validation {
            field: "defaults.transport_attempts".into(),
            reason: "must be at least 1".into(),
        });
    }

    let tls = config
        .defaults
        .ca_cert
        .clone()
        .map_or(TlsMode::System, TlsMode::CustomCa);

    let hub = HubConfig {
        petkit,
        cloudpets,
        tls,
        timeout: Duration::from_secs(config.defaults.timeout),
        retry: RetryPolicy {
            transport_attempts: config.defaults.transport_attempts,
            ..RetryPolicy::default()
        },
        expiry_skew: Duration::from_secs(config.defaults.expiry_skew),
    };

    Ok((hub, CredentialStore::new(credentials)))
}
