// ── Vendor adapters ──
//
// A closed set of vendor variants behind one capability contract:
// list devices, trigger an action, fetch stats. Adapters hold only their
// HTTP client; the session is handed in per call. They return raw
// `pethub_api::Error`s so the dispatcher can classify them.

mod cloudpets;
mod petkit;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use pethub_api::{LoginGrant, Vendor};
use serde::Serialize;
use tracing::warn;

pub use cloudpets::CloudPetsAdapter;
pub use petkit::PetKitAdapter;

use crate::credentials::Credential;
use crate::session::{Authenticator, Session};
use crate::stats::{Metric, MetricValue};

// ── Capabilities and actions ────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Capability {
    Clean,
    Deodorize,
    Feed,
    Light,
}

/// A device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    Clean,
    Deodorize,
    Feed { portions: u32 },
    Light { on: bool },
}

impl Action {
    /// The capability a device needs to accept this action.
    pub fn capability(&self) -> Capability {
        match self {
            Self::Clean => Capability::Clean,
            Self::Deodorize => Capability::Deodorize,
            Self::Feed { .. } => Capability::Feed,
            Self::Light { .. } => Capability::Light,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("clean"),
            Self::Deodorize => f.write_str("deodorize"),
            Self::Feed { portions } => write!(f, "feed {portions} portion(s)"),
            Self::Light { on: true } => f.write_str("light on"),
            Self::Light { on: false } => f.write_str("light off"),
        }
    }
}

// ── Device and result types ─────────────────────────────────────────

/// A vendor device as seen by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRef {
    pub vendor: Vendor,
    /// Vendor-native device id.
    pub id: String,
    pub name: String,
    pub model: Option<String>,
    pub capabilities: BTreeSet<Capability>,
}

impl DeviceRef {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Vendor confirmation of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub vendor: Vendor,
    pub device_id: String,
    pub action: Action,
    pub acknowledged_at: DateTime<Utc>,
}

/// Normalized counters from one stats fetch, before reconciliation.
///
/// `degraded` lists metrics the vendor could not report
/// authoritatively; they are absent from `metrics`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsCandidate {
    pub vendor: Vendor,
    pub device_id: String,
    pub metrics: BTreeMap<Metric, MetricValue>,
    pub degraded: Vec<Metric>,
    /// The vendor marked its own response as partial.
    pub partial: bool,
    pub fetched_at: DateTime<Utc>,
}

// ── VendorAdapter ───────────────────────────────────────────────────

#[derive(Clone)]
pub enum VendorAdapter {
    PetKit(PetKitAdapter),
    CloudPets(CloudPetsAdapter),
}

impl VendorAdapter {
    pub fn vendor(&self) -> Vendor {
        match self {
            Self::PetKit(_) => Vendor::PetKit,
            Self::CloudPets(_) => Vendor::CloudPets,
        }
    }

    /// Capabilities every device of this vendor's supported models offers.
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        match self {
            Self::PetKit(_) => BTreeSet::from(petkit::CAPABILITIES),
            Self::CloudPets(_) => BTreeSet::from(cloudpets::CAPABILITIES),
        }
    }

    pub async fn list_devices(&self, session: &Session) -> Result<Vec<DeviceRef>, pethub_api::Error> {
        match self {
            Self::PetKit(adapter) => adapter.list_devices(session).await,
            Self::CloudPets(adapter) => adapter.list_devices(session).await,
        }
    }

    /// Send `action` and wait for the vendor's verdict.
    pub async fn trigger_action(
        &self,
        session: &Session,
        device: &DeviceRef,
        action: Action,
    ) -> Result<Ack, pethub_api::Error> {
        match self {
            Self::PetKit(adapter) => adapter.trigger_action(session, device, action).await?,
            Self::CloudPets(adapter) => adapter.trigger_action(session, device, action).await?,
        }
        Ok(Ack {
            vendor: self.vendor(),
            device_id: device.id.clone(),
            action,
            acknowledged_at: Utc::now(),
        })
    }

    pub async fn fetch_stats(
        &self,
        session: &Session,
        device: &DeviceRef,
    ) -> Result<StatsCandidate, pethub_api::Error> {
        match self {
            Self::PetKit(adapter) => adapter.fetch_stats(session, device).await,
            Self::CloudPets(adapter) => adapter.fetch_stats(session, device).await,
        }
    }

    pub fn as_cloudpets(&self) -> Option<&CloudPetsAdapter> {
        match self {
            Self::CloudPets(adapter) => Some(adapter),
            Self::PetKit(_) => None,
        }
    }
}

impl Authenticator for VendorAdapter {
    fn login(
        &self,
        credential: Arc<Credential>,
    ) -> BoxFuture<'static, Result<LoginGrant, pethub_api::Error>> {
        match self {
            Self::PetKit(adapter) => {
                let adapter = adapter.clone();
                Box::pin(async move { adapter.login(&credential).await })
            }
            Self::CloudPets(adapter) => {
                let adapter = adapter.clone();
                Box::pin(async move { adapter.login(&credential).await })
            }
        }
    }

    fn default_session_ttl(&self) -> Duration {
        match self {
            Self::PetKit(_) => petkit::SESSION_TTL,
            Self::CloudPets(_) => cloudpets::SESSION_TTL,
        }
    }
}

/// Error for an action that reached an adapter which cannot perform it.
fn unsupported(device: &DeviceRef, action: Action) -> pethub_api::Error {
    pethub_api::Error::Rejected {
        message: format!("{} cannot {action}", device.id),
    }
}

/// Treat a 404 from an optional endpoint as "nothing reported".
///
/// Older firmware and regional clouds lack some statistics endpoints;
/// the affected metrics then degrade instead of failing the fetch.
fn unless_not_found<T>(
    device: &DeviceRef,
    endpoint: &str,
    result: Result<Option<T>, pethub_api::Error>,
) -> Result<Option<T>, pethub_api::Error> {
    match result {
        Err(e) if e.is_not_found() => {
            warn!(device_id = %device.id, endpoint, "endpoint unavailable");
            Ok(None)
        }
        other => other,
    }
}
