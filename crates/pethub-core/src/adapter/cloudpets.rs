// CloudPets feeder adapter.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pethub_api::{CloudPetsClient, LoginGrant, PlanRecord, ServingsToday, Vendor};
use tracing::debug;

use super::{Action, Capability, DeviceRef, StatsCandidate, unless_not_found, unsupported};
use crate::credentials::Credential;
use crate::session::Session;
use crate::stats::{Metric, MetricValue};

/// CloudPets reports no token lifetime; tokens are assumed good for a day.
pub(super) const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub(super) const CAPABILITIES: [Capability; 2] = [Capability::Feed, Capability::Light];

#[derive(Clone)]
pub struct CloudPetsAdapter {
    client: CloudPetsClient,
}

impl CloudPetsAdapter {
    pub fn new(client: CloudPetsClient) -> Self {
        Self { client }
    }

    pub(super) async fn login(&self, credential: &Credential) -> Result<LoginGrant, pethub_api::Error> {
        self.client
            .login(&credential.principal, &credential.secret)
            .await
    }

    pub(super) async fn list_devices(
        &self,
        session: &Session,
    ) -> Result<Vec<DeviceRef>, pethub_api::Error> {
        let feeders = self.client.list_feeders(session.token()).await?;
        Ok(feeders
            .into_iter()
            .map(|feeder| DeviceRef {
                vendor: Vendor::CloudPets,
                name: feeder
                    .device_name
                    .unwrap_or_else(|| format!("Feeder {}", feeder.device_id)),
                id: feeder.device_id,
                model: feeder.device_type,
                capabilities: BTreeSet::from(CAPABILITIES),
            })
            .collect())
    }

    pub(super) async fn trigger_action(
        &self,
        session: &Session,
        device: &DeviceRef,
        action: Action,
    ) -> Result<(), pethub_api::Error> {
        match action {
            Action::Feed { portions } => {
                self.client
                    .manual_feed(session.token(), &device.id, portions)
                    .await
            }
            Action::Light { on } => self.client.set_light(session.token(), &device.id, on).await,
            Action::Clean | Action::Deodorize => Err(unsupported(device, action)),
        }
    }

    pub(super) async fn fetch_stats(
        &self,
        session: &Session,
        device: &DeviceRef,
    ) -> Result<StatsCandidate, pethub_api::Error> {
        let servings = unless_not_found(
            device,
            "servingsToday",
            self.client.servings_today(session.token(), &device.id).await,
        )?
        .unwrap_or_default();
        Ok(candidate(&device.id, &servings))
    }

    // ── Feeding plans ────────────────────────────────────────────────

    pub async fn list_plans(
        &self,
        session: &Session,
        device_id: &str,
    ) -> Result<Vec<PlanRecord>, pethub_api::Error> {
        self.client.list_plans(session.token(), device_id).await
    }

    pub async fn add_plan(
        &self,
        session: &Session,
        device_id: &str,
        plan: &PlanRecord,
    ) -> Result<(), pethub_api::Error> {
        self.client.add_plan(session.token(), device_id, plan).await
    }

    pub async fn update_plan(
        &self,
        session: &Session,
        device_id: &str,
        plan_id: &str,
        plan: &PlanRecord,
    ) -> Result<(), pethub_api::Error> {
        self.client
            .update_plan(session.token(), device_id, plan_id, plan)
            .await
    }

    pub async fn delete_plan(&self, session: &Session, plan_id: &str) -> Result<(), pethub_api::Error> {
        self.client.delete_plan(session.token(), plan_id).await
    }
}

fn candidate(device_id: &str, servings: &ServingsToday) -> StatsCandidate {
    let mut metrics = BTreeMap::new();
    let mut degraded = Vec::new();

    match servings.servings {
        Some(count) => {
            metrics.insert(Metric::ServingsToday, MetricValue::Count(count));
        }
        None => {
            debug!(%device_id, "servings counter missing");
            degraded.push(Metric::ServingsToday);
        }
    }
    if let Some(at) = servings.last_feed_time.and_then(DateTime::from_timestamp_millis) {
        metrics.insert(Metric::LastFeedAt, MetricValue::Timestamp(at));
    }

    StatsCandidate {
        vendor: Vendor::CloudPets,
        device_id: device_id.to_owned(),
        metrics,
        degraded,
        partial: false,
        fetched_at: Utc::now(),
    }
}
