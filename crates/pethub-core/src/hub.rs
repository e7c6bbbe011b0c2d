// ── Hub ──
//
// The context object hosts construct once at startup and share across
// requests. It owns the adapters, session manager and dispatcher, keeps
// the last device listing per vendor, and exposes the integration
// surface: list devices, trigger actions, fetch stats, feeding plans
// and telemetry decoding.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use pethub_api::{CloudPetsClient, PetKitClient, PlanRecord, Vendor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{
    Ack, Action, Capability, CloudPetsAdapter, DeviceRef, PetKitAdapter, VendorAdapter,
};
use crate::config::HubConfig;
use crate::credentials::CredentialStore;
use crate::dispatch::{Dispatcher, Operation};
use crate::error::CoreError;
use crate::session::{SessionManager, SessionStatus};
use crate::stats::{self, StatsCache, StatsSnapshot};
use crate::telemetry::{self, DecodeError, TelemetryFrame};

/// Entry point for hosts.
///
/// Cheaply cloneable via `Arc<HubInner>`. Performs no background work:
/// every network call happens on behalf of a caller.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    adapters: HashMap<Vendor, VendorAdapter>,
    dispatcher: Dispatcher,
    registry: DashMap<Vendor, Vec<DeviceRef>>,
    stats_cache: Arc<dyn StatsCache>,
    cancel: CancellationToken,
}

impl Hub {
    /// Build a hub for every vendor that has a config section.
    ///
    /// Does not contact any vendor: the first request for a vendor
    /// performs its login.
    pub fn new(
        config: HubConfig,
        credentials: CredentialStore,
        stats_cache: Arc<dyn StatsCache>,
    ) -> Result<Self, CoreError> {
        let transport = config.transport();
        let mut adapters = HashMap::new();

        if let Some(petkit) = &config.petkit {
            let client = PetKitClient::new(
                &petkit.base_url,
                petkit.region.clone(),
                petkit.timezone.clone(),
                &transport,
            )
            .map_err(|e| CoreError::Internal(format!("petkit client: {e}")))?;
            adapters.insert(Vendor::PetKit, VendorAdapter::PetKit(PetKitAdapter::new(client)));
        }
        if let Some(cloudpets) = &config.cloudpets {
            let client = CloudPetsClient::new(&cloudpets.base_url, cloudpets.family_id.clone(), &transport)
                .map_err(|e| CoreError::Internal(format!("cloudpets client: {e}")))?;
            adapters.insert(
                Vendor::CloudPets,
                VendorAdapter::CloudPets(CloudPetsAdapter::new(client)),
            );
        }

        for vendor in adapters.keys() {
            if !credentials.contains(*vendor) {
                warn!(%vendor, "vendor configured without credentials");
            }
        }

        let cancel = CancellationToken::new();
        let sessions = adapters.iter().fold(
            SessionManager::new(credentials, config.retry, config.expiry_skew, cancel.clone()),
            |sessions, (vendor, adapter)| sessions.with_authenticator(*vendor, Arc::new(adapter.clone())),
        );
        let dispatcher = Dispatcher::new(Arc::new(sessions), config.retry);

        debug!(vendors = ?adapters.keys().collect::<Vec<_>>(), "hub ready");

        Ok(Self {
            inner: Arc::new(HubInner {
                config,
                adapters,
                dispatcher,
                registry: DashMap::new(),
                stats_cache,
                cancel,
            }),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Vendors this hub has an adapter for, in a stable order.
    pub fn vendors(&self) -> Vec<Vendor> {
        let mut vendors: Vec<Vendor> = self.inner.adapters.keys().copied().collect();
        vendors.sort();
        vendors
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// List the vendor's devices and remember them for later validation.
    pub async fn list_devices(&self, vendor: Vendor) -> Result<Vec<DeviceRef>, CoreError> {
        let adapter = self.adapter(vendor)?;
        let devices = self
            .inner
            .dispatcher
            .dispatch(vendor, Operation::ListDevices, |session| async move {
                adapter.list_devices(&session).await
            })
            .await?;

        debug!(%vendor, count = devices.len(), "device list refreshed");
        self.inner.registry.insert(vendor, devices.clone());
        Ok(devices)
    }

    /// Capabilities a vendor's devices can offer, without a network call.
    pub fn capabilities(&self, vendor: Vendor) -> Result<BTreeSet<Capability>, CoreError> {
        Ok(self.adapter(vendor)?.capabilities())
    }

    /// Send `action` to a device and return the vendor's acknowledgement.
    ///
    /// Fails with `CoreError::Validation`, before any vendor call, when
    /// the vendor or the known device lacks the capability the action
    /// needs.
    pub async fn trigger_action(
        &self,
        vendor: Vendor,
        device_id: &str,
        action: Action,
    ) -> Result<Ack, CoreError> {
        let operation = Operation::TriggerAction;
        let adapter = self.adapter(vendor)?;

        if let Action::Feed { portions: 0 } = action {
            return Err(CoreError::Validation {
                vendor,
                operation,
                message: "feed needs at least one portion".into(),
            });
        }

        if !adapter.capabilities().contains(&action.capability()) {
            return Err(CoreError::Validation {
                vendor,
                operation,
                message: format!("{vendor} devices do not support {}", action.capability()),
            });
        }

        let device = self.resolve_device(vendor, device_id, operation).await?;
        if !device.supports(action.capability()) {
            return Err(CoreError::Validation {
                vendor,
                operation,
                message: format!("device {device_id} does not support {}", action.capability()),
            });
        }

        let device = &device;
        let ack = self
            .inner
            .dispatcher
            .dispatch(vendor, operation, |session| async move {
                adapter.trigger_action(&session, device, action).await
            })
            .await?;

        info!(%vendor, %device_id, %action, "action acknowledged");
        Ok(ack)
    }

    /// Fetch and reconcile today's stats for a device.
    pub async fn fetch_stats(&self, vendor: Vendor, device_id: &str) -> Result<StatsSnapshot, CoreError> {
        let adapter = self.adapter(vendor)?;
        let device = self
            .resolve_device(vendor, device_id, Operation::FetchStats)
            .await?;

        let device = &device;
        let candidate = self
            .inner
            .dispatcher
            .dispatch(vendor, Operation::FetchStats, |session| async move {
                adapter.fetch_stats(&session, device).await
            })
            .await?;

        if !candidate.degraded.is_empty() {
            warn!(%vendor, %device_id, degraded = ?candidate.degraded, "vendor stats degraded");
        }
        let previous = self.inner.stats_cache.previous(vendor, device_id);
        stats::reconcile(candidate, previous.as_ref())
    }

    // ── Feeding plans ────────────────────────────────────────────────

    pub async fn list_plans(&self, device_id: &str) -> Result<Vec<PlanRecord>, CoreError> {
        let operation = Operation::ListPlans;
        let adapter = self.cloudpets()?;
        self.resolve_device(Vendor::CloudPets, device_id, operation)
            .await?;

        self.inner
            .dispatcher
            .dispatch(Vendor::CloudPets, operation, |session| async move {
                adapter.list_plans(&session, device_id).await
            })
            .await
    }

    pub async fn add_plan(&self, device_id: &str, plan: &PlanRecord) -> Result<(), CoreError> {
        let operation = Operation::AddPlan;
        let adapter = self.cloudpets()?;
        validate_plan(plan, operation)?;
        self.resolve_device(Vendor::CloudPets, device_id, operation)
            .await?;

        self.inner
            .dispatcher
            .dispatch(Vendor::CloudPets, operation, |session| async move {
                adapter.add_plan(&session, device_id, plan).await
            })
            .await?;
        info!(%device_id, "feeding plan added");
        Ok(())
    }

    pub async fn update_plan(
        &self,
        device_id: &str,
        plan_id: &str,
        plan: &PlanRecord,
    ) -> Result<(), CoreError> {
        let operation = Operation::UpdatePlan;
        let adapter = self.cloudpets()?;
        validate_plan_id(plan_id, operation)?;
        validate_plan(plan, operation)?;
        self.resolve_device(Vendor::CloudPets, device_id, operation)
            .await?;

        self.inner
            .dispatcher
            .dispatch(Vendor::CloudPets, operation, |session| async move {
                adapter.update_plan(&session, device_id, plan_id, plan).await
            })
            .await?;
        info!(%device_id, %plan_id, "feeding plan updated");
        Ok(())
    }

    pub async fn delete_plan(&self, plan_id: &str) -> Result<(), CoreError> {
        let operation = Operation::DeletePlan;
        let adapter = self.cloudpets()?;
        validate_plan_id(plan_id, operation)?;

        self.inner
            .dispatcher
            .dispatch(Vendor::CloudPets, operation, |session| async move {
                adapter.delete_plan(&session, plan_id).await
            })
            .await?;
        info!(%plan_id, "feeding plan deleted");
        Ok(())
    }

    // ── Telemetry ────────────────────────────────────────────────────

    /// Decode a scale frame. Synchronous; no vendor involved.
    pub fn decode_telemetry(frame: &[u8]) -> Result<TelemetryFrame, DecodeError> {
        telemetry::decode(frame)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub async fn session_status(&self, vendor: Vendor) -> Option<SessionStatus> {
        self.inner.dispatcher.sessions().status(vendor).await
    }

    /// Cancel in-flight logins. Waiters receive `CoreError::Internal`.
    pub fn shutdown(&self) {
        info!("hub shutting down");
        self.inner.cancel.cancel();
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn adapter(&self, vendor: Vendor) -> Result<&VendorAdapter, CoreError> {
        self.inner
            .adapters
            .get(&vendor)
            .ok_or(CoreError::NotConfigured { vendor })
    }

    fn cloudpets(&self) -> Result<&CloudPetsAdapter, CoreError> {
        self.adapter(Vendor::CloudPets)?
            .as_cloudpets()
            .ok_or(CoreError::NotConfigured {
                vendor: Vendor::CloudPets,
            })
    }

    fn lookup(&self, vendor: Vendor, device_id: &str) -> Option<DeviceRef> {
        self.inner
            .registry
            .get(&vendor)
            .and_then(|devices| devices.iter().find(|d| d.id == device_id).cloned())
    }

    /// Find a device in the registry, refreshing the listing once if it
    /// is unknown.
    async fn resolve_device(
        &self,
        vendor: Vendor,
        device_id: &str,
        operation: Operation,
    ) -> Result<DeviceRef, CoreError> {
        if let Some(device) = self.lookup(vendor, device_id) {
            return Ok(device);
        }

        debug!(%vendor, %device_id, "unknown device, refreshing listing");
        self.list_devices(vendor).await?;

        self.lookup(vendor, device_id)
            .ok_or_else(|| CoreError::Validation {
                vendor,
                operation,
                message: format!("unknown device {device_id}"),
            })
    }
}

fn validate_plan(plan: &PlanRecord, operation: Operation) -> Result<(), CoreError> {
    let invalid = |message: String| CoreError::Validation {
        vendor: Vendor::CloudPets,
        operation,
        message,
    };

    if plan.hour > 23 || plan.minute > 59 {
        return Err(invalid(format!(
            "invalid time {:02}:{:02}",
            plan.hour, plan.minute
        )));
    }
    if plan.serving == 0 {
        return Err(invalid("a plan needs at least one serving".into()));
    }
    if let Some(day) = plan.days_of_week.iter().find(|day| !(1..=7).contains(*day)) {
        return Err(invalid(format!("weekday {day} is outside 1..=7")));
    }
    Ok(())
}

fn validate_plan_id(plan_id: &str, operation: Operation) -> Result<(), CoreError> {
    if plan_id.trim().is_empty() {
        return Err(CoreError::Validation {
            vendor: Vendor::CloudPets,
            operation,
            message: "plan id must not be empty".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CloudPetsConfig;
    use crate::stats::MemoryStatsCache;

    fn plan(hour: u8, minute: u8, serving: u32, days: Vec<u8>) -> PlanRecord {
        PlanRecord {
            id: None,
            hour,
            minute,
            serving,
            enable: true,
            days_of_week: days,
            remark: None,
        }
    }

    #[test]
    fn plan_validation() {
        let op = Operation::AddPlan;
        assert!(validate_plan(&plan(7, 30, 1, vec![1, 7]), op).is_ok());
        assert!(validate_plan(&plan(7, 30, 1, vec![]), op).is_ok());
        assert!(validate_plan(&plan(24, 0, 1, vec![]), op).is_err());
        assert!(validate_plan(&plan(7, 60, 1, vec![]), op).is_err());
        assert!(validate_plan(&plan(7, 30, 0, vec![]), op).is_err());
        assert!(validate_plan(&plan(7, 30, 1, vec![0]), op).is_err());
        assert!(validate_plan(&plan(7, 30, 1, vec![8]), op).is_err());
        assert!(validate_plan_id(" ", Operation::DeletePlan).is_err());
    }

    #[tokio::test]
    async fn unconfigured_vendor_fails_without_network() {
        let config = HubConfig {
            cloudpets: Some(CloudPetsConfig {
                base_url: "http://127.0.0.1:9".into(),
                family_id: "1".into(),
            }),
            ..HubConfig::default()
        };
        let hub = Hub::new(config, CredentialStore::default(), Arc::new(MemoryStatsCache::new())).unwrap();

        assert_eq!(hub.vendors(), vec![Vendor::CloudPets]);
        let err = hub.list_devices(Vendor::PetKit).await.unwrap_err();
        assert!(matches!(err, CoreError::NotConfigured { vendor: Vendor::PetKit }));

        // Configured, but no credential to log in with.
        let err = hub.list_devices(Vendor::CloudPets).await.unwrap_err();
        assert!(matches!(err, CoreError::NotConfigured { vendor: Vendor::CloudPets }));
    }

    #[tokio::test]
    async fn zero_portion_feed_is_rejected_locally() {
        let config = HubConfig {
            cloudpets: Some(CloudPetsConfig::default()),
            ..HubConfig::default()
        };
        let hub = Hub::new(config, CredentialStore::default(), Arc::new(MemoryStatsCache::new())).unwrap();

        let err = hub
            .trigger_action(Vendor::CloudPets, "336704", Action::Feed { portions: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn action_outside_vendor_capabilities_is_rejected_locally() {
        let config = HubConfig {
            cloudpets: Some(CloudPetsConfig::default()),
            ..HubConfig::default()
        };
        let hub = Hub::new(config, CredentialStore::default(), Arc::new(MemoryStatsCache::new())).unwrap();

        assert_eq!(
            hub.capabilities(Vendor::CloudPets).unwrap(),
            BTreeSet::from([Capability::Feed, Capability::Light])
        );
        // No credential is configured, so reaching the login would fail
        // with NotConfigured instead.
        let err = hub
            .trigger_action(Vendor::CloudPets, "336704", Action::Clean)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }), "got {err:?}");
    }

    #[test]
    fn decode_telemetry_delegates_to_decoder() {
        assert!(matches!(
            Hub::decode_telemetry(&[0x00, 0x20]),
            Err(DecodeError::TooShort { len: 2 })
        ));
    }
}
