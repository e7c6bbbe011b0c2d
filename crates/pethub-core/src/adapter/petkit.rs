// PetKit litter-box adapter.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{Local, Utc};
use pethub_api::{
    CleanerAction, DailyStatistic, LitterBox, LitterState, LoginGrant, PetKitClient, Vendor,
};
use tracing::debug;

use super::{Action, Capability, DeviceRef, StatsCandidate, unless_not_found, unsupported};
use crate::credentials::Credential;
use crate::session::Session;
use crate::stats::{Metric, MetricValue};

/// Inferred lifetime when the login response carries no `expiresIn`.
pub(super) const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

pub(super) const CAPABILITIES: [Capability; 2] = [Capability::Clean, Capability::Deodorize];

#[derive(Clone)]
pub struct PetKitAdapter {
    client: PetKitClient,
}

impl PetKitAdapter {
    pub fn new(client: PetKitClient) -> Self {
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
        let boxes = self.client.list_litter_boxes(session.token()).await?;
        Ok(boxes
            .into_iter()
            .map(|litter_box| DeviceRef {
                vendor: Vendor::PetKit,
                id: litter_box.id.to_string(),
                name: litter_box.name,
                model: Some(litter_box.model),
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
        let command = match action {
            Action::Clean => CleanerAction::Clean,
            Action::Deodorize => CleanerAction::Deodorize,
            Action::Feed { .. } | Action::Light { .. } => return Err(unsupported(device, action)),
        };
        let litter_box = litter_box(device)?;
        self.client
            .control_device(session.token(), &litter_box, command)
            .await
    }

    pub(super) async fn fetch_stats(
        &self,
        session: &Session,
        device: &DeviceRef,
    ) -> Result<StatsCandidate, pethub_api::Error> {
        let litter_box = litter_box(device)?;
        let today = Local::now().date_naive();

        let statistic = unless_not_found(
            device,
            "statistic",
            self.client
                .daily_statistic(session.token(), &litter_box, today)
                .await,
        )?;
        let detail = unless_not_found(
            device,
            "device_detail",
            self.client.device_detail(session.token(), &litter_box).await,
        )?;

        Ok(candidate(
            &device.id,
            statistic.unwrap_or_default(),
            detail.and_then(|detail| detail.state),
        ))
    }
}

fn litter_box(device: &DeviceRef) -> Result<LitterBox, pethub_api::Error> {
    let id = device
        .id
        .parse()
        .map_err(|_| pethub_api::Error::Rejected {
            message: format!("malformed PetKit device id {:?}", device.id),
        })?;
    Ok(LitterBox {
        id,
        name: device.name.clone(),
        model: device.model.clone().unwrap_or_else(|| "T4".into()),
    })
}

/// Normalize a daily statistic and the device state.
///
/// Only the vendor's daily counter counts as "visits today"; without it
/// the metric is degraded. The lifetime `used_times` counter is reported
/// on its own and never stands in for it.
fn candidate(
    device_id: &str,
    statistic: DailyStatistic,
    state: Option<LitterState>,
) -> StatsCandidate {
    let mut metrics = BTreeMap::new();
    let mut degraded = Vec::new();

    match statistic.times {
        Some(times) => {
            metrics.insert(Metric::TodayVisits, MetricValue::Count(times));
        }
        None => {
            debug!(%device_id, "daily visit counter missing");
            degraded.push(Metric::TodayVisits);
        }
    }
    if let Some(avg) = statistic.avg_time {
        metrics.insert(Metric::AverageVisitSecs, MetricValue::Seconds(avg));
    }
    if let Some(total) = statistic.total_time {
        metrics.insert(Metric::TotalVisitSecs, MetricValue::Seconds(total));
    }

    match state {
        Some(state) => insert_state(&mut metrics, &state),
        None => {
            debug!(%device_id, "device state missing");
            degraded.extend([Metric::SandPercent, Metric::DeodorantLeftDays]);
        }
    }

    let last_weight = statistic
        .statistic_info
        .iter()
        .filter_map(|record| record.pet_weight.map(|grams| (record.time, grams)))
        .max_by_key(|(time, _)| *time)
        .and_then(|(_, grams)| u32::try_from(grams).ok());
    if let Some(grams) = last_weight {
        let kg = (f64::from(grams) / 10.0).round() / 100.0;
        metrics.insert(Metric::LastPetWeight, MetricValue::Kilograms(kg));
    }

    StatsCandidate {
        vendor: Vendor::PetKit,
        device_id: device_id.to_owned(),
        metrics,
        degraded,
        partial: statistic.partial,
        fetched_at: Utc::now(),
    }
}

/// Copy whatever the device state reports; absent fields stay absent.
fn insert_state(metrics: &mut BTreeMap<Metric, MetricValue>, state: &LitterState) {
    if let Some(percent) = state.sand_percent {
        metrics.insert(Metric::SandPercent, MetricValue::Percent(percent));
    }
    if let Some(days) = state.deodorant_left_days {
        metrics.insert(Metric::DeodorantLeftDays, MetricValue::Days(days));
    }
    if let Some(used) = state.used_times {
        metrics.insert(Metric::UsedTimes, MetricValue::Count(used));
    }
    let flags = [
        (Metric::BoxFull, state.box_full),
        (Metric::SandLack, state.sand_lack),
        (Metric::LiquidLack, state.liquid_lack),
    ];
    for (metric, flag) in flags {
        if let Some(flag) = flag {
            metrics.insert(metric, MetricValue::Flag(flag));
        }
    }
}

#[cfg(test)]
mod tests {
    use pethub_api::petkit::StatisticRecord;

    use super::*;

    fn state() -> LitterState {
        LitterState {
            sand_percent: Some(62),
            deodorant_left_days: Some(11),
            used_times: Some(1_408),
            box_full: Some(false),
            sand_lack: Some(false),
            liquid_lack: Some(true),
        }
    }

    #[test]
    fn complete_statistic_is_not_degraded() {
        let statistic = DailyStatistic {
            times: Some(4),
            avg_time: Some(95),
            total_time: Some(380),
            statistic_info: vec![
                StatisticRecord {
                    pet_weight: Some(4_350),
                    time: Some(200),
                },
                StatisticRecord {
                    pet_weight: Some(4_120),
                    time: Some(100),
                },
            ],
            partial: false,
        };
        let candidate = candidate("100200", statistic, Some(state()));

        assert!(candidate.degraded.is_empty());
        assert_eq!(candidate.metrics[&Metric::TodayVisits], MetricValue::Count(4));
        assert_eq!(candidate.metrics[&Metric::LastPetWeight], MetricValue::Kilograms(4.35));
        assert_eq!(candidate.metrics[&Metric::SandPercent], MetricValue::Percent(62));
        assert_eq!(candidate.metrics[&Metric::DeodorantLeftDays], MetricValue::Days(11));
        assert_eq!(candidate.metrics[&Metric::LiquidLack], MetricValue::Flag(true));
    }

    #[test]
    fn missing_daily_counter_is_degraded_not_zero() {
        let candidate = candidate("100200", DailyStatistic::default(), Some(state()));

        assert_eq!(candidate.degraded, vec![Metric::TodayVisits]);
        assert!(!candidate.metrics.contains_key(&Metric::TodayVisits));
    }

    #[test]
    fn lifetime_usage_never_fills_today_visits() {
        let candidate = candidate("100200", DailyStatistic::default(), Some(state()));

        assert_eq!(candidate.metrics[&Metric::UsedTimes], MetricValue::Count(1_408));
        assert!(!candidate.metrics.contains_key(&Metric::TodayVisits));
        assert!(candidate.degraded.contains(&Metric::TodayVisits));
    }

    #[test]
    fn missing_state_degrades_consumables() {
        let statistic = DailyStatistic {
            times: Some(2),
            ..DailyStatistic::default()
        };
        let candidate = candidate("100200", statistic, None);

        assert_eq!(
            candidate.degraded,
            vec![Metric::SandPercent, Metric::DeodorantLeftDays]
        );
        assert_eq!(candidate.metrics[&Metric::TodayVisits], MetricValue::Count(2));
        assert!(!candidate.metrics.contains_key(&Metric::UsedTimes));
    }

    #[test]
    fn non_numeric_device_id_is_rejected() {
        let device = DeviceRef {
            vendor: Vendor::PetKit,
            id: "abc".into(),
            name: "Upstairs".into(),
            model: Some("T4".into()),
            capabilities: BTreeSet::new(),
        };
        assert!(matches!(
            litter_box(&device),
            Err(pethub_api::Error::Rejected { .. })
        ));
    }
}
