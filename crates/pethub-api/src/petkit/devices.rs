// PetKit device endpoints
//
// Roster listing (litter boxes only), control commands, and the daily
// usage statistic.

use chrono::NaiveDate;
use secrecy::SecretString;
use tracing::{debug, info};

use crate::error::Error;
use crate::petkit::client::PetKitClient;
use crate::petkit::models::{DailyStatistic, DeviceDetail, DeviceRoster, LitterBox};

/// Litter box models the hub knows how to drive.
const LITTER_BOX_MODELS: [&str; 3] = ["T3", "T4", "T5"];

/// Start-action commands understood by `controlDevice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanerAction {
    Clean,
    Deodorize,
}

impl CleanerAction {
    /// Vendor start-action code.
    pub fn code(self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::Deodorize => 2,
        }
    }
}

impl PetKitClient {
    /// List the account's litter boxes.
    ///
    /// Pets and unknown hardware share the roster; they are skipped.
    pub async fn list_litter_boxes(&self, session: &SecretString) -> Result<Vec<LitterBox>, Error> {
        let roster: Option<DeviceRoster> = self
            .post_form(session, "discovery/device_roster", &[("day", "")])
            .await?;

        let entries = roster.map(|r| r.devices).unwrap_or_default();
        let mut boxes = Vec::with_capacity(entries.len());
        for entry in entries {
            let model = entry.kind.to_ascii_uppercase();
            if !LITTER_BOX_MODELS.contains(&model.as_str()) {
                info!(kind = %entry.kind, id = entry.data.id, "skipping non litter box roster entry");
                continue;
            }
            boxes.push(LitterBox {
                id: entry.data.id,
                name: entry.data.name.unwrap_or_else(|| model.clone()),
                model,
            });
        }

        debug!(count = boxes.len(), "PetKit roster loaded");
        Ok(boxes)
    }

    /// Send a start-action to a litter box.
    ///
    /// PetKit answers `"success"` when the device accepted the command.
    /// Anything else is reported as [`Error::Rejected`].
    pub async fn control_device(
        &self,
        session: &SecretString,
        device: &LitterBox,
        action: CleanerAction,
    ) -> Result<(), Error> {
        let path = format!("{}/controlDevice", device.path_segment());
        let id = device.id.to_string();
        let kv = format!("{{\"start_action\":{}}}", action.code());
        let form = [("id", id.as_str()), ("type", "start"), ("kv", kv.as_str())];

        let result: Option<String> = self.post_form(session, &path, &form).await?;
        match result.as_deref() {
            Some("success") => Ok(()),
            Some(other) => Err(Error::Rejected {
                message: format!("device answered '{other}'"),
            }),
            None => Err(Error::Rejected {
                message: "device gave no confirmation".into(),
            }),
        }
    }

    /// Fetch the device detail: consumable levels and alarm flags.
    pub async fn device_detail(
        &self,
        session: &SecretString,
        device: &LitterBox,
    ) -> Result<Option<DeviceDetail>, Error> {
        let path = format!("{}/device_detail", device.path_segment());
        let id = device.id.to_string();

        self.post_form(session, &path, &[("id", id.as_str())]).await
    }

    /// Fetch the daily statistic for one litter box.
    ///
    /// Returns `None` when the cloud has no statistic document for the day.
    pub async fn daily_statistic(
        &self,
        session: &SecretString,
        device: &LitterBox,
        day: NaiveDate,
    ) -> Result<Option<DailyStatistic>, Error> {
        let path = format!("{}/statistic", device.path_segment());
        let id = device.id.to_string();
        let day = day.format("%Y%m%d").to_string();
        let form = [("deviceId", id.as_str()), ("date", day.as_str())];

        self.post_form(session, &path, &form).await
    }
}
