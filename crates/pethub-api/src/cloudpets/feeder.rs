// CloudPets feeder endpoints
//
// Device listing, today's servings counter, manual feeding and the
// feeder light.

use reqwest::Method;
use secrecy::SecretString;

use crate::cloudpets::client::CloudPetsClient;
use crate::cloudpets::models::{FeederDevice, ServingsResult, ServingsToday};
use crate::error::Error;

impl CloudPetsClient {
    /// List the feeders registered to this family.
    pub async fn list_feeders(&self, session: &SecretString) -> Result<Vec<FeederDevice>, Error> {
        let builder = self
            .authorized(Method::POST, session, "app/terminal/device/list")?
            .form(&[("familyId", self.family_id())]);
        let devices: Option<Vec<FeederDevice>> = self.send(builder).await?;
        Ok(devices.unwrap_or_default())
    }

    /// Portions dispensed today. `Ok(None)` when the vendor sent no result.
    pub async fn servings_today(
        &self,
        session: &SecretString,
        device_id: &str,
    ) -> Result<Option<ServingsToday>, Error> {
        let builder = self
            .authorized(Method::POST, session, "app/terminal/feeder/servingsToday")?
            .form(&[("deviceId", device_id)]);
        let result: Option<ServingsResult> = self.send(builder).await?;
        Ok(result.map(ServingsToday::from))
    }

    /// Dispense `portions` immediately.
    ///
    /// A 200 envelope code is the vendor's acceptance; any other code is
    /// surfaced as [`Error::Vendor`].
    pub async fn manual_feed(
        &self,
        session: &SecretString,
        device_id: &str,
        portions: u32,
    ) -> Result<(), Error> {
        let portions = portions.to_string();
        let builder = self
            .authorized(Method::POST, session, "app/terminal/feeder/manualFeed")?
            .form(&[("deviceId", device_id), ("unit", portions.as_str())]);
        self.send::<serde_json::Value>(builder).await?;
        Ok(())
    }

    /// Switch the feeder light on or off.
    pub async fn set_light(
        &self,
        session: &SecretString,
        device_id: &str,
        on: bool,
    ) -> Result<(), Error> {
        let enable = if on { "true" } else { "false" };
        let builder = self
            .authorized(Method::POST, session, "app/terminal/feeder/light")?
            .form(&[("deviceId", device_id), ("enable", enable)]);
        self.send::<serde_json::Value>(builder).await?;
        Ok(())
    }
}
