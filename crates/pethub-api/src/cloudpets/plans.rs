// CloudPets feeding plans
//
// CRUD over the feeder's schedule. Plans are written as form bodies with
// zero-padded hour/minute and comma-separated weekdays.

use reqwest::Method;
use secrecy::SecretString;
use tracing::debug;

use crate::cloudpets::client::{CloudPetsClient, decode};
use crate::cloudpets::models::{PlanListBody, PlanRecord};
use crate::error::Error;

/// Device type code CloudPets uses for feeders in plan queries.
const FEEDER_DEVICE_TYPE: &str = "66";

impl CloudPetsClient {
    /// List every plan configured on a feeder.
    pub async fn list_plans(
        &self,
        session: &SecretString,
        device_id: &str,
    ) -> Result<Vec<PlanRecord>, Error> {
        let path = format!("app/terminal/feeder/planList/{device_id}");
        let builder = self.authorized(Method::GET, session, &path)?.query(&[
            ("deviceType", FEEDER_DEVICE_TYPE),
            ("pageNum", "1"),
            ("pageSize", "1000"),
        ]);

        let body = self.send_raw(builder).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let list: PlanListBody = decode(&body)?;
        let plans = list.into_records();
        debug!(count = plans.len(), "loaded feeding plans");
        Ok(plans)
    }

    /// Create a plan. `plan.id` is ignored.
    pub async fn add_plan(
        &self,
        session: &SecretString,
        device_id: &str,
        plan: &PlanRecord,
    ) -> Result<(), Error> {
        let form = plan_form(device_id, None, plan);
        let builder = self
            .authorized(Method::POST, session, "app/terminal/feeder/feedPlan")?
            .form(&form);
        self.send::<serde_json::Value>(builder).await?;
        Ok(())
    }

    /// Replace an existing plan.
    pub async fn update_plan(
        &self,
        session: &SecretString,
        device_id: &str,
        plan_id: &str,
        plan: &PlanRecord,
    ) -> Result<(), Error> {
        let form = plan_form(device_id, Some(plan_id), plan);
        let builder = self
            .authorized(Method::PUT, session, "app/terminal/feeder/feedPlan")?
            .form(&form);
        self.send::<serde_json::Value>(builder).await?;
        Ok(())
    }

    /// Delete a plan. An empty response body counts as success.
    pub async fn delete_plan(&self, session: &SecretString, plan_id: &str) -> Result<(), Error> {
        let path = format!("app/terminal/feeder/plan/{plan_id}");
        let builder = self.authorized(Method::DELETE, session, &path)?;
        self.send::<serde_json::Value>(builder).await?;
        Ok(())
    }
}

fn plan_form(device_id: &str, plan_id: Option<&str>, plan: &PlanRecord) -> Vec<(&'static str, String)> {
    let days = if plan.days_of_week.is_empty() {
        "1,2,3,4,5,6,7".to_owned()
    } else {
        plan.days_of_week
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };

    let mut form = Vec::with_capacity(8);
    if let Some(id) = plan_id {
        form.push(("id", id.to_owned()));
    }
    form.extend([
        ("deviceId", device_id.to_owned()),
        ("daysOfWeek", days),
        ("enable", plan.enable.to_string()),
        ("hour", format!("{:02}", plan.hour)),
        ("minute", format!("{:02}", plan.minute)),
        ("serving", plan.serving.to_string()),
        ("remark", plan.remark.clone().unwrap_or_default()),
    ]);
    form
}
