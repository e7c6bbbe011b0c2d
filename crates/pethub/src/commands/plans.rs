//! CloudPets feeding plans.

use tabled::Tabled;

use pethub_core::{Hub, PlanRecord};

use crate::cli::{GlobalOpts, PlanFields, PlansArgs, PlansCommand};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Serving")]
    serving: u32,
    #[tabled(rename = "Days")]
    days: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Remark")]
    remark: String,
}

fn row(p: &PlanRecord) -> PlanRow {
    PlanRow {
        id: p.id.clone().unwrap_or_default(),
        time: format!("{:02}:{:02}", p.hour, p.minute),
        serving: p.serving,
        days: format_days(&p.days_of_week),
        enabled: if p.enable { "yes" } else { "no" }.into(),
        remark: p.remark.clone().unwrap_or_default(),
    }
}

fn format_days(days: &[u8]) -> String {
    const NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    if days.len() == NAMES.len() {
        return "daily".into();
    }
    days.iter()
        .map(|d| {
            usize::from(*d)
                .checked_sub(1)
                .and_then(|i| NAMES.get(i))
                .map_or_else(|| d.to_string(), |name| (*name).to_owned())
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn to_record(fields: &PlanFields, id: Option<&str>) -> PlanRecord {
    let mut days = fields.days.clone();
    days.sort_unstable();
    days.dedup();
    PlanRecord {
        id: id.map(str::to_owned),
        hour: fields.hour,
        minute: fields.minute,
        serving: fields.serving,
        enable: !fields.disabled,
        days_of_week: days,
        remark: fields.remark.clone(),
    }
}

pub async fn handle(args: PlansArgs, hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        PlansCommand::List { device } => {
            let plans = hub.list_plans(&device).await?;
            let out = output::render_list(global.format(), &plans, row, |p| {
                p.id.clone().unwrap_or_default()
            })?;
            output::print_output(&out, global.quiet);
        }
        PlansCommand::Add { device, plan } => {
            hub.add_plan(&device, &to_record(&plan, None)).await?;
            output::print_output(&format!("Plan added to {device}"), global.quiet);
        }
        PlansCommand::Update {
            device,
            plan_id,
            plan,
        } => {
            hub.update_plan(&device, &plan_id, &to_record(&plan, Some(&plan_id)))
                .await?;
            output::print_output(&format!("Plan {plan_id} updated"), global.quiet);
        }
        PlansCommand::Delete { plan_id } => {
            hub.delete_plan(&plan_id).await?;
            output::print_output(&format!("Plan {plan_id} deleted"), global.quiet);
        }
    }
    Ok(())
}
