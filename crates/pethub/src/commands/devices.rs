//! Device listing.

use tabled::Tabled;

use pethub_core::{DeviceRef, Hub};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Capabilities")]
    capabilities: String,
}

fn row(d: &DeviceRef) -> DeviceRow {
    DeviceRow {
        id: d.id.clone(),
        name: d.name.clone(),
        model: d.model.clone().unwrap_or_default(),
        capabilities: d
            .capabilities
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub async fn handle(args: &DevicesArgs, hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = hub.list_devices(args.vendor).await?;
    let out = output::render_list(global.format(), &devices, row, |d| d.id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
