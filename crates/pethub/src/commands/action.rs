//! Device actions.

use pethub_core::{Ack, Action, Hub};

use crate::cli::{ActionArgs, ActionKind, GlobalOpts, LightState};
use crate::error::CliError;
use crate::output;

fn to_action(kind: &ActionKind) -> Action {
    match kind {
        ActionKind::Clean => Action::Clean,
        ActionKind::Deodorize => Action::Deodorize,
        ActionKind::Feed { portions } => Action::Feed {
            portions: *portions,
        },
        ActionKind::Light { state } => Action::Light {
            on: matches!(state, LightState::On),
        },
    }
}

fn detail(ack: &Ack) -> String {
    format!(
        "{} acknowledged by {} device {} at {}",
        ack.action,
        ack.vendor,
        ack.device_id,
        ack.acknowledged_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

pub async fn handle(args: &ActionArgs, hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    let ack = hub
        .trigger_action(args.vendor, &args.device, to_action(&args.kind))
        .await?;
    let out = output::render_single(global.format(), &ack, detail, |a| a.device_id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
