//! Command handlers, one module per subcommand.

pub mod action;
pub mod config_cmd;
pub mod decode;
pub mod devices;
pub mod plans;
pub mod stats;

use pethub_core::Hub;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a vendor-facing command to its handler.
pub async fn dispatch(cmd: Command, hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(&args, hub, global).await,
        Command::Action(args) => action::handle(&args, hub, global).await,
        Command::Stats(args) => stats::handle(&args, hub, global).await,
        Command::Plans(args) => plans::handle(args, hub, global).await,
        Command::Decode(_) | Command::Config(_) => Err(CliError::Internal(
            "offline command routed to the hub".into(),
        )),
    }
}
