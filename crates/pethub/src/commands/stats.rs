//! Device statistics.

use std::fmt::Write;

use pethub_core::{Hub, StatsSnapshot};

use crate::cli::{GlobalOpts, StatsArgs};
use crate::error::CliError;
use crate::output;

fn detail(s: &StatsSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Device:   {} ({})", s.device_id, s.vendor);
    let _ = writeln!(out, "Source:   {}", s.source);
    let _ = writeln!(out, "As of:    {}", s.as_of.format("%Y-%m-%d %H:%M:%S UTC"));
    if s.stale {
        let _ = writeln!(out, "Stale:    yes");
    }
    for (metric, value) in &s.metrics {
        let _ = writeln!(out, "  {metric:<20} {value}");
    }
    for warning in &s.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    out.trim_end().to_owned()
}

fn plain(s: &StatsSnapshot) -> String {
    s.metrics
        .iter()
        .map(|(metric, value)| format!("{metric}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle(args: &StatsArgs, hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = hub.fetch_stats(args.vendor, &args.device).await?;
    for warning in &snapshot.warnings {
        tracing::warn!(device = %snapshot.device_id, "{warning}");
    }
    let out = output::render_single(global.format(), &snapshot, detail, plain)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
