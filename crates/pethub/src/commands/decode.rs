//! Offline scale frame decoding.

use pethub_core::{Hub, TelemetryFrame};

use crate::cli::{DecodeArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Parse hex service data, ignoring whitespace and `:` separators.
fn parse_hex(input: &str) -> Result<Vec<u8>, CliError> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();

    let invalid = |reason: &str| CliError::Validation {
        field: "frame".into(),
        reason: reason.into(),
    };
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(invalid("not a hex string"));
    }
    if digits.len() % 2 != 0 {
        return Err(invalid("odd number of hex digits"));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| invalid("not a hex string"))
        })
        .collect()
}

fn detail(f: &TelemetryFrame) -> String {
    let impedance = f
        .impedance_ohms()
        .map_or_else(|| "-".into(), |ohms| format!("{ohms} ohm"));
    [
        format!("Weight:     {:.2} kg", f.weight_kg),
        format!("Unit:       {}", f.unit_hint),
        format!("Stabilized: {}", if f.stabilized { "yes" } else { "no" }),
        format!("Impedance:  {impedance}"),
    ]
    .join("\n")
}

pub fn handle(args: &DecodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let bytes = parse_hex(&args.frame)?;
    let frame = Hub::decode_telemetry(&bytes)?;
    let out = output::render_single(global.format(), &frame, detail, |f| {
        format!("{:.2}", f.weight_kg)
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
