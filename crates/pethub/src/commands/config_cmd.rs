//! Config subcommand handlers.

use std::fmt::Write as _;
use std::io::{self, BufRead, IsTerminal, Write as _};

use pethub_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Format config for display, masking passwords.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "transport_attempts = {}", cfg.defaults.transport_attempts);
    let _ = writeln!(out, "expiry_skew = {}", cfg.defaults.expiry_skew);
    if let Some(ref ca) = cfg.defaults.ca_cert {
        let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
    }

    if let Some(ref p) = cfg.petkit {
        let _ = writeln!(out);
        let _ = writeln!(out, "[petkit]");
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        let _ = writeln!(out, "base_url = \"{}\"", p.base_url);
        let _ = writeln!(out, "region = \"{}\"", p.region);
        let _ = writeln!(out, "timezone = \"{}\"", p.timezone);
    }

    if let Some(ref c) = cfg.cloudpets {
        let _ = writeln!(out);
        let _ = writeln!(out, "[cloudpets]");
        if let Some(ref a) = c.account {
            let _ = writeln!(out, "account = \"{a}\"");
        }
        if c.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = c.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        let _ = writeln!(out, "base_url = \"{}\"", c.base_url);
        let _ = writeln!(out, "family_id = \"{}\"", c.family_id);
    }

    out.trim_end().to_owned()
}

fn read_password(prompt: &str) -> Result<String, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "{prompt}");
        let _ = stderr.flush();
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "must not be empty".into(),
        });
    }
    Ok(password)
}

pub fn handle(args: &ConfigArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Show => {
            output::print_output(&format_config_redacted(config), global.quiet);
        }
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(pethub_config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
        }
        ConfigCommand::SetPassword { vendor } => {
            let password = read_password(&format!("{vendor} password: "))?;
            pethub_config::store_password(*vendor, &password)?;
            output::print_output(
                &format!("Stored {vendor} password in the system keyring"),
                global.quiet,
            );
        }
    }
    Ok(())
}
