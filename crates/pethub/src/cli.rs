//! Clap derive structures for the `pethub` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pethub_core::Vendor;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pethub -- control PetKit litter boxes and CloudPets feeders
#[derive(Debug, Parser)]
#[command(
    name = "pethub",
    version,
    about = "Control pet devices from the command line",
    long_about = "Drive PetKit litter boxes and CloudPets feeders through one\n\
        session-managed interface, and decode body-composition scale frames.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "PETHUB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (overrides `defaults.output`)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

impl GlobalOpts {
    pub fn format(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List a vendor's devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Send a command to a device
    #[command(alias = "do")]
    Action(ActionArgs),

    /// Show today's statistics for a device
    Stats(StatsArgs),

    /// Manage CloudPets feeding plans
    #[command(alias = "plan")]
    Plans(PlansArgs),

    /// Decode a hex-encoded scale frame (offline)
    Decode(DecodeArgs),

    /// Inspect and edit configuration
    Config(ConfigArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Vendor to query (petkit, cloudpets)
    pub vendor: Vendor,
}

// ── Action ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ActionArgs {
    /// Vendor owning the device
    pub vendor: Vendor,

    /// Vendor device id (see `pethub devices`)
    pub device: String,

    #[command(subcommand)]
    pub kind: ActionKind,
}

#[derive(Debug, Subcommand)]
pub enum ActionKind {
    /// Start a litter-box cleaning cycle
    Clean,
    /// Run the litter-box deodorizer
    Deodorize,
    /// Dispense food now
    Feed {
        /// Portions to dispense
        #[arg(long, short = 'n', default_value_t = 1)]
        portions: u32,
    },
    /// Switch the feeder light
    Light {
        #[arg(value_enum)]
        state: LightState,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LightState {
    On,
    Off,
}

// ── Stats ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatsArgs {
    pub vendor: Vendor,
    pub device: String,
}

// ── Plans ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PlansArgs {
    #[command(subcommand)]
    pub command: PlansCommand,
}

#[derive(Debug, Subcommand)]
pub enum PlansCommand {
    /// List a feeder's plans
    #[command(alias = "ls")]
    List {
        /// Feeder device id
        device: String,
    },

    /// Add a plan to a feeder
    Add {
        device: String,
        #[command(flatten)]
        plan: PlanFields,
    },

    /// Replace an existing plan
    Update {
        device: String,
        /// Plan id (see `pethub plans list`)
        plan_id: String,
        #[command(flatten)]
        plan: PlanFields,
    },

    /// Delete a plan
    #[command(alias = "rm")]
    Delete { plan_id: String },
}

#[derive(Debug, Args)]
pub struct PlanFields {
    /// Hour of day (0-23)
    #[arg(long)]
    pub hour: u8,

    /// Minute (0-59)
    #[arg(long, default_value_t = 0)]
    pub minute: u8,

    /// Portions per serving
    #[arg(long, default_value_t = 1)]
    pub serving: u32,

    /// Weekdays, 1 = Monday .. 7 = Sunday
    #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,6,7")]
    pub days: Vec<u8>,

    /// Create the plan disabled
    #[arg(long)]
    pub disabled: bool,

    /// Free-form note shown in the vendor app
    #[arg(long)]
    pub remark: Option<String>,
}

// ── Decode ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Service data as hex; spaces and colons are ignored
    pub frame: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets masked
    Show,

    /// Print the config file path
    Path,

    /// Read a vendor password from stdin and store it in the system keyring
    SetPassword {
        vendor: Vendor,
    },
}
