use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use eoslink_device::{Device, DeviceConfig};
use eoslink_endpoint::EndpointConfig;
use tracing::debug;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod boot_args;
pub mod doctor;
pub mod gestalt;
pub mod info;
pub mod ports;
pub mod service_version;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information.
    Version(VersionArgs),
    /// Show the discovered coprocessor link.
    Info,
    /// List the discovered service ports.
    Ports,
    /// Fetch answers for gestalt keys.
    Gestalt(GestaltArgs),
    /// List the gestalt keys the coprocessor can answer.
    GestaltKeys,
    /// Print the coprocessor's kernel boot arguments.
    BootArgs,
    /// Check that the coprocessor accepts this protocol version.
    ServiceVersion,
    /// Run link health checks.
    Doctor,
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args),
        Command::Info => info::run(ctx),
        Command::Ports => ports::run(ctx),
        Command::Gestalt(args) => gestalt::run(args, ctx),
        Command::GestaltKeys => gestalt::run_supported(ctx),
        Command::BootArgs => boot_args::run(ctx),
        Command::ServiceVersion => service_version::run(ctx),
        Command::Doctor => doctor::run(ctx),
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct GestaltArgs {
    /// Gestalt keys to fetch (e.g. ChipID BoardId).
    #[arg(required = true, value_name = "KEY")]
    pub keys: Vec<String>,
}

/// Settings shared by every command.
#[derive(Debug)]
pub struct Context {
    pub endpoint: EndpointConfig,
    pub timeout: Duration,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(
        properties: Option<PathBuf>,
        timeout: &str,
        format: OutputFormat,
    ) -> CliResult<Self> {
        let endpoint = match properties {
            Some(properties_path) => EndpointConfig { properties_path },
            None => EndpointConfig::default(),
        };
        Ok(Self {
            endpoint,
            timeout: parse_timeout(timeout)?,
            format,
        })
    }

    /// Device context with query timeouts applied. Frame limits follow the
    /// published device type when there is one.
    pub fn device(&self) -> Device {
        let device = Device::from_config(&self.endpoint);
        let mut config = match device.device_type() {
            Ok(device_type) => DeviceConfig::for_device_type(device_type),
            Err(err) => {
                debug!(error = %err, "device type unavailable, using default frame limits");
                DeviceConfig::default()
            }
        };
        config.io_timeout = Some(self.timeout);
        device.with_config(config)
    }
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
