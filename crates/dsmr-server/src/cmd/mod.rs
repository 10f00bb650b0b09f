use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use dsmr_net::{DEFAULT_DEVICE, DEFAULT_PORT, MIN_PORT};
use dsmr_serial::{BaudRate, CharacterFormat};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod serve;
pub mod validate;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read telegrams from the meter and serve them to TCP clients.
    Serve(ServeArgs),
    /// Validate a captured telegram file (or stdin).
    Validate(ValidateArgs),
    /// Connect to a running server and print received telegrams.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Validate(args) => validate::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Serial device the meter is connected to.
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_DEVICE)]
    pub device: PathBuf,
    /// Serial line speed.
    #[arg(short, long, value_name = "BAUD", default_value = "9600")]
    pub speed: BaudRate,
    /// Serial character format (8N1 or 7E1).
    #[arg(long, value_name = "FMT", default_value = "8N1")]
    pub char_format: CharacterFormat,
    /// TCP port to listen on.
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_PORT,
        value_parser = clap::value_parser!(u16).range(i64::from(MIN_PORT)..)
    )]
    pub port: u16,
    /// Address to listen on.
    #[arg(long, value_name = "ADDR", default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// Read telegrams from a file (`-` for stdin) instead of the serial device.
    #[arg(long, value_name = "FILE", conflicts_with = "device")]
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Capture file to validate. Reads stdin when omitted or `-`.
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Server address, e.g. 127.0.0.1:8120.
    pub addr: String,
    /// Exit after receiving N telegrams.
    #[arg(long)]
    pub count: Option<usize>,
    /// Give up when no telegram arrives within this time (e.g. 30s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
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
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
