mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "dsmr-server",
    version,
    about = "Serve DSMR P1 smart-meter telegrams over TCP"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr) [default: info].
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<LogLevel>,

    /// Verbose logging (same as --log-level debug).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level, cli.verbose);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_short_options() {
        let cli = Cli::try_parse_from([
            "dsmr-server",
            "-v",
            "serve",
            "-d",
            "/dev/ttyUSB1",
            "-s",
            "115200",
            "-p",
            "8121",
        ])
        .expect("serve args should parse");

        assert!(cli.verbose);
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.port, 8121);
                assert_eq!(args.speed.bits_per_second(), 115200);
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn rejects_input_together_with_device() {
        let err = Cli::try_parse_from([
            "dsmr-server",
            "serve",
            "--device",
            "/dev/ttyUSB0",
            "--input",
            "capture.txt",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_watch_subcommand() {
        let cli = Cli::try_parse_from([
            "dsmr-server",
            "--format",
            "json",
            "watch",
            "127.0.0.1:8120",
            "--count",
            "2",
        ])
        .expect("watch args should parse");
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Command::Watch(ref args) if args.count == Some(2)));
    }

    #[test]
    fn validate_file_is_optional() {
        let cli = Cli::try_parse_from(["dsmr-server", "validate"]).expect("should parse");
        assert!(matches!(cli.command, Command::Validate(ref args) if args.file.is_none()));
    }
}
