use std::io::{Cursor, Read};
use std::path::Path;

use dsmr_telegram::{validate, Telegram, TelegramError, TelegramReader};

use crate::cmd::ValidateArgs;
use crate::exit::{io_error, telegram_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_telegram, OutputFormat};

pub fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let (source, raw) = match args.file.as_deref() {
        None => ("-".to_string(), read_stdin()?),
        Some(path) if path.as_os_str() == "-" => ("-".to_string(), read_stdin()?),
        Some(path) => (path.display().to_string(), read_file(path)?),
    };

    let scan = scan(&raw);
    for telegram in &scan.valid {
        print_telegram(telegram, &source, format);
    }

    if scan.valid.is_empty() {
        // Nothing complete in the capture; report why the whole input fails.
        let err = validate(&raw)
            .err()
            .unwrap_or(TelegramError::MissingStartMarker);
        return Err(telegram_error(&format!("{source}: no valid telegram"), err));
    }

    if let Some(first) = scan.rejected.into_iter().next() {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{source}: invalid telegram: {first}"),
        ));
    }

    Ok(SUCCESS)
}

#[derive(Debug, Default)]
struct Scan {
    valid: Vec<Telegram>,
    rejected: Vec<TelegramError>,
}

/// Every telegram in `raw`, in order, split into valid and rejected frames.
fn scan(raw: &[u8]) -> Scan {
    let mut scan = Scan::default();
    let mut reader = TelegramReader::new(Cursor::new(raw));
    loop {
        match reader.read_telegram() {
            Ok(telegram) => scan.valid.push(telegram),
            Err(err) if err.is_validation_error() => {
                tracing::warn!(error = %err, "rejected telegram");
                scan.rejected.push(err);
            }
            Err(_) => return scan,
        }
    }
}

fn read_stdin() -> CliResult<Vec<u8>> {
    let mut raw = Vec::new();
    std::io::stdin()
        .read_to_end(&mut raw)
        .map_err(|err| io_error("cannot read stdin", err))?;
    Ok(raw)
}

fn read_file(path: &Path) -> CliResult<Vec<u8>> {
    std::fs::read(path).map_err(|err| io_error(&format!("cannot read {}", path.display()), err))
}
