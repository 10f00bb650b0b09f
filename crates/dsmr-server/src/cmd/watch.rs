use dsmr_net::connect_with_timeout;
use dsmr_telegram::TelegramError;

use crate::cmd::{parse_duration, WatchArgs};
use crate::exit::{net_error, telegram_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_telegram, OutputFormat};

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    let mut reader = connect_with_timeout(&args.addr, timeout)
        .map_err(|err| net_error("connect failed", err))?;

    let mut printed = 0usize;
    loop {
        if args.count.is_some_and(|count| printed >= count) {
            return Ok(SUCCESS);
        }

        let telegram = match reader.read_telegram() {
            Ok(telegram) => telegram,
            Err(err) if err.is_validation_error() => {
                tracing::warn!(error = %err, "skipping invalid telegram");
                continue;
            }
            Err(TelegramError::StreamClosed) => {
                tracing::info!(received = printed, "server closed the connection");
                return Ok(if args.count.is_some() { FAILURE } else { SUCCESS });
            }
            Err(err) => return Err(telegram_error("receive failed", err)),
        };

        print_telegram(&telegram, &args.addr, format);
        printed = printed.saturating_add(1);
    }
}
