use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dsmr_net::{Server, ServerConfig, DEFAULT_POLL_INTERVAL};
use dsmr_serial::SerialSettings;

use crate::cmd::ServeArgs;
use crate::exit::{io_error, net_error, telegram_error, CliError, CliResult, SUCCESS};

const SUPERVISE_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = server_config(&args);

    let server = match &args.input {
        Some(path) => Server::start_with_source(open_input(path)?, &config),
        None => Server::start(&config),
    }
    .map_err(|err| net_error("serve failed", err))?;

    let running = server.running();
    install_ctrlc_handler(running.clone())?;

    tracing::info!(
        addr = %server.local_addr(),
        device = ?config.device,
        baud_rate = %config.serial.baud_rate,
        "serving telegrams"
    );

    while keep_serving(&server, &running) {
        thread::sleep(SUPERVISE_INTERVAL);
    }
    if !server.is_accepting() && running.load(Ordering::SeqCst) {
        tracing::error!(addr = %server.local_addr(), "listener stopped unexpectedly");
    }

    let report = server
        .shutdown()
        .map_err(|err| net_error("shutdown failed", err))?;
    tracing::info!(
        published = report.stats.published,
        rejected = report.stats.rejected,
        "server stopped"
    );

    match report.error {
        Some(err) => Err(telegram_error("telegram source failed", err)),
        None => Ok(SUCCESS),
    }
}

/// Serve until interrupted, the source ends or the listener dies.
fn keep_serving(server: &Server, running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst) && !server.is_source_finished() && server.is_accepting()
}

fn server_config(args: &ServeArgs) -> ServerConfig {
    ServerConfig {
        device: args.device.clone(),
        serial: SerialSettings {
            baud_rate: args.speed,
            format: args.char_format,
        },
        bind: args.bind,
        port: args.port,
        poll_interval: DEFAULT_POLL_INTERVAL,
    }
}

fn open_input(path: &std::path::Path) -> CliResult<Box<dyn Read + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(std::io::stdin()));
    }
    let file = File::open(path)
        .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))?;
    Ok(Box::new(file))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
