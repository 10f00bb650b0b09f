use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// `--log-level` wins over `-v`; neither means info.
fn max_level(level: Option<LogLevel>, verbose: bool) -> LevelFilter {
    match level {
        Some(level) => level.into(),
        None if verbose => LevelFilter::DEBUG,
        None => LevelFilter::INFO,
    }
}

/// Install the stderr subscriber. Thread names are kept in every event so
/// session and pump logs can be told apart.
pub fn init_logging(format: LogFormat, level: Option<LogLevel>, verbose: bool) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(max_level(level, verbose))
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(false);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
