use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dsmr_telegram::Telegram;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct TelegramOutput<'a> {
    source: &'a str,
    identification: String,
    checksum: String,
    size: usize,
    lines: Vec<String>,
    timestamp: String,
}

impl<'a> TelegramOutput<'a> {
    fn new(telegram: &Telegram, source: &'a str) -> Self {
        Self {
            source,
            identification: telegram.identification().into_owned(),
            checksum: format!("{:04X}", telegram.checksum()),
            size: telegram.len(),
            lines: telegram
                .data_lines()
                .map(|line| String::from_utf8_lossy(line).into_owned())
                .collect(),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_telegram(telegram: &Telegram, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = TelegramOutput::new(telegram, source);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            println!("{}", telegram_table(telegram, source));
        }
        OutputFormat::Pretty => {
            println!(
                "source={} id={} checksum={:04X} size={} lines={}",
                source,
                telegram.identification(),
                telegram.checksum(),
                telegram.len(),
                telegram.data_lines().count()
            );
        }
        OutputFormat::Raw => {
            print_raw(telegram.as_bytes());
        }
    }
}

fn telegram_table(telegram: &Telegram, source: &str) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"])
        .add_row(vec!["source".to_string(), source.to_string()])
        .add_row(vec![
            "identification".to_string(),
            telegram.identification().into_owned(),
        ])
        .add_row(vec![
            "checksum".to_string(),
            format!("{:04X}", telegram.checksum()),
        ])
        .add_row(vec!["size".to_string(), telegram.len().to_string()]);
    for line in telegram.data_lines() {
        table.add_row(vec![
            "line".to_string(),
            String::from_utf8_lossy(line).into_owned(),
        ]);
    }
    table
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
