use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use tcpsframe_frame::Frame;
use tcpsframe_session::{Exchange, RunSummary, StopReason};

#[derive(Clone, Debug, Copy, ValueEnum)]
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
struct FrameOutput {
    layout: &'static str,
    version: u8,
    id: u8,
    data_len: u8,
    source: u16,
    dest: u16,
    flags: u8,
    payload: String,
    wire: String,
}

impl From<&Frame> for FrameOutput {
    fn from(frame: &Frame) -> Self {
        let header = &frame.header;
        Self {
            layout: header.layout.name(),
            version: header.version(),
            id: header.id,
            data_len: header.data_len,
            source: header.source_addr,
            dest: header.dest_addr,
            flags: header.flags,
            payload: hex(frame.payload.as_ref()),
            wire: hex(frame.to_bytes().as_ref()),
        }
    }
}

#[derive(Serialize)]
struct ExchangeOutput {
    cycle: u64,
    sent: FrameOutput,
    received: FrameOutput,
    timestamp: String,
}

#[derive(Serialize)]
struct SummaryOutput {
    completed: u64,
    stopped_by: &'static str,
}

/// Print one probe cycle.
pub fn print_exchange(cycle: u64, exchange: &Exchange, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ExchangeOutput {
                cycle,
                sent: (&exchange.sent).into(),
                received: (&exchange.received).into(),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = frame_table();
            table.add_row(frame_row("sent", &exchange.sent));
            table.add_row(frame_row("received", &exchange.received));
            println!("cycle {cycle}");
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("[{cycle}] sent: {}", hex(exchange.sent.to_bytes().as_ref()));
            println!("[{cycle}] header: {}", exchange.received.header);
            println!(
                "[{cycle}] payload: {}",
                hex(exchange.received.payload.as_ref())
            );
        }
        OutputFormat::Raw => print_raw(exchange.received.payload.as_ref()),
    }
}

/// Print frames that did not come from a live session.
pub fn print_frames(label: &str, frames: &[Frame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for frame in frames {
                print_json(&FrameOutput::from(frame));
            }
        }
        OutputFormat::Table => {
            let mut table = frame_table();
            for frame in frames {
                table.add_row(frame_row(label, frame));
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                println!("{label}: {}", hex(frame.to_bytes().as_ref()));
                println!("header: {}", frame.header);
                println!("payload: {}", hex(frame.payload.as_ref()));
            }
        }
        OutputFormat::Raw => {
            for frame in frames {
                print_raw(frame.to_bytes().as_ref());
            }
        }
    }
}

/// Print how a probe run ended. Nothing is printed in raw mode.
pub fn print_summary(summary: &RunSummary, format: OutputFormat) {
    let stopped_by = match summary.stop {
        StopReason::Limit => "limit",
        StopReason::Cancelled => "interrupt",
    };
    match format {
        OutputFormat::Json => print_json(&SummaryOutput {
            completed: summary.completed,
            stopped_by,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{} cycles completed (stopped by {stopped_by})", summary.completed);
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Lowercase hex, one space between bytes.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn frame_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "DIR", "LAYOUT", "ID", "LEN", "SOURCE", "DEST", "FLAGS", "PAYLOAD",
        ]);
    table
}

fn frame_row(label: &str, frame: &Frame) -> Vec<String> {
    let header = &frame.header;
    vec![
        label.to_string(),
        header.layout.name().to_string(),
        header.id.to_string(),
        header.data_len.to_string(),
        format!("0x{:04x}", header.source_addr),
        format!("0x{:04x}", header.dest_addr),
        format!("0x{:02x}", header.flags),
        hex(frame.payload.as_ref()),
    ]
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
