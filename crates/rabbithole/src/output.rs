use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rabbithole_frame::{tag_name, Tag};
use rabbithole_peer::{BroadcastSummary, CloseReason};
use serde::Serialize;

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
struct ChunkOutput {
    event: &'static str,
    index: usize,
    channel: String,
    size: usize,
    data: String,
    timestamp: String,
}

/// Print one chunk received on the channel.
pub fn print_chunk(channel: &Path, index: usize, chunk: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ChunkOutput {
                event: "chunk",
                index,
                channel: channel.display().to_string(),
                size: chunk.len(),
                data: payload_preview(chunk),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "CHANNEL", "DATA"])
                .add_row(vec![
                    index.to_string(),
                    chunk.len().to_string(),
                    channel.display().to_string(),
                    payload_preview(chunk),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "chunk={} size={} channel={} data={}",
                index,
                chunk.len(),
                channel.display(),
                payload_preview(chunk)
            );
        }
        OutputFormat::Raw => print_raw(chunk),
    }
}

#[derive(Serialize)]
struct SummaryOutput {
    event: &'static str,
    reason: &'static str,
    chunks_received: usize,
    bytes_received: usize,
    events_sent: usize,
}

/// Print how the broadcast loop ended. Raw output stays payload-only.
pub fn print_summary(summary: &BroadcastSummary, format: OutputFormat) {
    let reason = close_reason_name(summary.reason);
    match format {
        OutputFormat::Json => print_json(&SummaryOutput {
            event: "closed",
            reason,
            chunks_received: summary.chunks_received,
            bytes_received: summary.bytes_received,
            events_sent: summary.events_sent,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["REASON", "CHUNKS", "BYTES", "EVENTS SENT"])
                .add_row(vec![
                    reason.to_string(),
                    summary.chunks_received.to_string(),
                    summary.bytes_received.to_string(),
                    summary.events_sent.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "closed reason={} chunks={} bytes={} events_sent={}",
            reason, summary.chunks_received, summary.bytes_received, summary.events_sent
        ),
        OutputFormat::Raw => {}
    }
}

#[derive(Serialize)]
struct EncodedOutput {
    tag: Option<u32>,
    tag_name: &'static str,
    payload_size: usize,
    frame_size: usize,
    hex: String,
}

/// Print an encoded frame as hex, or as the bytes themselves in raw mode.
pub fn print_encoded(tag: Option<Tag>, payload_size: usize, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            tag: tag.map(Tag::value),
            tag_name: tag_name(tag),
            payload_size,
            frame_size: wire.len(),
            hex: to_hex(wire),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TAG", "PAYLOAD", "FRAME", "HEX"])
                .add_row(vec![
                    tag.map_or_else(|| tag_name(None).to_string(), |t| t.to_string()),
                    payload_size.to_string(),
                    wire.len().to_string(),
                    to_hex(wire),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", to_hex(wire)),
        OutputFormat::Raw => print_raw(wire),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Space-separated uppercase hex, e.g. `00 00 00 01`.
pub fn to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn close_reason_name(reason: CloseReason) -> &'static str {
    match reason {
        CloseReason::PeerClosed => "peer-closed",
        CloseReason::EventLimit => "event-limit",
        CloseReason::Stopped => "stopped",
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
