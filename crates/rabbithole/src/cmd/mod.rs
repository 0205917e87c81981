use clap::{ArgGroup, Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use rabbithole_peer::{BCASTCHAT, DEFAULT_CHAT_MESSAGE, DEFAULT_RENDEZVOUS_PATH};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod probe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the rendezvous handoff and answer the channel until it closes.
    Probe(ProbeArgs),
    /// Encode a single frame and print it.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Rendezvous socket path.
    #[arg(env = "RABBITHOLE_RENDEZVOUS", default_value = DEFAULT_RENDEZVOUS_PATH)]
    pub rendezvous: PathBuf,
    /// Name of the broadcast event sent for each chunk.
    #[arg(long, default_value = BCASTCHAT)]
    pub event_name: String,
    /// Chat line carried by the broadcast event.
    #[arg(long, default_value = DEFAULT_CHAT_MESSAGE)]
    pub message: String,
    /// Stop after sending N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Socket read/write timeout (e.g. 5s, 500ms). Blocks forever if unset.
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").args(["data", "file", "event"])))]
pub struct EncodeArgs {
    /// Four-byte numeric tag (1 is the provisioning request).
    #[arg(long, conflicts_with = "byte_tag")]
    pub tag: Option<u32>,
    /// Single-byte tag given as one ASCII character (V is a broadcast event).
    #[arg(long)]
    pub byte_tag: Option<char>,
    /// Raw string payload.
    #[arg(long)]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Build a BCASTCHAT event payload carrying this chat line. Sent in a V
    /// frame unless --tag or --byte-tag is given.
    #[arg(long)]
    pub event: Option<String>,
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
