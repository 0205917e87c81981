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
    name = "rabbithole",
    version,
    about = "Rendezvous handoff client for Unix domain sockets"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
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
    fn probe_defaults_to_wonderland() {
        let cli = Cli::try_parse_from(["rabbithole", "probe"]).expect("probe should parse");
        let Command::Probe(args) = cli.command else {
            panic!("expected probe");
        };
        if std::env::var_os("RABBITHOLE_RENDEZVOUS").is_none() {
            assert_eq!(args.rendezvous, std::path::PathBuf::from("/tmp/wonderland"));
        }
        assert_eq!(args.event_name, "BCASTCHAT");
        assert_eq!(args.message, "Alice: Who...are...you?");
        assert!(args.count.is_none());
    }

    #[test]
    fn probe_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "rabbithole",
            "--log-level",
            "debug",
            "probe",
            "/tmp/looking-glass",
            "--count",
            "3",
            "--timeout",
            "500ms",
            "--message",
            "Off with their heads",
        ])
        .expect("probe args should parse");
        let Command::Probe(args) = cli.command else {
            panic!("expected probe");
        };
        assert_eq!(args.rendezvous, std::path::PathBuf::from("/tmp/looking-glass"));
        assert_eq!(args.count, Some(3));
        assert_eq!(args.timeout.as_deref(), Some("500ms"));
    }

    #[test]
    fn encode_rejects_two_tags() {
        let err = Cli::try_parse_from([
            "rabbithole",
            "encode",
            "--tag",
            "1",
            "--byte-tag",
            "V",
            "--data",
            "x",
        ])
        .expect_err("conflicting tags should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn encode_rejects_two_payloads() {
        let err = Cli::try_parse_from([
            "rabbithole",
            "encode",
            "--data",
            "x",
            "--event",
            "y",
        ])
        .expect_err("conflicting payloads should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
