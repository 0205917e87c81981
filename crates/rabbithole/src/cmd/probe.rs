use rabbithole_peer::{
    BroadcastEvent, ChannelConfig, HandoffConfig, PeerError, Session, SessionConfig, StopHandle,
    CHAT_KIND,
};
use tracing::info;

use crate::cmd::{parse_duration, ProbeArgs};
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS, USAGE};
use crate::output::{print_chunk, print_summary, OutputFormat};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    if args.event_name.is_empty() {
        return Err(CliError::new(USAGE, "--event-name must not be empty"));
    }
    let event = BroadcastEvent::new(args.event_name.as_str(), CHAT_KIND, args.message.into_bytes());

    let config = SessionConfig {
        rendezvous_path: args.rendezvous,
        handoff: HandoffConfig {
            timeout,
            ..HandoffConfig::default()
        },
        channel: ChannelConfig {
            timeout,
            ..ChannelConfig::default()
        },
        max_events: args.count,
    };

    let mut session = Session::new(config);
    let stop = session.stop_handle();
    install_ctrlc_handler(stop.clone())?;

    session
        .connect()
        .map_err(|err| step_failed("connect failed", err, &stop))?;
    let channel_path = session
        .redirect()
        .map_err(|err| step_failed("handoff failed", err, &stop))?
        .channel_path
        .clone();

    let mut index = 0usize;
    let summary = session
        .broadcast_until_closed(&event, |chunk| {
            index += 1;
            print_chunk(&channel_path, index, chunk, format);
        })
        .map_err(|err| step_failed("channel failed", err, &stop))?;

    info!(
        events_sent = summary.events_sent,
        bytes_received = summary.bytes_received,
        "rabbithole closed"
    );
    print_summary(&summary, format);
    Ok(SUCCESS)
}

/// A step cut short by Ctrl-C reports the interrupt, not the socket error it caused.
fn step_failed(context: &str, err: PeerError, stop: &StopHandle) -> CliError {
    if stop.is_stopped() {
        return CliError::new(INTERRUPTED, format!("{context}: interrupted"));
    }
    peer_error(context, err)
}

fn install_ctrlc_handler(stop: StopHandle) -> CliResult<()> {
    ctrlc::set_handler(move || stop.stop())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
