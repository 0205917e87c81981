use std::fs;

use rabbithole_frame::{Frame, Tag, EVENT};
use rabbithole_peer::BroadcastEvent;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, peer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let tag = resolve_tag(&args)?;
    let payload = resolve_payload(&args)?;

    let payload_size = payload.len();
    let frame = Frame {
        tag,
        payload: payload.into(),
    };
    let wire = frame
        .to_bytes()
        .map_err(|err| frame_error("encode failed", err))?;

    print_encoded(tag, payload_size, &wire, format);
    Ok(SUCCESS)
}

fn resolve_tag(args: &EncodeArgs) -> CliResult<Option<Tag>> {
    if let Some(tag) = args.tag {
        return Ok(Some(Tag::Word(tag)));
    }
    match args.byte_tag {
        Some(c) if c.is_ascii() => Ok(Some(Tag::Byte(c as u8))),
        Some(c) => Err(CliError::new(
            USAGE,
            format!("--byte-tag must be a single ASCII character, got {c:?}"),
        )),
        // An event payload goes out in a 'V' frame unless a tag says otherwise.
        None if args.event.is_some() => Ok(Some(EVENT)),
        None => Ok(None),
    }
}

fn resolve_payload(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    if let Some(message) = &args.event {
        let event = BroadcastEvent::chat(message.clone());
        let payload = event
            .encode()
            .map_err(|err| peer_error("event encode failed", err))?;
        return Ok(payload.to_vec());
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> EncodeArgs {
        EncodeArgs {
            tag: None,
            byte_tag: None,
            data: None,
            file: None,
            event: None,
        }
    }

    #[test]
    fn word_tag_wins_over_nothing() {
        let tag = resolve_tag(&EncodeArgs {
            tag: Some(1),
            ..args()
        })
        .unwrap();
        assert_eq!(tag, Some(Tag::Word(1)));
    }

    #[test]
    fn event_payload_defaults_to_event_tag() {
        let event = || EncodeArgs {
            event: Some("Alice: Who...are...you?".to_string()),
            ..args()
        };
        assert_eq!(resolve_tag(&event()).unwrap(), Some(EVENT));

        let tagged = resolve_tag(&EncodeArgs {
            tag: Some(7),
            ..event()
        })
        .unwrap();
        assert_eq!(tagged, Some(Tag::Word(7)));

        assert_eq!(resolve_tag(&args()).unwrap(), None);
    }

    #[test]
    fn byte_tag_must_be_ascii() {
        let tag = resolve_tag(&EncodeArgs {
            byte_tag: Some('V'),
            ..args()
        })
        .unwrap();
        assert_eq!(tag, Some(Tag::Byte(b'V')));

        let err = resolve_tag(&EncodeArgs {
            byte_tag: Some('é'),
            ..args()
        })
        .unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn event_payload_is_bcastchat() {
        let payload = resolve_payload(&EncodeArgs {
            event: Some("hi".to_string()),
            ..args()
        })
        .unwrap();
        let event = BroadcastEvent::decode(&payload).unwrap();
        assert_eq!(event, BroadcastEvent::chat("hi"));
    }

    #[test]
    fn missing_payload_is_empty() {
        assert!(resolve_payload(&args()).unwrap().is_empty());
    }
}
