use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hostbridge_channel::{ChannelClient, ChannelError};
use hostbridge_codec::CodecError;

use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_values, OutputFormat};

// Receive timeout used to notice Ctrl-C while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = ChannelClient::connect(&args.endpoint, &args.channel)
        .map_err(|err| channel_error("connect failed", err))?;
    client
        .set_read_timeout(Some(POLL_INTERVAL))
        .map_err(|err| channel_error("connect failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        install_ctrlc_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let value = match client.recv() {
            Ok(value) => value,
            Err(err) if is_idle(&err) => continue,
            // A closed relay ends an open-ended listen; a counted one fails short.
            Err(ChannelError::Disconnected(_)) if args.count.is_none() => break,
            Err(err) => return Err(channel_error("receive failed", err)),
        };

        print_values(std::slice::from_ref(&value), &args.channel, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    Ok(SUCCESS)
}

fn is_idle(err: &ChannelError) -> bool {
    matches!(
        err,
        ChannelError::Codec(CodecError::Io(io))
            if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
    )
}
