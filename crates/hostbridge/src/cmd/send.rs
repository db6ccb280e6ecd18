use hostbridge_channel::ChannelClient;
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_values, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = ChannelClient::connect(&args.endpoint, &args.channel)
        .map_err(|err| channel_error("connect failed", err))?;

    for value in &args.values {
        client
            .send(value)
            .map_err(|err| channel_error("send failed", err))?;
    }
    debug!(count = args.values.len(), channel = %args.channel, "values sent");

    if args.wait {
        client
            .set_read_timeout(Some(args.wait_timeout))
            .map_err(|err| channel_error("receive failed", err))?;

        // The relay echoes every frame back to its sender.
        let mut echoed = Vec::with_capacity(args.values.len());
        while echoed.len() < args.values.len() {
            let value = client
                .recv()
                .map_err(|err| channel_error("receive failed", err))?;
            echoed.push(value);
        }
        print_values(&echoed, &args.channel, format);
    }

    Ok(SUCCESS)
}
