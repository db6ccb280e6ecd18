use hostbridge_channel::{ChannelServer, Relayed};
use hostbridge_codec::Value;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, usage, RelayArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_raw, print_values, OutputFormat};

pub fn run(args: RelayArgs, format: OutputFormat) -> CliResult<i32> {
    if args.channel.is_empty() && args.raw.is_empty() {
        return Err(usage("relay needs at least one --channel or --raw channel"));
    }

    let server =
        ChannelServer::bind(&args.endpoint).map_err(|err| channel_error("bind failed", err))?;

    for name in &args.channel {
        let channel = server
            .create_channel(name.as_str())
            .map_err(|err| channel_error("channel setup failed", err))?;
        if args.print {
            let source = name.clone();
            channel.on(move |_, message| print_relayed(&source, message, format));
        }
    }
    for name in &args.raw {
        let channel = server
            .create_raw_channel(name.as_str())
            .map_err(|err| channel_error("channel setup failed", err))?;
        if args.print {
            let source = name.clone();
            channel.on(move |_, message| print_relayed(&source, message, format));
        }
    }

    let shutdown = server.shutdown_handle();
    install_ctrlc_handler(move || shutdown.shutdown())?;

    info!(
        endpoint = %server.local_endpoint(),
        channels = ?server.channels().names(),
        "relay ready"
    );
    server
        .serve()
        .map_err(|err| channel_error("relay failed", err))?;
    Ok(SUCCESS)
}

fn print_relayed(source: &str, message: Relayed<'_>, format: OutputFormat) {
    match message {
        Relayed::Frame(value) => print_values(std::slice::from_ref(value), source, format),
        Relayed::Raw(bytes) => match format {
            OutputFormat::Raw => print_raw(bytes),
            _ => print_values(&[Value::from(bytes)], source, format),
        },
    }
}
