use hostbridge_bridge::{HttpBridge, HttpBridgeConfig, TransportManager};

use crate::cmd::CallArgs;
use crate::exit::{bridge_error, io_error, CliResult, SUCCESS};
use crate::output::{print_values, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let config = HttpBridgeConfig::new(args.url.as_str())
        .with_call_path(args.path.as_str())
        .with_timeout(args.timeout);
    let source = config.call_url();
    let bridge = HttpBridge::new(config).map_err(|err| bridge_error("client setup failed", err))?;
    let manager = TransportManager::with_bridge(std::sync::Arc::new(bridge));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    let values = runtime
        .block_on(manager.send(args.opcode, args.values))
        .map_err(|err| bridge_error("call failed", err))?;

    print_values(&values, &source, format);
    Ok(SUCCESS)
}
