use std::time::Duration;

use clap::{Args, Subcommand};
use hostbridge_codec::Value;
use hostbridge_transport::Endpoint;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod codec;
pub mod listen;
pub mod relay;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a relay server with named channels.
    Relay(RelayArgs),
    /// Join a channel and send values.
    Send(SendArgs),
    /// Join a channel and print relayed values.
    Listen(ListenArgs),
    /// Send one request to an HTTP host and print the reply.
    Call(CallArgs),
    /// Encode values and print the wire bytes as hex.
    Encode(EncodeArgs),
    /// Decode hex wire bytes and print the values.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Relay(args) => relay::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Encode(args) => codec::encode(args),
        Command::Decode(args) => codec::decode(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RelayArgs {
    /// Endpoint to bind (host:port, tcp://host:port, unix:///path or /path).
    #[arg(env = "HOSTBRIDGE_ENDPOINT")]
    pub endpoint: Endpoint,
    /// Framed channels to create (comma-separated).
    #[arg(long, short = 'c', value_delimiter = ',')]
    pub channel: Vec<String>,
    /// Raw channels to create (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub raw: Vec<String>,
    /// Print every relayed message.
    #[arg(long)]
    pub print: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Relay endpoint to connect to.
    #[arg(env = "HOSTBRIDGE_ENDPOINT")]
    pub endpoint: Endpoint,
    /// Channel to join.
    #[arg(long, short = 'c')]
    pub channel: String,
    /// Values to send, one data frame each (absent, bool:, text:, num:, hex:).
    #[arg(long = "value", short = 'v', value_parser = parse_value, required = true)]
    pub values: Vec<Value>,
    /// Wait for the relayed echo of every sent value and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for echoes when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub wait_timeout: Duration,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Relay endpoint to connect to.
    #[arg(env = "HOSTBRIDGE_ENDPOINT")]
    pub endpoint: Endpoint,
    /// Channel to join.
    #[arg(long, short = 'c')]
    pub channel: String,
    /// Exit after receiving N values.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Base URL of the host (e.g. http://127.0.0.1:9000).
    pub url: String,
    /// Opcode byte.
    #[arg(long, short = 'o')]
    pub opcode: u8,
    /// Request arguments (absent, bool:, text:, num:, hex:).
    #[arg(long = "value", short = 'v', value_parser = parse_value)]
    pub values: Vec<Value>,
    /// Request path appended to the base URL.
    #[arg(long, default_value = "/call")]
    pub path: String,
    /// Request timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Values to encode (absent, bool:, text:, num:, hex:).
    #[arg(long = "value", short = 'v', value_parser = parse_value)]
    pub values: Vec<Value>,
    /// Prefix a request opcode byte.
    #[arg(long)]
    pub opcode: Option<u8>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex-encoded wire bytes. Read from stdin when omitted.
    pub hex: Option<String>,
    /// Treat the first byte as a request opcode.
    #[arg(long)]
    pub request: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a `KIND:DATA` value argument.
///
/// Kinds: `absent`, `bool:true`, `text:hello`, `num:42`, `hex:010203`.
pub fn parse_value(input: &str) -> Result<Value, String> {
    if input == "absent" {
        return Ok(Value::Absent);
    }
    let (kind, data) = input
        .split_once(':')
        .ok_or_else(|| format!("expected KIND:DATA, got {input:?}"))?;

    match kind {
        "bool" => match data {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(format!("invalid boolean: {data:?}")),
        },
        "text" => Ok(Value::Text(data.to_string())),
        "num" => data
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|err| format!("invalid number {data:?}: {err}")),
        "hex" => hex::decode(data)
            .map(Value::from)
            .map_err(|err| format!("invalid hex {data:?}: {err}")),
        other => Err(format!(
            "unknown value kind {other:?} (expected absent, bool, text, num or hex)"
        )),
    }
}

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
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
        .map_err(|_| format!("invalid duration value: {input}"))?;

    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Stop the process loop on Ctrl-C instead of exiting mid-write.
pub fn install_ctrlc_handler<F>(on_interrupt: F) -> CliResult<()>
where
    F: Fn() + Send + 'static,
{
    ctrlc::set_handler(on_interrupt).map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

pub fn usage(message: impl Into<String>) -> CliError {
    CliError::new(USAGE, message)
}
