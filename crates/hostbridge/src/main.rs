mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "hostbridge", version, about = "Host bridge and relay channel CLI")]
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
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use hostbridge_codec::Value;
    use hostbridge_transport::Endpoint;

    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "hostbridge",
            "send",
            "127.0.0.1:7000",
            "--channel",
            "chat",
            "--value",
            "text:hello",
            "-v",
            "num:42",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.endpoint, Endpoint::tcp("127.0.0.1:7000"));
        assert_eq!(args.values, vec![Value::from("hello"), Value::from(42)]);
        assert!(!args.wait);
    }

    #[test]
    fn relay_splits_channel_lists() {
        let cli = Cli::try_parse_from([
            "hostbridge",
            "relay",
            "unix:///tmp/relay.sock",
            "--channel",
            "a,b",
            "--raw",
            "pipe",
        ])
        .expect("relay args should parse");

        let Command::Relay(args) = cli.command else {
            panic!("expected relay");
        };
        assert_eq!(args.endpoint, Endpoint::unix("/tmp/relay.sock"));
        assert_eq!(args.channel, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(args.raw, vec!["pipe".to_string()]);
    }

    #[test]
    fn rejects_malformed_value_argument() {
        let err = Cli::try_parse_from([
            "hostbridge",
            "send",
            "127.0.0.1:7000",
            "--channel",
            "c",
            "--value",
            "hello",
        ])
        .expect_err("untyped value should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let err = Cli::try_parse_from(["hostbridge", "listen", "nowhere", "--channel", "c"])
            .expect_err("endpoint without port should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "hostbridge",
            "call",
            "http://127.0.0.1:9000",
            "--opcode",
            "7",
            "--timeout",
            "500ms",
        ])
        .expect("call args should parse");
        assert!(matches!(cli.command, Command::Call(args) if args.opcode == 7 && args.values.is_empty()));
    }
}
