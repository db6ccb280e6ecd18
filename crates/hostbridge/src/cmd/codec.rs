use std::io::Read;

use hostbridge_codec::{decode as decode_values, encode as encode_values, RequestFrame};

use crate::cmd::{usage, DecodeArgs, EncodeArgs};
use crate::exit::{codec_error, io_error, CliResult, SUCCESS};
use crate::output::{print_values, OutputFormat};

pub fn encode(args: EncodeArgs) -> CliResult<i32> {
    let bytes = match args.opcode {
        Some(opcode) => RequestFrame::new(opcode, args.values).encode(),
        None => encode_values(&args.values),
    }
    .map_err(|err| codec_error("encode failed", err))?;

    println!("{}", hex::encode(bytes));
    Ok(SUCCESS)
}

pub fn decode(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let (text, source) = match args.hex {
        Some(text) => (text, "argument"),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|err| io_error("failed reading stdin", err))?;
            (text, "stdin")
        }
    };

    let compact: String = text.split_whitespace().collect();
    let bytes = hex::decode(&compact).map_err(|err| usage(format!("invalid hex input: {err}")))?;

    if args.request {
        let frame = RequestFrame::decode(&bytes).map_err(|err| codec_error("decode failed", err))?;
        let source = format!("{source} opcode={}", frame.opcode);
        print_values(&frame.args, &source, format);
    } else {
        let values = decode_values(&bytes).map_err(|err| codec_error("decode failed", err))?;
        print_values(&values, source, format);
    }
    Ok(SUCCESS)
}
