//! Self-describing tagged-value codec for host/guest bridges.
//!
//! Every argument on the wire is framed as:
//! - A 1-byte type tag (absent, boolean, text, number, bytes)
//! - A 4-byte big-endian payload length
//! - The payload itself
//!
//! A message is a plain concatenation of values with no count prefix. A
//! request frame puts one opcode byte in front of a message, and correlated
//! transports add a 4-byte request id in front of that.

pub mod codec;
pub mod error;
pub mod reader;
pub mod request;
pub mod value;
pub mod writer;

pub use codec::{
    decode, decode_frame, decode_value, encode, encode_into, encode_value, encoded_len,
    peek_frame_len, split_frame, CodecConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
    WIRE_MAX_PAYLOAD,
};
pub use error::{CodecError, Result};
pub use reader::ValueReader;
pub use request::{
    encode_correlated, encode_reply, split_correlated, RequestFrame, CORRELATION_ID_SIZE,
};
pub use value::{Tag, Value};
pub use writer::ValueWriter;
