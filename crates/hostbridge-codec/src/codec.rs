use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::value::{Tag, Value};

/// Value header: tag (1) + length (4) = 5 bytes.
pub const HEADER_SIZE: usize = 5;

/// Default maximum payload size accepted from a live stream: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Largest payload the 4-byte length field can describe.
pub const WIRE_MAX_PAYLOAD: usize = u32::MAX as usize;

/// Encode one value into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬─────────────┬──────────────────┐
/// │ Tag (1B) │ Length (4B) │ Payload          │
/// │ 0..=4    │ big-endian  │ (Length bytes)   │
/// └──────────┴─────────────┴──────────────────┘
/// ```
pub fn encode_value(value: &Value, dst: &mut BytesMut) -> Result<()> {
    let len = value.payload_len();
    if len > WIRE_MAX_PAYLOAD {
        return Err(CodecError::PayloadTooLarge {
            size: len,
            max: WIRE_MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + len);
    dst.put_u8(value.tag() as u8);
    dst.put_u32(len as u32);
    match value {
        Value::Absent => {}
        Value::Boolean(b) => dst.put_u8(u8::from(*b)),
        Value::Text(text) => dst.put_slice(text.as_bytes()),
        Value::Number(n) => dst.put_f64(*n),
        Value::Bytes(bytes) => dst.put_slice(bytes),
    }
    Ok(())
}

/// Encode an ordered list of values into one message.
pub fn encode(values: &[Value]) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(encoded_len(values));
    encode_into(values, &mut dst)?;
    Ok(dst.freeze())
}

/// Append an ordered list of values to `dst`.
pub fn encode_into(values: &[Value], dst: &mut BytesMut) -> Result<()> {
    for value in values {
        encode_value(value, dst)?;
    }
    Ok(())
}

/// Total wire size of a list of values.
pub fn encoded_len(values: &[Value]) -> usize {
    values
        .iter()
        .map(|value| HEADER_SIZE + value.payload_len())
        .sum()
}

/// Decode a byte range that is known to hold only complete values.
///
/// Consumes values until the range is exhausted. A range that ends inside a
/// value yields [`CodecError::Truncated`].
pub fn decode(mut src: &[u8]) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    while !src.is_empty() {
        let total = match peek_frame_len(src, WIRE_MAX_PAYLOAD)? {
            Some(total) => total,
            None => {
                let needed = if src.len() < HEADER_SIZE {
                    HEADER_SIZE
                } else {
                    HEADER_SIZE + declared_len(src)
                };
                return Err(CodecError::Truncated {
                    needed,
                    available: src.len(),
                });
            }
        };
        values.push(decode_payload(src[0], &src[HEADER_SIZE..total])?);
        src = &src[total..];
    }
    Ok(values)
}

/// Peek at the header at the front of `src`.
///
/// Returns `Ok(None)` if more bytes are needed, otherwise the total wire size
/// (header + payload) of the first value. Nothing is consumed.
pub fn peek_frame_len(src: &[u8], max_payload: usize) -> Result<Option<usize>> {
    if src.is_empty() {
        return Ok(None);
    }
    Tag::try_from(src[0])?;

    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let payload_len = declared_len(src);
    if payload_len > max_payload {
        return Err(CodecError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }
    Ok(Some(total))
}

/// Split the wire bytes of one complete value off the front of `src`.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete value yet.
pub fn split_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    match peek_frame_len(src, max_payload)? {
        Some(total) => Ok(Some(src.split_to(total).freeze())),
        None => Ok(None),
    }
}

/// Decode one value from the front of a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete value yet.
/// On success, consumes the value bytes from the buffer.
pub fn decode_value(src: &mut BytesMut, max_payload: usize) -> Result<Option<Value>> {
    let total = match peek_frame_len(src, max_payload)? {
        Some(total) => total,
        None => return Ok(None),
    };

    let tag = src[0];
    src.advance(HEADER_SIZE);
    let payload = src.split_to(total - HEADER_SIZE);
    decode_payload(tag, &payload).map(Some)
}

/// Decode a complete single-value frame as produced by [`split_frame`].
pub fn decode_frame(frame: &[u8]) -> Result<Value> {
    let mut values = decode(frame)?;
    match values.len() {
        1 => Ok(values.remove(0)),
        _ => Err(CodecError::Truncated {
            needed: HEADER_SIZE,
            available: frame.len(),
        }),
    }
}

fn declared_len(src: &[u8]) -> usize {
    u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize
}

fn decode_payload(tag: u8, payload: &[u8]) -> Result<Value> {
    match Tag::try_from(tag)? {
        Tag::Absent => Ok(Value::Absent),
        Tag::Boolean => match payload {
            [b] => Ok(Value::Boolean(*b != 0)),
            _ => Err(CodecError::InvalidLength {
                tag: Tag::Boolean.name(),
                len: payload.len(),
            }),
        },
        Tag::Text => Ok(Value::Text(std::str::from_utf8(payload)?.to_owned())),
        Tag::Number => {
            let raw: [u8; 8] = payload.try_into().map_err(|_| CodecError::InvalidLength {
                tag: Tag::Number.name(),
                len: payload.len(),
            })?;
            Ok(Value::Number(f64::from_be_bytes(raw)))
        }
        Tag::Bytes => Ok(Value::Bytes(Bytes::copy_from_slice(payload))),
    }
}

/// Configuration for value readers and writers.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
