//! Request frames and correlated framing.
//!
//! A request frame is one opcode byte followed by a message. Transports that
//! cannot match replies to requests on their own prepend a 4-byte big-endian
//! correlation id on the way out and expect it back in front of the reply.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{decode, encode_into, encoded_len};
use crate::error::{CodecError, Result};
use crate::value::Value;

/// Size of the correlation id prefix.
pub const CORRELATION_ID_SIZE: usize = 4;

/// An opcode and its ordered arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestFrame {
    pub opcode: u8,
    pub args: Vec<Value>,
}

impl RequestFrame {
    /// Create a request frame.
    pub fn new(opcode: u8, args: Vec<Value>) -> Self {
        Self { opcode, args }
    }

    /// Wire size of the encoded frame.
    pub fn encoded_len(&self) -> usize {
        1 + encoded_len(&self.args)
    }

    /// Encode as `[opcode][values...]`.
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut dst)?;
        Ok(dst.freeze())
    }

    /// Append the encoded frame to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(self.opcode);
        encode_into(&self.args, dst)
    }

    /// Decode a complete request frame.
    pub fn decode(src: &[u8]) -> Result<Self> {
        let (&opcode, rest) = src.split_first().ok_or(CodecError::MissingOpcode)?;
        Ok(Self {
            opcode,
            args: decode(rest)?,
        })
    }
}

/// Encode `[id][opcode][values...]`.
pub fn encode_correlated(id: u32, frame: &RequestFrame) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(CORRELATION_ID_SIZE + frame.encoded_len());
    dst.put_u32(id);
    frame.encode_into(&mut dst)?;
    Ok(dst.freeze())
}

/// Split the correlation id off the front of a correlated frame.
///
/// Works for both directions: the remainder is either a request frame or a
/// reply message.
pub fn split_correlated(src: &[u8]) -> Result<(u32, &[u8])> {
    if src.len() < CORRELATION_ID_SIZE {
        return Err(CodecError::MissingCorrelationId(src.len()));
    }
    let (head, rest) = src.split_at(CORRELATION_ID_SIZE);
    let id = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
    Ok((id, rest))
}

/// Encode a correlated reply `[id][values...]`, as a host would send it.
pub fn encode_reply(id: u32, values: &[Value]) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(CORRELATION_ID_SIZE + encoded_len(values));
    dst.put_u32(id);
    encode_into(values, &mut dst)?;
    Ok(dst.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frame_layout() {
        let frame = RequestFrame::new(7, vec![Value::from("a")]);
        let wire = frame.encode().unwrap();
        assert_eq!(wire.as_ref(), &[7, 0x02, 0, 0, 0, 1, b'a']);
        assert_eq!(RequestFrame::decode(&wire).unwrap(), frame);
    }

    #[test]
    fn request_frame_without_args() {
        let frame = RequestFrame::new(0xff, Vec::new());
        let wire = frame.encode().unwrap();
        assert_eq!(wire.as_ref(), &[0xff]);
        assert_eq!(RequestFrame::decode(&wire).unwrap(), frame);
    }

    #[test]
    fn empty_request_frame_is_rejected() {
        assert!(matches!(
            RequestFrame::decode(&[]),
            Err(CodecError::MissingOpcode)
        ));
    }

    #[test]
    fn correlated_frame_prepends_big_endian_id() {
        let frame = RequestFrame::new(3, vec![Value::Absent]);
        let wire = encode_correlated(0x0102_0304, &frame).unwrap();
        assert_eq!(&wire[..5], &[1, 2, 3, 4, 3]);

        let (id, rest) = split_correlated(&wire).unwrap();
        assert_eq!(id, 0x0102_0304);
        assert_eq!(RequestFrame::decode(rest).unwrap(), frame);
    }

    #[test]
    fn reply_roundtrip() {
        let wire = encode_reply(9, &[Value::from(true)]).unwrap();
        let (id, rest) = split_correlated(&wire).unwrap();
        assert_eq!(id, 9);
        assert_eq!(decode(rest).unwrap(), vec![Value::Boolean(true)]);
    }

    #[test]
    fn short_correlated_frame_is_rejected() {
        assert!(matches!(
            split_correlated(&[0, 1]),
            Err(CodecError::MissingCorrelationId(2))
        ));
    }
}
