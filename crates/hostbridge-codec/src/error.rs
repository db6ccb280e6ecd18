/// Errors that can occur while encoding or decoding tagged values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The type tag byte is not one of the known tags.
    #[error("unknown value tag {0:#04x}")]
    UnknownTag(u8),

    /// The byte range ends inside a value.
    #[error("truncated value ({needed} bytes needed, {available} available)")]
    Truncated { needed: usize, available: usize },

    /// The payload length does not fit the tag (booleans are 1 byte, numbers 8).
    #[error("invalid payload length {len} for {tag} value")]
    InvalidLength { tag: &'static str, len: usize },

    /// A text payload is not valid UTF-8.
    #[error("text value is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The payload exceeds the configured (or wire-representable) maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A correlated frame is shorter than its 4-byte request id.
    #[error("correlated frame too short for request id ({0} bytes)")]
    MissingCorrelationId(usize),

    /// A request frame is missing its opcode byte.
    #[error("request frame is empty (missing opcode)")]
    MissingOpcode,

    /// An I/O error occurred while reading or writing values.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete value was received.
    #[error("connection closed (incomplete value)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, CodecError>;
