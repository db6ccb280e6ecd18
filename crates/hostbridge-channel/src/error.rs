/// Errors that can occur on stream channels.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] hostbridge_transport::TransportError),

    /// Codec-level error.
    #[error("codec error: {0}")]
    Codec(#[from] hostbridge_codec::CodecError),

    /// The first value on a connection was not a channel name.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),

    /// The handshake named a channel that does not exist.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// The other side closed the connection.
    #[error("channel {0} disconnected")]
    Disconnected(String),

    /// A channel with this name is already registered.
    #[error("channel {0} already exists")]
    ChannelExists(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
