//! Per-connection reassembly and handshake state, independent of any socket.

use bytes::{Bytes, BytesMut};
use hostbridge_codec::{decode_frame, split_frame, Value, DEFAULT_MAX_PAYLOAD};

use crate::error::{ChannelError, Result};

/// Default limit for the channel-name value sent before joining.
pub const DEFAULT_MAX_HANDSHAKE_PAYLOAD: usize = 16 * 1024;

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the channel-name handshake value.
    Connecting,
    /// Joined; relaying data frames.
    Active,
    /// Terminal.
    Closed,
}

/// How a channel carries data after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// One tagged value per relayed message.
    #[default]
    Framed,
    /// Bytes are relayed as they arrive, without value boundaries.
    Raw,
}

impl ChannelMode {
    pub fn name(self) -> &'static str {
        match self {
            ChannelMode::Framed => "framed",
            ChannelMode::Raw => "raw",
        }
    }
}

/// One unit of progress produced by [`Connection::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The handshake named an existing channel.
    Joined { channel: String },
    /// The handshake named an unknown channel. The connection is closed.
    Rejected(String),
    /// One complete data frame: its wire bytes and the decoded value.
    Frame { wire: Bytes, value: Value },
    /// Bytes received on a raw channel.
    Raw(Bytes),
}

/// Sans-I/O state machine for a relay connection.
///
/// Feed received bytes with [`extend`](Self::extend), then call
/// [`advance`](Self::advance) until it returns `Ok(None)`. Read boundaries do
/// not matter: any chunking of the same byte stream yields the same steps.
#[derive(Debug)]
pub struct Connection {
    state: ConnectionState,
    mode: ChannelMode,
    channel: Option<String>,
    buf: BytesMut,
    max_handshake_payload: usize,
    max_payload: usize,
}

impl Connection {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_HANDSHAKE_PAYLOAD, DEFAULT_MAX_PAYLOAD)
    }

    /// Create a connection with explicit payload limits for the handshake
    /// value and for data frames.
    pub fn with_limits(max_handshake_payload: usize, max_payload: usize) -> Self {
        Self {
            state: ConnectionState::Connecting,
            mode: ChannelMode::Framed,
            channel: None,
            buf: BytesMut::new(),
            max_handshake_payload,
            max_payload,
        }
    }

    /// Append received bytes. Ignored once closed.
    pub fn extend(&mut self, bytes: &[u8]) {
        if self.state != ConnectionState::Closed {
            self.buf.extend_from_slice(bytes);
        }
    }

    /// Make as much progress as one step allows.
    ///
    /// While connecting, `join` is called with the requested channel name and
    /// returns the channel's mode, or `None` if no such channel exists.
    /// Returns `Ok(None)` when more bytes are needed. Any error closes the
    /// connection.
    pub fn advance<F>(&mut self, join: F) -> Result<Option<Step>>
    where
        F: FnOnce(&str) -> Option<ChannelMode>,
    {
        let result = match self.state {
            ConnectionState::Connecting => self.advance_handshake(join),
            ConnectionState::Active => self.advance_active(),
            ConnectionState::Closed => Ok(None),
        };
        if result.is_err() {
            self.close();
        }
        result
    }

    fn advance_handshake<F>(&mut self, join: F) -> Result<Option<Step>>
    where
        F: FnOnce(&str) -> Option<ChannelMode>,
    {
        // The tag is checked before the rest of the header arrives.
        if let Some(&tag) = self.buf.first() {
            if tag != hostbridge_codec::Tag::Text as u8 {
                return Err(ChannelError::InvalidHandshake(format!(
                    "expected text channel name, got tag {tag}"
                )));
            }
        }

        let Some(frame) = split_frame(&mut self.buf, self.max_handshake_payload)? else {
            return Ok(None);
        };
        let name = decode_frame(&frame)?
            .into_text()
            .ok_or_else(|| ChannelError::InvalidHandshake("channel name is not text".into()))?;

        match join(&name) {
            Some(mode) => {
                self.state = ConnectionState::Active;
                self.mode = mode;
                self.channel = Some(name.clone());
                Ok(Some(Step::Joined { channel: name }))
            }
            None => {
                self.close();
                Ok(Some(Step::Rejected(name)))
            }
        }
    }

    fn advance_active(&mut self) -> Result<Option<Step>> {
        match self.mode {
            ChannelMode::Raw if self.buf.is_empty() => Ok(None),
            ChannelMode::Raw => Ok(Some(Step::Raw(self.buf.split().freeze()))),
            ChannelMode::Framed => {
                let Some(wire) = split_frame(&mut self.buf, self.max_payload)? else {
                    return Ok(None);
                };
                let value = decode_frame(&wire)?;
                Ok(Some(Step::Frame { wire, value }))
            }
        }
    }

    /// Move to [`ConnectionState::Closed`] and drop buffered bytes.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.buf.clear();
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Channel joined by the handshake, if any.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Bytes received but not yet consumed into a step.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}
