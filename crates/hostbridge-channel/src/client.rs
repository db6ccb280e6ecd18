use std::io::{ErrorKind, Read};
use std::net::Shutdown;
use std::time::Duration;

use bytes::Bytes;
use hostbridge_codec::{CodecConfig, CodecError, Value, ValueReader, ValueWriter};
use hostbridge_transport::{connect, Endpoint, IpcStream, TransportError};
use tracing::debug;

use crate::error::{ChannelError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A connection joined to one relay channel.
///
/// Everything sent is relayed to every member of the channel, this client
/// included.
pub struct ChannelClient {
    sender: ChannelSender,
    receiver: ChannelReceiver,
}

impl ChannelClient {
    /// Connect and send the handshake naming `channel`.
    ///
    /// The server does not acknowledge the handshake. A rejected client
    /// sees the connection close on its next receive.
    pub fn connect(endpoint: &Endpoint, channel: &str) -> Result<Self> {
        Self::connect_with_config(endpoint, channel, CodecConfig::default())
    }

    pub fn connect_with_config(
        endpoint: &Endpoint,
        channel: &str,
        config: CodecConfig,
    ) -> Result<Self> {
        let stream = connect(endpoint)?;
        let reader_stream = stream.try_clone()?;

        let reader = ValueReader::with_config_ipc(reader_stream, config.clone())?;
        let mut writer = ValueWriter::with_config_ipc(stream, config)?;
        writer.write_value(&Value::from(channel))?;
        debug!(%endpoint, channel, "joined channel");

        Ok(Self {
            sender: ChannelSender {
                writer,
                channel: channel.to_string(),
            },
            receiver: ChannelReceiver {
                reader,
                channel: channel.to_string(),
            },
        })
    }

    pub fn channel(&self) -> &str {
        &self.sender.channel
    }

    /// Send one value as a data frame.
    pub fn send(&mut self, value: &Value) -> Result<()> {
        self.sender.send(value)
    }

    /// Send bytes as-is, for raw channels.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.sender.send_raw(bytes)
    }

    /// Receive the next relayed value (blocking).
    pub fn recv(&mut self) -> Result<Value> {
        self.receiver.recv()
    }

    /// Receive the next chunk of bytes on a raw channel (blocking).
    pub fn recv_raw(&mut self) -> Result<Bytes> {
        self.receiver.recv_raw()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.receiver.set_read_timeout(timeout)
    }

    /// Split into independently owned send and receive halves.
    pub fn into_split(self) -> (ChannelSender, ChannelReceiver) {
        (self.sender, self.receiver)
    }
}

impl std::fmt::Debug for ChannelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelClient")
            .field("channel", &self.sender.channel)
            .finish()
    }
}

/// Send half of a [`ChannelClient`].
pub struct ChannelSender {
    writer: ValueWriter<IpcStream>,
    channel: String,
}

impl ChannelSender {
    pub fn send(&mut self, value: &Value) -> Result<()> {
        self.writer
            .write_value(value)
            .map_err(|err| disconnected(err, &self.channel))
    }

    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_raw(bytes)
            .and_then(|()| self.writer.flush())
            .map_err(|err| disconnected(err, &self.channel))
    }

    /// Stop sending. The receive half keeps working.
    pub fn close(&self) -> Result<()> {
        self.writer.get_ref().shutdown(Shutdown::Write)?;
        Ok(())
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Receive half of a [`ChannelClient`].
pub struct ChannelReceiver {
    reader: ValueReader<IpcStream>,
    channel: String,
}

impl ChannelReceiver {
    pub fn recv(&mut self) -> Result<Value> {
        self.reader
            .read_value()
            .map_err(|err| disconnected(err, &self.channel))
    }

    /// Read whatever bytes are available next.
    ///
    /// Do not mix with [`recv`](Self::recv) on the same connection.
    pub fn recv_raw(&mut self) -> Result<Bytes> {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match self.reader.get_mut().read(&mut chunk) {
                Ok(0) => return Err(ChannelError::Disconnected(self.channel.clone())),
                Ok(n) => {
                    chunk.truncate(n);
                    return Ok(Bytes::from(chunk));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err).into()),
            }
        }
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Iterator for ChannelReceiver {
    type Item = Result<Value>;

    /// Yields relayed values until the connection closes.
    fn next(&mut self) -> Option<Self::Item> {
        match self.recv() {
            Err(ChannelError::Disconnected(_)) => None,
            other => Some(other),
        }
    }
}

fn disconnected(err: CodecError, channel: &str) -> ChannelError {
    match err {
        CodecError::ConnectionClosed => ChannelError::Disconnected(channel.to_string()),
        CodecError::Io(io)
            if matches!(
                io.kind(),
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::UnexpectedEof
            ) =>
        {
            ChannelError::Disconnected(channel.to_string())
        }
        other => ChannelError::Codec(other),
    }
}
