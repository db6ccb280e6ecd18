use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use hostbridge_transport::IpcStream;

use crate::codec::{encode_value, CodecConfig};
use crate::error::{CodecError, Result};
use crate::value::Value;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete tagged values to any `Write` stream.
pub struct ValueWriter<T> {
    inner: T,
    buf: BytesMut,
    config: CodecConfig,
}

impl<T: Write> ValueWriter<T> {
    /// Create a new value writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, CodecConfig::default())
    }

    /// Create a new value writer with explicit configuration.
    pub fn with_config(inner: T, config: CodecConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write one value (blocking).
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        self.write_values(std::slice::from_ref(value))
    }

    /// Encode and write several values back to back, then flush once.
    pub fn write_values(&mut self, values: &[Value]) -> Result<()> {
        self.buf.clear();
        for value in values {
            let size = value.payload_len();
            if size > self.config.max_payload_size {
                return Err(CodecError::PayloadTooLarge {
                    size,
                    max: self.config.max_payload_size,
                });
            }
            encode_value(value, &mut self.buf)?;
        }

        let buf = std::mem::take(&mut self.buf);
        let result = self.write_raw(&buf);
        self.buf = buf;
        result
    }

    /// Write bytes that are already framed (e.g. a relayed frame) and flush.
    ///
    /// Writers run on blocking streams, so `WouldBlock` means an expired write
    /// timeout and is returned as [`CodecError::Io`].
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(CodecError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl ValueWriter<IpcStream> {
    /// Create a value writer for `IpcStream` and apply write timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: CodecConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(|err| CodecError::Io(err.into_io()))?;
        Ok(Self::with_config(inner, config))
    }
}
