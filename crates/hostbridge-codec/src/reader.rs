use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use hostbridge_transport::IpcStream;
use tracing::debug;

use crate::codec::{decode_frame, split_frame, CodecConfig};
use crate::error::{CodecError, Result};
use crate::value::Value;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete tagged values from any `Read` stream.
///
/// Handles partial reads internally. Callers always get complete values.
pub struct ValueReader<T> {
    inner: T,
    buf: BytesMut,
    config: CodecConfig,
}

impl<T: Read> ValueReader<T> {
    /// Create a new value reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, CodecConfig::default())
    }

    /// Create a new value reader with explicit configuration.
    pub fn with_config(inner: T, config: CodecConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the wire bytes of the next complete value (blocking).
    ///
    /// Returns `Err(CodecError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = split_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            };

            if read == 0 {
                if !self.buf.is_empty() {
                    debug!(buffered = self.buf.len(), "stream closed mid-value");
                }
                return Err(CodecError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read and decode the next complete value (blocking).
    pub fn read_value(&mut self) -> Result<Value> {
        let frame = self.read_frame()?;
        decode_frame(&frame)
    }

    /// Bytes received but not yet consumed into a complete value.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl ValueReader<IpcStream> {
    /// Create a value reader for `IpcStream` and apply read timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: CodecConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(|err| CodecError::Io(err.into_io()))?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;

    use super::*;
    use crate::codec::{encode, encode_value};
    use crate::writer::ValueWriter;

    fn wire(values: &[Value]) -> Vec<u8> {
        encode(values).unwrap().to_vec()
    }

    #[test]
    fn read_multiple_values() {
        let values = vec![Value::from("one"), Value::from(2), Value::Absent];
        let mut reader = ValueReader::new(Cursor::new(wire(&values)));

        assert_eq!(reader.read_value().unwrap(), values[0]);
        assert_eq!(reader.read_value().unwrap(), values[1]);
        assert_eq!(reader.read_value().unwrap(), values[2]);
        assert!(matches!(
            reader.read_value().unwrap_err(),
            CodecError::ConnectionClosed
        ));
    }

    #[test]
    fn read_frame_returns_wire_bytes() {
        let bytes = wire(&[Value::from("x")]);
        let mut reader = ValueReader::new(Cursor::new(bytes.clone()));
        assert_eq!(reader.read_frame().unwrap().as_ref(), bytes.as_slice());
    }

    #[test]
    fn read_value_with_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut reader = ValueReader::new(Cursor::new(wire(&[Value::from(payload.clone())])));
        assert_eq!(reader.read_value().unwrap(), Value::from(payload));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[Value::from("slow"), Value::from(true)]),
            pos: 0,
        };
        let mut reader = ValueReader::new(byte_reader);

        assert_eq!(reader.read_value().unwrap(), Value::from("slow"));
        assert_eq!(reader.read_value().unwrap(), Value::from(true));
    }

    #[test]
    fn connection_closed_mid_value() {
        let mut partial = BytesMut::new();
        partial.put_u8(0x02);
        partial.put_u32(16);
        partial.put_slice(b"only-part");

        let mut reader = ValueReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_value().unwrap_err();
        assert!(matches!(err, CodecError::ConnectionClosed));
    }

    #[test]
    fn unknown_tag_in_stream() {
        let mut reader = ValueReader::new(Cursor::new(vec![0x42, 0, 0, 0, 0]));
        let err = reader.read_value().unwrap_err();
        assert!(matches!(err, CodecError::UnknownTag(0x42)));
    }

    #[test]
    fn oversized_value_in_stream() {
        let mut wire = BytesMut::new();
        wire.put_u8(0x04);
        wire.put_u32(1024);

        let cfg = CodecConfig {
            max_payload_size: 16,
            ..CodecConfig::default()
        };
        let mut reader = ValueReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_value().unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge { .. }));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: wire(&[Value::from("ok")]),
            pos: 0,
        };
        let mut reader = ValueReader::new(reader);
        assert_eq!(reader.read_value().unwrap(), Value::from("ok"));
    }

    #[test]
    fn keeps_trailing_bytes_buffered() {
        let mut bytes = BytesMut::new();
        encode_value(&Value::from("a"), &mut bytes).unwrap();
        bytes.put_u8(0x02);
        bytes.put_u8(0x00);

        let mut reader = ValueReader::new(Cursor::new(bytes.to_vec()));
        assert_eq!(reader.read_value().unwrap(), Value::from("a"));
        assert_eq!(reader.buffered(), &[0x02, 0x00]);
    }

    #[test]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = ValueWriter::new(left);
        let mut reader = ValueReader::new(right);

        writer.write_value(&Value::from("ping")).unwrap();
        writer.write_values(&[Value::from(1), Value::from(false)]).unwrap();

        assert_eq!(reader.read_value().unwrap(), Value::from("ping"));
        assert_eq!(reader.read_value().unwrap(), Value::from(1));
        assert_eq!(reader.read_value().unwrap(), Value::from(false));
    }

    #[test]
    fn concurrent_reader_writer_threads() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = ValueWriter::new(left);
        let mut reader = ValueReader::new(right);

        let reader_thread = std::thread::spawn(move || {
            for expected in 0..64u32 {
                let value = reader.read_value().unwrap();
                assert_eq!(value, Value::from(format!("msg-{expected}")));
            }
        });

        for i in 0..64u32 {
            writer.write_value(&Value::from(format!("msg-{i}"))).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    fn applies_read_timeout_for_ipc_stream() {
        let listener =
            hostbridge_transport::IpcListener::bind(&"127.0.0.1:0".parse().unwrap()).unwrap();
        let endpoint = listener.local_endpoint();
        let connector = std::thread::spawn(move || hostbridge_transport::connect(&endpoint));
        let stream = listener.accept().unwrap();
        let _client = connector.join().unwrap().unwrap();

        let cfg = CodecConfig {
            read_timeout: Some(std::time::Duration::from_millis(10)),
            ..CodecConfig::default()
        };

        let mut reader = ValueReader::with_config_ipc(stream, cfg).unwrap();
        let err = reader.read_value().unwrap_err();
        assert!(matches!(
            err,
            CodecError::Io(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut
        ));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
