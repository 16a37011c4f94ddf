use std::io::{ErrorKind, Read};
use std::sync::Arc;

use crate::buffer::StagingBuffer;
use crate::codec::{FrameCodec, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::packer::Packer;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete messages from any `Read` stream.
///
/// Bytes land in a [`StagingBuffer`] and are fed to a [`FrameCodec`], so
/// callers always get whole messages regardless of how the stream splits
/// them.
pub struct FrameReader<T> {
    inner: T,
    buf: StagingBuffer,
    codec: FrameCodec,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let codec = FrameCodec::new().with_max_payload_size(config.max_payload_size);
        Self::with_codec(inner, codec, config)
    }

    /// Create a frame reader decoding bodies with `packer`.
    pub fn with_packer(inner: T, packer: Arc<dyn Packer>, config: FrameConfig) -> Self {
        let codec = FrameCodec::with_packer(packer).with_max_payload_size(config.max_payload_size);
        Self::with_codec(inner, codec, config)
    }

    fn with_codec(inner: T, codec: FrameCodec, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: StagingBuffer::with_capacity(config.initial_buffer_size),
            codec,
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A
    /// malformed frame discards everything buffered so far.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            match self.codec.decode(&mut self.buf) {
                Ok(Some(msg)) => return Ok(msg),
                Ok(None) => {}
                Err(err) => {
                    self.discard();
                    return Err(err);
                }
            }

            let read = match self.buf.read_from(&mut self.inner, READ_CHUNK_SIZE) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Drop any partially received frame.
    pub fn discard(&mut self) {
        self.buf.reset_all();
        self.codec.reset();
    }

    /// Bytes received but not yet turned into a message.
    pub fn buffered(&self) -> usize {
        self.buf.readable_bytes()
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

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
        self.codec.set_max_payload_size(max_payload_size);
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode_frame, MAGIC};

    fn wire(messages: &[Message]) -> Vec<u8> {
        let codec = FrameCodec::new();
        let mut out = BytesMut::new();
        for msg in messages {
            codec.encode(msg, &mut out).unwrap();
        }
        out.to_vec()
    }

    fn request(id: u32, method: &str) -> Message {
        let mut msg = Message::with_id(id);
        msg.set_method(method);
        msg
    }

    #[test]
    fn read_single_message() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[request(1, "hello")])));
        let msg = reader.read_message().unwrap();

        assert_eq!(msg.id(), 1);
        assert_eq!(msg.method(), "hello");
    }

    #[test]
    fn read_multiple_messages() {
        let bytes = wire(&[request(1, "one"), request(2, "two"), request(3, "three")]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let m1 = reader.read_message().unwrap();
        let m2 = reader.read_message().unwrap();
        let m3 = reader.read_message().unwrap();

        assert_eq!((m1.id(), m1.method()), (1, "one"));
        assert_eq!((m2.id(), m2.method()), (2, "two"));
        assert_eq!((m3.id(), m3.method()), (3, "three"));
    }

    #[test]
    fn read_message_with_large_payload() {
        let mut msg = request(9, "bulk");
        msg.set("blob", "x".repeat(64 * 1024));

        let mut reader = FrameReader::new(Cursor::new(wire(&[msg.clone()])));
        assert_eq!(reader.read_message().unwrap(), msg);
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[request(4, "slow"), request(5, "slower")]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_message().unwrap(), request(4, "slow"));
        assert_eq!(reader.read_message().unwrap(), request(5, "slower"));
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_slice(&MAGIC);
        partial.put_u32_le(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn invalid_magic_discards_buffer() {
        let mut bytes = vec![0x00, 0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&wire(&[request(1, "after")]));
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::InvalidMagic { .. }));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn undecodable_body_in_stream() {
        let mut bytes = BytesMut::new();
        encode_frame(b"{\"id\":", &mut bytes).unwrap();

        let mut reader = FrameReader::new(Cursor::new(bytes.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let mut bytes = BytesMut::new();
        bytes.put_slice(&MAGIC);
        bytes.put_u32_le(1024);

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes.to_vec()), cfg);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn set_max_payload_size_applies_to_codec() {
        let mut msg = request(1, "big");
        msg.set("blob", "y".repeat(256));

        let mut reader = FrameReader::new(Cursor::new(wire(&[msg])));
        reader.set_max_payload_size(32);
        assert_eq!(reader.config().max_payload_size, 32);

        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { max: 32, .. }));
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

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.write_message(&request(1, "ping")).unwrap();
        assert_eq!(reader.read_message().unwrap(), request(1, "ping"));
    }

    #[test]
    #[cfg(unix)]
    fn concurrent_reader_writer_threads() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let reader_thread = std::thread::spawn(move || {
            for expected in 1..=64u32 {
                let msg = reader.read_message().unwrap();
                assert_eq!(msg.id(), expected);
                assert_eq!(msg.get("seq"), Some(expected.to_string().as_str()));
            }
        });

        for i in 1..=64u32 {
            let mut msg = request(i, "seq");
            msg.set("seq", i.to_string());
            writer.write_message(&msg).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&[request(8, "ok")])),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_message().unwrap(), request(8, "ok"));
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn would_block_propagates_io_error() {
        let mut framed = FrameReader::new(AlwaysWouldBlock);
        let err = framed.read_message().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    struct AlwaysWouldBlock;

    impl Read for AlwaysWouldBlock {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }
}
