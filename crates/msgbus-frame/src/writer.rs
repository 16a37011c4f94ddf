use std::io::{ErrorKind, Write};
use std::sync::Arc;

use bytes::BytesMut;

use crate::codec::{encode_frame, FrameCodec, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::packer::Packer;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    codec: FrameCodec,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let codec = FrameCodec::new().with_max_payload_size(config.max_payload_size);
        Self::with_codec(inner, codec, config)
    }

    /// Create a frame writer encoding bodies with `packer`.
    pub fn with_packer(inner: T, packer: Arc<dyn Packer>, config: FrameConfig) -> Self {
        let codec = FrameCodec::with_packer(packer).with_max_payload_size(config.max_payload_size);
        Self::with_codec(inner, codec, config)
    }

    fn with_codec(inner: T, codec: FrameCodec, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            codec,
            config,
        }
    }

    /// Encode and write one message (blocking).
    pub fn write_message(&mut self, msg: &Message) -> Result<()> {
        self.buf.clear();
        self.codec.encode(msg, &mut self.buf)?;
        self.write_buffered()
    }

    /// Write an already encoded body behind a fresh header.
    pub fn write_body(&mut self, body: &[u8]) -> Result<()> {
        if body.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: body.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(body, &mut self.buf)?;
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                // A socket write timeout surfaces as WouldBlock (Unix) or
                // TimedOut (Windows); both end the write.
                Err(err) => return Err(FrameError::Io(err)),
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
                Err(err) => return Err(FrameError::Io(err)),
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

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
        self.codec.set_max_payload_size(max_payload_size);
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::buffer::StagingBuffer;
    use crate::codec::HEADER_SIZE;

    fn decode_all(bytes: &[u8]) -> Vec<Message> {
        let mut buf = StagingBuffer::new();
        buf.append(bytes);
        let mut codec = FrameCodec::new();
        let mut out = Vec::new();
        while let Some(msg) = codec.decode(&mut buf).unwrap() {
            out.push(msg);
        }
        out
    }

    fn request(id: u32, method: &str) -> Message {
        let mut msg = Message::with_id(id);
        msg.set_method(method);
        msg
    }

    #[test]
    fn write_single_message() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_message(&request(1, "hello")).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(decode_all(&wire), vec![request(1, "hello")]);
    }

    #[test]
    fn write_multiple_messages() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_message(&request(1, "one")).unwrap();
        writer.write_message(&request(2, "two")).unwrap();
        writer.write_message(&request(3, "three")).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(
            decode_all(&wire),
            vec![request(1, "one"), request(2, "two"), request(3, "three")]
        );
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.write_message(&request(1, "oversized")).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));

        let err = writer.write_body(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn write_body_frames_raw_bytes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_body(br#"{"id":7,"method":"raw"}"#).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len(), HEADER_SIZE + 23);
        assert_eq!(decode_all(&wire), vec![request(7, "raw")]);
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.write_message(&request(1, "x")).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn retries_interrupted_writes_and_flushes() {
        let writer_impl = FlakyWriter {
            write_errors: vec![ErrorKind::Interrupted, ErrorKind::Interrupted],
            flush_errors: vec![ErrorKind::Interrupted],
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl);
        writer.write_message(&request(5, "retry")).unwrap();

        let inner = writer.into_inner();
        assert_eq!(decode_all(&inner.data), vec![request(5, "retry")]);
    }

    #[test]
    fn timed_out_write_is_an_io_error() {
        for kind in [ErrorKind::WouldBlock, ErrorKind::TimedOut] {
            let writer_impl = FlakyWriter {
                write_errors: vec![kind],
                flush_errors: Vec::new(),
                data: Vec::new(),
            };
            let mut writer = FrameWriter::new(writer_impl);

            let err = writer.write_message(&request(6, "stalled")).unwrap_err();
            match err {
                FrameError::Io(io) => assert_eq!(io.kind(), kind),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn timed_out_flush_is_an_io_error() {
        let writer_impl = FlakyWriter {
            write_errors: Vec::new(),
            flush_errors: vec![ErrorKind::WouldBlock],
            data: Vec::new(),
        };
        let mut writer = FrameWriter::new(writer_impl);

        let err = writer.write_message(&request(7, "x")).unwrap_err();
        assert!(matches!(err, FrameError::Io(ref io) if io.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.write_message(&request(1, "x")).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn written_bytes_read_back() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_message(&request(3, "z")).unwrap();

        let wire = writer.into_inner().into_inner();
        let mut framed = crate::reader::FrameReader::new(Cursor::new(wire));
        assert_eq!(framed.read_message().unwrap(), request(3, "z"));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FlakyWriter {
        write_errors: Vec<ErrorKind>,
        flush_errors: Vec<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.write_errors.pop() {
                return Err(std::io::Error::from(kind));
            }
            // Short writes exercise the offset loop.
            let n = buf.len().min(5);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if let Some(kind) = self.flush_errors.pop() {
                return Err(std::io::Error::from(kind));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
