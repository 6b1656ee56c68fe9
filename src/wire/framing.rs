// src/wire/framing.rs
// Splits the connection byte stream into frames and back. The codec sees
// whole frames only; framing never inspects their contents.

use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::FramingConfig;
use crate::constants::DEFAULT_MAX_FRAME_BYTES;

/// Buffered read side of a connection, type-erased over the transport.
pub type FrameReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
/// Write side of a connection, type-erased over the transport.
pub type FrameWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[async_trait]
pub trait Framing: Send + Sync {
    /// Read the next frame. Ok(None) signals a clean end of stream.
    async fn read_frame(&self, reader: &mut FrameReader) -> io::Result<Option<Vec<u8>>>;

    async fn write_frame(&self, writer: &mut FrameWriter, frame: &[u8]) -> io::Result<()>;
}

/// One frame per line, newline-terminated. The default.
pub struct LineFraming;

#[async_trait]
impl Framing for LineFraming {
    async fn read_frame(&self, reader: &mut FrameReader) -> io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    async fn write_frame(&self, writer: &mut FrameWriter, frame: &[u8]) -> io::Result<()> {
        writer.write_all(frame).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
}

/// Frames separated by an arbitrary single-byte delimiter.
pub struct DelimiterFraming {
    delimiter: u8,
}

impl DelimiterFraming {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

#[async_trait]
impl Framing for DelimiterFraming {
    async fn read_frame(&self, reader: &mut FrameReader) -> io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let n = reader.read_until(self.delimiter, &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&self.delimiter) {
            buf.pop();
        }
        Ok(Some(buf))
    }

    async fn write_frame(&self, writer: &mut FrameWriter, frame: &[u8]) -> io::Result<()> {
        writer.write_all(frame).await?;
        writer.write_all(&[self.delimiter]).await?;
        writer.flush().await
    }
}

/// Four-byte big-endian length prefix per frame, with an upper bound so a
/// corrupt prefix cannot trigger an absurd allocation.
pub struct LengthPrefixedFraming {
    max_frame_bytes: usize,
}

impl LengthPrefixedFraming {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }
}

impl Default for LengthPrefixedFraming {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

#[async_trait]
impl Framing for LengthPrefixedFraming {
    async fn read_frame(&self, reader: &mut FrameReader) -> io::Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; 4];
        match reader.read_exact(&mut prefix).await {
            Ok(_) => {}
            // EOF at a frame boundary is a clean close.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        let len = u32::from_be_bytes(prefix) as usize;
        if len > self.max_frame_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds limit of {}", len, self.max_frame_bytes),
            ));
        }
        let mut frame = vec![0u8; len];
        reader.read_exact(&mut frame).await?;
        Ok(Some(frame))
    }

    async fn write_frame(&self, writer: &mut FrameWriter, frame: &[u8]) -> io::Result<()> {
        writer.write_all(&(frame.len() as u32).to_be_bytes()).await?;
        writer.write_all(frame).await?;
        writer.flush().await
    }
}

/// Resolve the configured framing strategy. Unknown kinds are a startup
/// configuration error, not a fallback.
pub fn from_config(cfg: &FramingConfig) -> Result<Arc<dyn Framing>, String> {
    match cfg.kind.as_deref().unwrap_or("line") {
        "line" => Ok(Arc::new(LineFraming)),
        "delimiter" => {
            let raw = cfg
                .delimiter
                .as_deref()
                .ok_or_else(|| "delimiter framing requires a delimiter".to_string())?;
            let bytes = raw.as_bytes();
            if bytes.len() != 1 {
                return Err(format!(
                    "delimiter must be a single ASCII character, got '{}'",
                    raw
                ));
            }
            Ok(Arc::new(DelimiterFraming::new(bytes[0])))
        }
        "length-prefixed" => Ok(Arc::new(LengthPrefixedFraming::new(cfg.max_frame_bytes()))),
        other => Err(format!("unknown framing kind '{}'", other)),
    }
}
