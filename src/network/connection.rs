use std::io::{self, ErrorKind};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time;
use tracing::trace;

use crate::network::Frame;
use crate::service::AppResult;

/// Read half of a framed connection.
///
/// Wraps the socket's read half with an accumulation buffer and parses
/// frames out of it. Every read is bounded by `idle_timeout`: if no bytes
/// arrive within that window the socket is declared stuck
/// (`AppError::Stalled`). Heartbeat frames are consumed here and never
/// returned to the caller.
#[derive(Debug)]
pub struct Connection {
    reader: OwnedReadHalf,
    buffer: BytesMut,
    max_frame_size: usize,
    idle_timeout: Duration,
}

impl Connection {
    pub fn new(reader: OwnedReadHalf, max_frame_size: usize, idle_timeout: Duration) -> Connection {
        Connection {
            reader,
            buffer: BytesMut::with_capacity(4 * 1024),
            max_frame_size,
            idle_timeout,
        }
    }

    /// Reads the next application payload from the connection.
    ///
    /// Returns `Ok(None)` when the peer closes the connection at a frame
    /// boundary. A close in the middle of a frame is reported as a
    /// connection reset. A malformed declared length or a stalled read is
    /// an error; the caller should tear the connection down.
    pub async fn read_frame(&mut self) -> AppResult<Option<Bytes>> {
        loop {
            if let Some(frame) = Frame::parse(&mut self.buffer, self.max_frame_size)? {
                match frame {
                    Frame::Heartbeat => {
                        trace!("heartbeat frame consumed");
                        continue;
                    }
                    Frame::Payload(body) => return Ok(Some(body.freeze())),
                }
            }
            let read = time::timeout(self.idle_timeout, self.reader.read_buf(&mut self.buffer))
                .await??;
            if 0 == read {
                return if self.buffer.is_empty() {
                    // peer has closed the connection gracefully
                    Ok(None)
                } else {
                    // peer closed the connection while sending a frame
                    Err(
                        io::Error::new(ErrorKind::ConnectionReset, "connection reset by peer")
                            .into(),
                    )
                };
            }
        }
    }
}

/// Write half of a framed connection.
#[derive(Debug)]
pub struct FrameWriter {
    writer: BufWriter<OwnedWriteHalf>,
}

impl FrameWriter {
    pub fn new(writer: OwnedWriteHalf) -> FrameWriter {
        FrameWriter {
            writer: BufWriter::new(writer),
        }
    }

    /// Writes one length-prefixed frame and flushes it.
    pub async fn write_frame(&mut self, payload: &[u8]) -> AppResult<()> {
        self.writer.write_i32(payload.len() as i32).await?;
        self.writer.write_all(payload).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Writes a zero-length keepalive frame.
    pub async fn write_heartbeat(&mut self) -> AppResult<()> {
        self.writer.write_i32(0).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
