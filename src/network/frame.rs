use bytes::{Buf, BytesMut};

use crate::service::AppError::Incomplete;
use crate::service::{AppError, AppResult};

/// Wire frame header size: a 4-byte big-endian payload length.
pub const FRAME_HEADER_SIZE: usize = 4;

/// One unit on the wire: the declared length followed by that many payload
/// bytes. A declared length of zero carries no payload and acts as a
/// keepalive; it is consumed by the read path and never surfaced.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Heartbeat,
    Payload(BytesMut),
}

impl Frame {
    /// Checks whether `buffer` holds a complete frame.
    ///
    /// Returns `Err(Incomplete)` when more bytes are needed (reserving room
    /// for the rest of the frame), and `Err(MalformedFrame)` when the
    /// declared length is negative or exceeds `max_frame_size`.
    pub fn check(buffer: &mut BytesMut, max_frame_size: usize) -> AppResult<()> {
        if buffer.remaining() < FRAME_HEADER_SIZE {
            return Err(Incomplete);
        }
        let header = buffer.get(0..FRAME_HEADER_SIZE).unwrap();
        let body_size = i32::from_be_bytes(header.try_into().unwrap());
        if body_size < 0 {
            return Err(AppError::MalformedFrame(format!(
                "frame size {} less than 0",
                body_size
            )));
        }
        if body_size as usize > max_frame_size {
            return Err(AppError::MalformedFrame(format!(
                "frame of length {} is too large (limit {})",
                body_size, max_frame_size
            )));
        }
        if buffer.remaining() < body_size as usize + FRAME_HEADER_SIZE {
            buffer.reserve(body_size as usize + FRAME_HEADER_SIZE);
            return Err(Incomplete);
        }
        Ok(())
    }

    /// Parses one frame out of `buffer`.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// frame; the caller should read more bytes and retry.
    pub(crate) fn parse(buffer: &mut BytesMut, max_frame_size: usize) -> AppResult<Option<Frame>> {
        match Frame::check(buffer, max_frame_size) {
            Ok(_) => {
                let body_size = buffer.get_i32();
                if body_size == 0 {
                    return Ok(Some(Frame::Heartbeat));
                }
                let body = buffer.split_to(body_size as usize);
                Ok(Some(Frame::Payload(body)))
            }
            Err(AppError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
