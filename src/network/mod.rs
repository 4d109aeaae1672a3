//! Wire-level plumbing.
//!
//! The wire format is a stream of frames: each frame is a 4-byte big-endian
//! payload length followed by that many payload bytes. A length of zero is
//! a heartbeat and carries no payload. There are no magic bytes, no version
//! field and no checksum; TCP is trusted for integrity.
//!
//! # Components
//!
//! - `Frame`: parsing and validation of individual frames
//! - `Connection`: buffered frame reads with stall detection
//! - `FrameWriter`: buffered frame writes

pub use connection::Connection;
pub use connection::FrameWriter;
pub use frame::Frame;
pub use frame::FRAME_HEADER_SIZE;
mod connection;
mod frame;
