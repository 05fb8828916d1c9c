//! Newline-delimited hex framing for the middleware wire protocol.
//!
//! Every payload crossing the middleware's stdin/stdout is sent as one line:
//! - lowercase hex digits, two per payload byte
//! - a single `\n` delimiter
//!
//! Hex output can never contain the delimiter, so any payload is safe to send
//! and a frame is always exactly `2 * payload_len + 1` bytes.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, frame_len, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, DELIMITER,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::{write_encoded, FrameWriter};
