//! Self-describing, checksummed frames and the logs that hold them.

mod iterator;
mod record;
mod writer;

pub use iterator::FrameIterator;
pub(crate) use iterator::stop_on_corruption;
pub use record::{
    compute_crc32, decode_frame, encode_frame, encode_frame_into, frame_len, padding_len, Frame,
    FrameHeader, FRAME_CRC_SIZE, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use writer::{FrameLog, DATA_LOG_MAGIC, LOG_HEADER_SIZE, META_LOG_MAGIC};
