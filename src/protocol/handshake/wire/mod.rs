pub mod adapter;
pub mod frame;

pub use adapter::WireAdapter;
pub use frame::{FRAME_HEADER_LEN, FrameDecoder, FrameError, encode_frame};
