//! Byte-stream buffering for both directions.
//!
//! ```text
//! video:  bytes ──▶ JpegDemuxer ──▶ Frame ──▶ SlidingWindow ──(stride)──▶ classify ──▶ DebounceGate
//! audio:  bytes ──▶ ChunkAccumulator ──(threshold)──▶ transcribe
//! ```

pub mod accumulator;
pub mod debounce;
pub mod demux;
pub mod frame;
pub mod window;

pub use accumulator::ChunkAccumulator;
pub use debounce::{DebounceGate, GateDecision};
pub use demux::JpegDemuxer;
pub use frame::{Frame, decode_jpeg, encode_jpeg};
pub use window::SlidingWindow;
