//! PCM handling: layout conversion, WAV interchange and relay packetizing.

pub mod packetizer;
pub mod pcm;
pub mod wav;

pub use packetizer::{AudioPacketizer, EmissionReport, PacketizerConfig};
pub use pcm::{PcmAudio, PcmFormat};
