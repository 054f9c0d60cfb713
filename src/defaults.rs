//! Default configuration constants for signrelay.
//!
//! Shared by the config types and the streaming stages so that a default
//! config and a hand-built stage agree on every number.

/// Number of frames handed to the gesture classifier per inference.
pub const WINDOW_CAPACITY: usize = 37;

/// New frames between two successive classifier calls.
pub const INFERENCE_STRIDE: usize = 5;

/// Frame rate reported to the classifier.
pub const CLASSIFIER_FPS: u32 = 30;

/// Inbound audio bytes per transcription chunk.
///
/// One second of 48kHz stereo s16le.
pub const AUDIO_CHUNK_BYTES: usize = 192_000;

/// Sample rate of the inbound audio stream.
pub const INBOUND_SAMPLE_RATE: u32 = 48_000;

/// Channel count of the inbound audio stream.
pub const INBOUND_CHANNELS: u16 = 2;

/// Sample rate the transcriber expects.
pub const TRANSCRIBER_SAMPLE_RATE: u32 = 16_000;

/// Transcription language.
pub const TRANSCRIPTION_LANGUAGE: &str = "it";

/// Relay PCM sample rate in Hz.
pub const RELAY_SAMPLE_RATE: u32 = 48_000;

/// Relay PCM channel count.
pub const RELAY_CHANNELS: u16 = 2;

/// Relay PCM sample width in bytes (s16le).
pub const RELAY_BYTES_PER_SAMPLE: u16 = 2;

/// Silence written before each synthesized utterance.
pub const PRE_ROLL_MS: u64 = 100;

/// Silence written after each synthesized utterance.
pub const POST_ROLL_MS: u64 = 200;

/// JPEG quality for frames sent to the relay.
pub const JPEG_QUALITY: u8 = 80;

/// Bytes requested per inbound socket read.
pub const READ_CHUNK_BYTES: usize = 4096;

/// Listen host for both directions.
pub const LISTEN_HOST: &str = "0.0.0.0";

/// Listen port for the gesture (video → speech) direction.
pub const GESTURE_LISTEN_PORT: u16 = 9001;

/// Relay port for the gesture direction.
pub const GESTURE_RELAY_PORT: u16 = 9002;

/// Listen port for the speech (audio → sign video) direction.
pub const SPEECH_LISTEN_PORT: u16 = 9003;

/// Relay port for the speech direction.
pub const SPEECH_RELAY_PORT: u16 = 9004;

/// Host of the downstream muxing process.
pub const RELAY_HOST: &str = "node";
