//! signrelay - sign-language video ⇄ speech relay
//!
//! Sits between a video/audio source and a downstream muxing process.
//! The gesture direction reads MJPEG, classifies a sliding window of frames
//! and speaks new labels as padded PCM. The speech direction reads PCM,
//! transcribes fixed-size chunks and sends the rendered sign-language
//! frames as JPEGs.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod relay;
pub mod streaming;

// Composition root - needs the CLI types
#[cfg(feature = "cli")]
pub mod app;

// Collaborator traits
pub use inference::{GestureClassifier, SignRenderer, SpeechSynthesizer, SpeechTranscriber};

// Directions and server
pub use pipeline::{Direction, GestureToSpeech, SpeechToSign};
pub use relay::{RelayConnector, RelayServer, RelaySink, Session, SessionReport};

// Error handling
pub use error::{RelayError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
