//! Black-box collaborators behind narrow traits.
//!
//! Each model the relay talks to (gesture classifier, speech synthesizer,
//! speech transcriber, sign renderer) is a trait with a deterministic mock.
//! Real backends are external commands, plus in-process Whisper when the
//! `whisper` feature is on.

pub mod classifier;
pub mod command;
pub mod renderer;
pub mod synthesizer;
pub mod transcriber;
pub mod whisper;

pub use classifier::{GestureClassifier, MockClassifier};
pub use command::{
    CommandClassifier, CommandRenderer, CommandRunner, CommandSpec, CommandSynthesizer,
    CommandTranscriber, MockCommandRunner, SystemCommandRunner,
};
pub use renderer::{MockRenderer, SignRenderer};
pub use synthesizer::{MockSynthesizer, SpeechSynthesizer};
pub use transcriber::{MockTranscriber, SpeechTranscriber};
pub use whisper::{WhisperConfig, WhisperTranscriber};
