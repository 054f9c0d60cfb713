use crate::audio::pcm::PcmAudio;
use crate::error::{Result, RelayError};
use std::sync::{Arc, Mutex};

/// Trait for text-to-speech synthesis.
///
/// Implementations return audio in whatever layout they produce; the
/// packetizer converts it to the relay format.
pub trait SpeechSynthesizer: Send + Sync {
    /// Vocalize `text`.
    fn synthesize(&self, text: &str) -> Result<PcmAudio>;

    /// Name of the backing engine or command
    fn name(&self) -> &str;
}

impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Arc<T> {
    fn synthesize(&self, text: &str) -> Result<PcmAudio> {
        (**self).synthesize(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock synthesizer for testing
///
/// Produces a fixed block of audio for every call and records the texts.
#[derive(Debug)]
pub struct MockSynthesizer {
    audio: PcmAudio,
    should_fail: bool,
    texts: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    /// 100ms of a constant mono 24kHz signal.
    pub fn new() -> Self {
        Self {
            audio: PcmAudio::new(vec![1000; 2400], 24_000, 1),
            should_fail: false,
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Configure the mock to return specific audio
    pub fn with_audio(mut self, audio: PcmAudio) -> Self {
        self.audio = audio;
        self
    }

    /// Configure the mock to fail on synthesize
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Texts synthesized so far.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for MockSynthesizer {
    fn synthesize(&self, text: &str) -> Result<PcmAudio> {
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(text.to_string());
        }
        if self.should_fail {
            return Err(RelayError::Synthesis {
                message: "mock synthesis failure".to_string(),
            });
        }
        Ok(self.audio.clone())
    }

    fn name(&self) -> &str {
        "mock-synthesizer"
    }
}
