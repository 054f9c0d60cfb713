use crate::error::{Result, RelayError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait SpeechTranscriber: Send + Sync {
    /// Transcribe audio samples to text.
    ///
    /// # Arguments
    /// * `audio` - Mono 16-bit PCM at the transcriber sample rate (16kHz)
    ///
    /// # Returns
    /// Transcribed text, possibly empty
    fn transcribe(&self, audio: &[i16]) -> Result<String>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the transcriber is ready
    fn is_ready(&self) -> bool;
}

/// Implement SpeechTranscriber for Arc<T> to allow sharing across sessions.
impl<T: SpeechTranscriber + ?Sized> SpeechTranscriber for Arc<T> {
    fn transcribe(&self, audio: &[i16]) -> Result<String> {
        (**self).transcribe(audio)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock transcriber for testing
#[derive(Debug)]
pub struct MockTranscriber {
    model_name: String,
    response: String,
    script: Mutex<VecDeque<String>>,
    should_fail: bool,
    received: Mutex<Vec<usize>>,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            script: Mutex::new(VecDeque::new()),
            should_fail: false,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Responses to return, in order, before the fixed response
    pub fn with_script(self, responses: &[&str]) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(responses.iter().map(|r| r.to_string()));
        }
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Sample counts of every audio buffer received.
    pub fn received(&self) -> Vec<usize> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl SpeechTranscriber for MockTranscriber {
    fn transcribe(&self, audio: &[i16]) -> Result<String> {
        if let Ok(mut received) = self.received.lock() {
            received.push(audio.len());
        }
        if self.should_fail {
            return Err(RelayError::Transcription {
                message: "mock transcription failure".to_string(),
            });
        }
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        Ok(scripted.unwrap_or_else(|| self.response.clone()))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}
