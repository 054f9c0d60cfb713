//! In-process transcription with whisper.cpp.
//!
//! Built only with the `whisper` feature. Without it the type still exists
//! so configuration can be validated, but every transcription fails.

use crate::defaults;
use crate::error::{RelayError, Result};
use crate::inference::transcriber::SpeechTranscriber;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Whisper model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Path to a ggml model file.
    pub model_path: PathBuf,
    /// Spoken language code.
    pub language: String,
    /// Inference threads (None = whisper.cpp default).
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: defaults::TRANSCRIPTION_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

fn model_name_from_path(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(RelayError::TranscriptionModelNotFound {
            path: path.to_string_lossy().to_string(),
        });
    }
    Ok(path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string())
}

/// Converts 16-bit PCM to the [-1.0, 1.0] floats whisper expects.
pub fn normalize_samples(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Whisper transcriber. The context is loaded once and shared by sessions.
pub struct WhisperTranscriber {
    #[cfg(feature = "whisper")]
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl WhisperTranscriber {
    /// Loads the model.
    ///
    /// # Errors
    /// `TranscriptionModelNotFound` when the file is missing, `Transcription`
    /// when whisper.cpp rejects it.
    #[cfg(feature = "whisper")]
    pub fn new(config: WhisperConfig) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        let model_name = model_name_from_path(&config.model_path)?;
        let path = config
            .model_path
            .to_str()
            .ok_or_else(|| RelayError::Transcription {
                message: "Invalid UTF-8 in model path".to_string(),
            })?;
        let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| RelayError::Transcription {
                message: format!("Failed to load Whisper model: {}", e),
            })?;
        log::info!("Loaded Whisper model {}", model_name);

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    /// Checks the model path only; transcription is unavailable.
    #[cfg(not(feature = "whisper"))]
    pub fn new(config: WhisperConfig) -> Result<Self> {
        let model_name = model_name_from_path(&config.model_path)?;
        log::warn!("Built without the whisper feature; transcription will fail");
        Ok(Self { config, model_name })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl SpeechTranscriber for WhisperTranscriber {
    fn transcribe(&self, audio: &[i16]) -> Result<String> {
        let samples = normalize_samples(audio);
        let to_error = |message: String| RelayError::Transcription { message };

        let context = self
            .context
            .lock()
            .map_err(|e| to_error(format!("Failed to acquire context lock: {}", e)))?;
        let mut state = context
            .create_state()
            .map_err(|e| to_error(format!("Failed to create Whisper state: {}", e)))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&self.config.language));
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &samples)
            .map_err(|e| to_error(format!("Whisper inference failed: {}", e)))?;

        let text: String = state.as_iter().map(|segment| segment.to_string()).collect();
        Ok(text.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl SpeechTranscriber for WhisperTranscriber {
    fn transcribe(&self, _audio: &[i16]) -> Result<String> {
        Err(RelayError::Transcription {
            message: "Whisper feature not enabled. Rebuild with --features whisper or use the command transcriber backend".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}
