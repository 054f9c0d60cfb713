use crate::audio::pcm::PcmFormat;
use crate::defaults;
use crate::error::{RelayError, Result};
use crate::inference::command::CommandSpec;
use crate::inference::whisper::WhisperConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
#[cfg(feature = "cli")]
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub output: OutputConfig,
    pub backends: BackendsConfig,
}

/// Inbound listen sockets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_host: String,
    /// Video in, speech out.
    pub gesture_port: u16,
    /// Audio in, sign video out.
    pub speech_port: u16,
    pub read_chunk_bytes: usize,
}

/// Downstream muxer endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub gesture_port: u16,
    pub speech_port: u16,
}

/// Gesture window and inference cadence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoConfig {
    pub window_capacity: usize,
    pub stride: usize,
    pub fps: u32,
}

/// Inbound audio layout and chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub chunk_bytes: usize,
    pub inbound: PcmFormat,
    pub transcriber_sample_rate: u32,
}

/// What is written to the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: PcmFormat,
    pub pre_roll_ms: u64,
    pub post_roll_ms: u64,
    pub jpeg_quality: u8,
}

/// Where transcription runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriberBackend {
    /// In-process whisper.cpp (needs the `whisper` feature).
    Whisper,
    /// External program reading WAV on stdin.
    Command,
}

impl Default for TranscriberBackend {
    /// Whisper when it is compiled in, the external command otherwise.
    fn default() -> Self {
        if cfg!(feature = "whisper") {
            Self::Whisper
        } else {
            Self::Command
        }
    }
}

/// Collaborator backends
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendsConfig {
    pub classifier: CommandSpec,
    pub synthesizer: CommandSpec,
    pub renderer: CommandSpec,
    pub transcriber: TranscriberBackend,
    pub transcriber_command: CommandSpec,
    pub whisper: WhisperConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_host: defaults::LISTEN_HOST.to_string(),
            gesture_port: defaults::GESTURE_LISTEN_PORT,
            speech_port: defaults::SPEECH_LISTEN_PORT,
            read_chunk_bytes: defaults::READ_CHUNK_BYTES,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: defaults::RELAY_HOST.to_string(),
            gesture_port: defaults::GESTURE_RELAY_PORT,
            speech_port: defaults::SPEECH_RELAY_PORT,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            window_capacity: defaults::WINDOW_CAPACITY,
            stride: defaults::INFERENCE_STRIDE,
            fps: defaults::CLASSIFIER_FPS,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: defaults::AUDIO_CHUNK_BYTES,
            inbound: PcmFormat::new(
                defaults::INBOUND_SAMPLE_RATE,
                defaults::INBOUND_CHANNELS,
                2,
            ),
            transcriber_sample_rate: defaults::TRANSCRIBER_SAMPLE_RATE,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: PcmFormat::default(),
            pre_roll_ms: defaults::PRE_ROLL_MS,
            post_roll_ms: defaults::POST_ROLL_MS,
            jpeg_quality: defaults::JPEG_QUALITY,
        }
    }
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            classifier: CommandSpec::new("signrelay-classify", &[]),
            synthesizer: CommandSpec::new("espeak-ng", &["-v", "it", "--stdout"]),
            renderer: CommandSpec::new("signrelay-render", &[]),
            transcriber: TranscriberBackend::default(),
            transcriber_command: CommandSpec::new("signrelay-transcribe", &[]),
            whisper: WhisperConfig::default(),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> RelayError {
    RelayError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelayError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                RelayError::Io(e)
            }
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(RelayError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SIGNRELAY_LISTEN_HOST → server.listen_host
    /// - SIGNRELAY_RELAY_HOST → relay.host
    /// - SIGNRELAY_WHISPER_MODEL → backends.whisper.model_path
    /// - SIGNRELAY_LANGUAGE → backends.whisper.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(host) = env_value("SIGNRELAY_LISTEN_HOST") {
            self.server.listen_host = host;
        }
        if let Some(host) = env_value("SIGNRELAY_RELAY_HOST") {
            self.relay.host = host;
        }
        if let Some(model) = env_value("SIGNRELAY_WHISPER_MODEL") {
            self.backends.whisper.model_path = model.into();
        }
        if let Some(language) = env_value("SIGNRELAY_LANGUAGE") {
            self.backends.whisper.language = language;
        }
        self
    }

    /// Rejects values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.video.window_capacity == 0 {
            return Err(invalid("video.window_capacity", "must be positive"));
        }
        if self.video.stride == 0 {
            return Err(invalid("video.stride", "must be positive"));
        }
        if self.video.fps == 0 {
            return Err(invalid("video.fps", "must be positive"));
        }
        if self.audio.chunk_bytes == 0 {
            return Err(invalid("audio.chunk_bytes", "must be positive"));
        }
        if self.audio.transcriber_sample_rate == 0 {
            return Err(invalid("audio.transcriber_sample_rate", "must be positive"));
        }
        if self.server.read_chunk_bytes == 0 {
            return Err(invalid("server.read_chunk_bytes", "must be positive"));
        }
        self.audio
            .inbound
            .validate()
            .map_err(|e| invalid("audio.inbound", e.to_string()))?;
        let frame_size = self.audio.inbound.frame_size();
        if self.audio.chunk_bytes % frame_size != 0 {
            return Err(invalid(
                "audio.chunk_bytes",
                format!("must be a multiple of the inbound frame size ({} bytes)", frame_size),
            ));
        }
        self.output
            .format
            .validate()
            .map_err(|e| invalid("output.format", e.to_string()))?;
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(invalid("output.jpeg_quality", "must be between 1 and 100"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/signrelay/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("signrelay")
            .join("config.toml")
    }
}
