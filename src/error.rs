//! Error types for signrelay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Socket errors
    #[error("Failed to bind listener on {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("Inbound stream failed: {message}")]
    InboundRead { message: String },

    #[error("Failed to open relay connection to {addr}: {message}")]
    RelayConnect { addr: String, message: String },

    #[error("Relay write failed: {message}")]
    RelayWrite { message: String },

    #[error("Relay connection is not open")]
    RelayClosed,

    // Media errors
    #[error("Frame decode failed: {message}")]
    FrameDecode { message: String },

    #[error("Frame encode failed: {message}")]
    FrameEncode { message: String },

    #[error("Audio format error: {message}")]
    AudioFormat { message: String },

    // Collaborator errors
    #[error("Gesture classification failed: {message}")]
    Classification { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    #[error("Sign rendering failed: {message}")]
    Rendering { message: String },

    #[error("Backend command not found: {program}")]
    CommandNotFound { program: String },

    #[error("Backend command failed: {message}")]
    CommandFailed { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Whether a session can keep running after this error.
    ///
    /// Only the inbound side ending (or failing) terminates a session; everything
    /// downstream of it abandons the current job and returns to idle.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RelayError::InboundRead { .. }
                | RelayError::Bind { .. }
                | RelayError::ConfigFileNotFound { .. }
                | RelayError::ConfigInvalidValue { .. }
                | RelayError::Config(_)
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;
