//! The two translation directions of the relay.
//!
//! Each direction turns a raw inbound byte stream into relay output:
//! `gesture` reads MJPEG video and speaks the recognized signs, `speech`
//! reads PCM audio and draws the spoken words as sign-language video.

pub mod direction;
pub mod gesture;
pub mod speech;

pub use direction::Direction;
pub use gesture::{GestureServices, GestureSettings, GestureToSpeech};
pub use speech::{SpeechServices, SpeechSettings, SpeechToSign};
