//! Composition root: turns a [`Config`] into running relay servers.
//!
//! Collaborators are built once here and shared by every session through
//! the direction's service object.

use crate::audio::packetizer::{AudioPacketizer, PacketizerConfig};
use crate::cli::EndpointArgs;
use crate::config::{Config, TranscriberBackend};
use crate::error::{RelayError, Result};
use crate::inference::command::{
    CommandClassifier, CommandRenderer, CommandSynthesizer, CommandTranscriber,
    SystemCommandRunner,
};
use crate::inference::transcriber::SpeechTranscriber;
use crate::inference::whisper::WhisperTranscriber;
use crate::pipeline::gesture::{GestureServices, GestureSettings, GestureToSpeech};
use crate::pipeline::speech::{SpeechServices, SpeechSettings, SpeechToSign};
use crate::relay::connection::TcpRelayConnector;
use crate::relay::server::RelayServer;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

/// Which direction a process relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Video in, speech out.
    Gesture,
    /// Speech in, sign video out.
    Speech,
}

/// Applies command-line socket overrides for `mode` on top of `config`.
pub fn apply_endpoints(mut config: Config, mode: Mode, endpoints: &EndpointArgs) -> Config {
    if let Some(host) = &endpoints.listen_host {
        config.server.listen_host = host.clone();
    }
    if let Some(host) = &endpoints.relay_host {
        config.relay.host = host.clone();
    }
    let (listen_port, relay_port) = match mode {
        Mode::Gesture => (&mut config.server.gesture_port, &mut config.relay.gesture_port),
        Mode::Speech => (&mut config.server.speech_port, &mut config.relay.speech_port),
    };
    if let Some(port) = endpoints.listen_port {
        *listen_port = port;
    }
    if let Some(port) = endpoints.relay_port {
        *relay_port = port;
    }
    config
}

/// Builds the video → speech collaborators.
pub fn build_gesture_services(config: &Config) -> Result<GestureServices> {
    let packetizer = AudioPacketizer::new(PacketizerConfig {
        format: config.output.format,
        pre_roll: Duration::from_millis(config.output.pre_roll_ms),
        post_roll: Duration::from_millis(config.output.post_roll_ms),
    })?;

    Ok(GestureServices {
        classifier: Arc::new(CommandClassifier::new(
            config.backends.classifier.clone(),
            SystemCommandRunner::new(),
            config.output.jpeg_quality,
        )),
        synthesizer: Arc::new(CommandSynthesizer::new(
            config.backends.synthesizer.clone(),
            SystemCommandRunner::new(),
        )),
        packetizer,
        settings: GestureSettings {
            window_capacity: config.video.window_capacity,
            stride: config.video.stride,
            fps: config.video.fps,
        },
    })
}

/// Builds the speech → sign video collaborators.
///
/// Loads the Whisper model when that backend is selected, and refuses a
/// Whisper backend that cannot transcribe.
pub fn build_speech_services(config: &Config) -> Result<SpeechServices> {
    let transcriber: Arc<dyn SpeechTranscriber> = match config.backends.transcriber {
        TranscriberBackend::Whisper => {
            let whisper = WhisperTranscriber::new(config.backends.whisper.clone())?;
            if !whisper.is_ready() {
                return Err(RelayError::Transcription {
                    message: "Whisper is not available in this build; set backends.transcriber = \"command\"".to_string(),
                });
            }
            Arc::new(whisper)
        }
        TranscriberBackend::Command => Arc::new(CommandTranscriber::new(
            config.backends.transcriber_command.clone(),
            SystemCommandRunner::new(),
            config.audio.transcriber_sample_rate,
        )),
    };
    info!("Transcriber: {}", transcriber.model_name());

    Ok(SpeechServices {
        transcriber,
        renderer: Arc::new(CommandRenderer::new(
            config.backends.renderer.clone(),
            SystemCommandRunner::new(),
        )),
        settings: SpeechSettings {
            chunk_bytes: config.audio.chunk_bytes,
            inbound: config.audio.inbound,
            transcriber_sample_rate: config.audio.transcriber_sample_rate,
            jpeg_quality: config.output.jpeg_quality,
        },
    })
}

/// Resolves on ctrl-c. If the signal cannot be installed it never resolves.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Runs the relay for `mode` until ctrl-c.
pub async fn run(config: Config, mode: Mode) -> Result<()> {
    config.validate()?;
    let read_size = config.server.read_chunk_bytes;

    let accepted = match mode {
        Mode::Gesture => {
            let services = Arc::new(build_gesture_services(&config)?);
            let connector = TcpRelayConnector::new(&config.relay.host, config.relay.gesture_port);
            let listen = format!("{}:{}", config.server.listen_host, config.server.gesture_port);
            RelayServer::new(listen, connector, move || {
                GestureToSpeech::new(Arc::clone(&services))
            })
            .with_read_size(read_size)
            .run(shutdown_signal())
            .await?
        }
        Mode::Speech => {
            let services = Arc::new(build_speech_services(&config)?);
            let connector = TcpRelayConnector::new(&config.relay.host, config.relay.speech_port);
            let listen = format!("{}:{}", config.server.listen_host, config.server.speech_port);
            RelayServer::new(listen, connector, move || {
                SpeechToSign::new(Arc::clone(&services))
            })
            .with_read_size(read_size)
            .run(shutdown_signal())
            .await?
        }
    };

    info!("Stopped after {} connections", accepted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_endpoints_targets_selected_direction() {
        let endpoints = EndpointArgs {
            listen_host: Some("127.0.0.1".to_string()),
            listen_port: Some(7001),
            relay_host: Some("localhost".to_string()),
            relay_port: Some(7002),
        };

        let config = apply_endpoints(Config::default(), Mode::Gesture, &endpoints);

        assert_eq!(config.server.listen_host, "127.0.0.1");
        assert_eq!(config.server.gesture_port, 7001);
        assert_eq!(config.relay.host, "localhost");
        assert_eq!(config.relay.gesture_port, 7002);
        // The other direction is untouched
        assert_eq!(config.server.speech_port, 9003);
        assert_eq!(config.relay.speech_port, 9004);
    }

    #[test]
    fn test_apply_endpoints_without_overrides_is_identity() {
        let config = apply_endpoints(Config::default(), Mode::Speech, &EndpointArgs::default());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_build_gesture_services_from_config() {
        let mut config = Config::default();
        config.video.stride = 3;
        config.output.post_roll_ms = 400;

        let services = build_gesture_services(&config).unwrap();

        assert_eq!(services.settings.stride, 3);
        assert_eq!(services.packetizer.post_roll().len(), 48_000 * 2 * 2 * 4 / 10);
        assert_eq!(services.classifier.name(), "signrelay-classify");
    }

    #[test]
    fn test_build_speech_services_with_command_transcriber() {
        let mut config = Config::default();
        config.backends.transcriber = TranscriberBackend::Command;

        let services = build_speech_services(&config).unwrap();

        assert_eq!(services.transcriber.model_name(), "signrelay-transcribe");
        assert_eq!(services.settings.chunk_bytes, 192_000);
    }

    #[test]
    fn test_build_speech_services_reports_missing_model() {
        let mut config = Config::default();
        config.backends.transcriber = TranscriberBackend::Whisper;
        config.backends.whisper.model_path = "/nonexistent/ggml-base.bin".into();

        assert!(matches!(
            build_speech_services(&config),
            Err(RelayError::TranscriptionModelNotFound { .. })
        ));
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_build_speech_services_refuses_unavailable_whisper() {
        let dir = tempfile::TempDir::new().unwrap();
        let model_path = dir.path().join("ggml-base.bin");
        std::fs::write(&model_path, b"placeholder").unwrap();

        let mut config = Config::default();
        config.backends.transcriber = TranscriberBackend::Whisper;
        config.backends.whisper.model_path = model_path;

        assert!(matches!(
            build_speech_services(&config),
            Err(RelayError::Transcription { .. })
        ));
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_default_config_builds_working_speech_backend() {
        let services = build_speech_services(&Config::default()).unwrap();
        assert!(services.transcriber.is_ready());
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let mut config = Config::default();
        config.video.window_capacity = 0;
        assert!(matches!(
            run(config, Mode::Gesture).await,
            Err(RelayError::ConfigInvalidValue { .. })
        ));
    }
}
