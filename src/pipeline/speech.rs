//! Speech → sign video direction.
//!
//! Raw PCM in: audio is accumulated into fixed-size chunks, each chunk is
//! transcribed, the text is rendered as sign-language frames, and the frames
//! are written to the relay as back-to-back JPEGs.

use crate::audio::pcm::{PcmFormat, prepare_for_transcription};
use crate::defaults;
use crate::error::{RelayError, Result};
use crate::inference::renderer::SignRenderer;
use crate::inference::transcriber::SpeechTranscriber;
use crate::pipeline::direction::Direction;
use crate::relay::connection::RelaySink;
use crate::streaming::accumulator::ChunkAccumulator;
use crate::streaming::frame::encode_jpeg;
use image::RgbImage;
use log::{debug, info, warn};
use std::sync::Arc;

/// Drops non-speech annotations such as `[Musica]`, `(ride)` or `*applausi*`
/// and collapses whitespace. An unmatched opener is kept as text.
fn clean_transcription(text: &str) -> String {
    let mut kept = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(['[', '(', '*']) {
        kept.push_str(&rest[..pos]);
        let closer = match rest.as_bytes()[pos] {
            b'[' => ']',
            b'(' => ')',
            _ => '*',
        };
        let inner = &rest[pos + 1..];
        match inner.find(closer) {
            Some(end) => rest = &inner[end + 1..],
            None => {
                kept.push_str(&rest[pos..]);
                rest = "";
            }
        }
    }
    kept.push_str(rest);
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Chunking and encoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechSettings {
    /// Bytes per transcription chunk.
    pub chunk_bytes: usize,
    /// Layout of the inbound audio.
    pub inbound: PcmFormat,
    /// Sample rate the transcriber expects (mono).
    pub transcriber_sample_rate: u32,
    /// JPEG quality of frames sent to the relay.
    pub jpeg_quality: u8,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            chunk_bytes: defaults::AUDIO_CHUNK_BYTES,
            inbound: PcmFormat::new(
                defaults::INBOUND_SAMPLE_RATE,
                defaults::INBOUND_CHANNELS,
                2,
            ),
            transcriber_sample_rate: defaults::TRANSCRIBER_SAMPLE_RATE,
            jpeg_quality: defaults::JPEG_QUALITY,
        }
    }
}

/// Collaborators shared by every speech session, loaded once at startup.
pub struct SpeechServices {
    pub transcriber: Arc<dyn SpeechTranscriber>,
    pub renderer: Arc<dyn SignRenderer>,
    pub settings: SpeechSettings,
}

/// Per-session state of the speech → sign video direction.
pub struct SpeechToSign {
    services: Arc<SpeechServices>,
    accumulator: ChunkAccumulator,
    frames_sent: u64,
}

impl SpeechToSign {
    pub fn new(services: Arc<SpeechServices>) -> Self {
        let chunk_bytes = services.settings.chunk_bytes;
        Self {
            services,
            accumulator: ChunkAccumulator::new(chunk_bytes),
            frames_sent: 0,
        }
    }

    pub fn accumulator(&self) -> &ChunkAccumulator {
        &self.accumulator
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}

#[async_trait::async_trait]
impl Direction for SpeechToSign {
    type Job = Vec<u8>;
    type Output = Vec<RgbImage>;

    fn name(&self) -> &'static str {
        "speech"
    }

    fn ingest(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.accumulator.append(data);
        self.accumulator.drain_chunks()
    }

    fn has_pending(&self) -> bool {
        !self.accumulator.is_empty()
    }

    async fn infer(&mut self, chunk: Vec<u8>) -> Result<Option<Vec<RgbImage>>> {
        let settings = self.services.settings;
        let transcriber = Arc::clone(&self.services.transcriber);
        let raw = tokio::task::spawn_blocking(move || {
            let audio = prepare_for_transcription(
                &chunk,
                &settings.inbound,
                settings.transcriber_sample_rate,
            );
            transcriber.transcribe(&audio)
        })
        .await
        .map_err(|e| RelayError::Transcription {
            message: format!("Transcription task panicked: {}", e),
        })??;
        let text = clean_transcription(&raw);
        info!("Transcribed text: {:?}", text);

        if text.is_empty() {
            return Ok(None);
        }

        let renderer = Arc::clone(&self.services.renderer);
        let rendered = text.clone();
        let frames = tokio::task::spawn_blocking(move || renderer.render(&rendered))
            .await
            .map_err(|e| RelayError::Rendering {
                message: format!("Renderer task panicked: {}", e),
            })??;
        debug!("Rendered {} frames for {:?}", frames.len(), text);
        if frames.is_empty() {
            return Ok(None);
        }
        Ok(Some(frames))
    }

    async fn emit(&mut self, frames: Vec<RgbImage>, relay: &mut dyn RelaySink) -> Result<()> {
        let quality = self.services.settings.jpeg_quality;
        for frame in &frames {
            let jpeg = match encode_jpeg(frame, quality) {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    warn!("Skipping frame: {}", e);
                    continue;
                }
            };
            relay.send(&jpeg).await?;
            self.frames_sent += 1;
        }
        Ok(())
    }
}
