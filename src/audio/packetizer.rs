//! Silence-padded PCM emission toward the relay.
//!
//! Every utterance goes out as: pre-roll silence, the synthesized speech
//! converted to the relay format, post-roll silence. The downstream muxer
//! paces its audio track on this stream, so the padding is what separates
//! consecutive utterances.

use crate::audio::pcm::PcmFormat;
use crate::defaults;
use crate::error::{RelayError, Result};
use crate::inference::synthesizer::SpeechSynthesizer;
use crate::relay::connection::RelaySink;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the packetizer.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketizerConfig {
    /// Relay PCM layout.
    pub format: PcmFormat,
    /// Silence before each utterance.
    pub pre_roll: Duration,
    /// Silence after each utterance.
    pub post_roll: Duration,
}

impl Default for PacketizerConfig {
    fn default() -> Self {
        Self {
            format: PcmFormat::default(),
            pre_roll: Duration::from_millis(defaults::PRE_ROLL_MS),
            post_roll: Duration::from_millis(defaults::POST_ROLL_MS),
        }
    }
}

/// Bytes written by one emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmissionReport {
    pub pre_roll_bytes: usize,
    pub speech_bytes: usize,
    pub post_roll_bytes: usize,
}

impl EmissionReport {
    pub fn total(&self) -> usize {
        self.pre_roll_bytes + self.speech_bytes + self.post_roll_bytes
    }
}

/// Turns text into padded relay PCM.
#[derive(Debug, Clone)]
pub struct AudioPacketizer {
    format: PcmFormat,
    pre_roll: Vec<u8>,
    post_roll: Vec<u8>,
}

impl AudioPacketizer {
    /// Creates a packetizer; fails on a format the relay cannot produce.
    pub fn new(config: PacketizerConfig) -> Result<Self> {
        config.format.validate()?;
        Ok(Self {
            format: config.format,
            pre_roll: config.format.silence(config.pre_roll),
            post_roll: config.format.silence(config.post_roll),
        })
    }

    pub fn format(&self) -> &PcmFormat {
        &self.format
    }

    pub fn pre_roll(&self) -> &[u8] {
        &self.pre_roll
    }

    pub fn post_roll(&self) -> &[u8] {
        &self.post_roll
    }

    /// Vocalizes `text` onto `relay`.
    ///
    /// Synthesis runs on the blocking pool. The first failure (write or
    /// synthesis) abandons the rest of the emission; whatever was already
    /// written stays written.
    pub async fn emit<S>(
        &self,
        text: &str,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        relay: &mut S,
    ) -> Result<EmissionReport>
    where
        S: RelaySink + ?Sized,
    {
        let mut report = EmissionReport::default();

        relay.send(&self.pre_roll).await?;
        report.pre_roll_bytes = self.pre_roll.len();

        let owned = text.to_string();
        let speech = tokio::task::spawn_blocking(move || synthesizer.synthesize(&owned))
            .await
            .map_err(|e| RelayError::Synthesis {
                message: format!("Synthesis task panicked: {}", e),
            })??;
        let pcm = speech.convert(&self.format).to_s16le();
        debug!(
            "Synthesized {:?}: {} samples @ {}Hz x{} -> {} relay bytes",
            text,
            speech.samples.len(),
            speech.sample_rate,
            speech.channels,
            pcm.len()
        );
        if !pcm.is_empty() {
            relay.send(&pcm).await?;
        }
        report.speech_bytes = pcm.len();

        relay.send(&self.post_roll).await?;
        report.post_roll_bytes = self.post_roll.len();

        Ok(report)
    }
}
