//! Video → speech direction.
//!
//! MJPEG in: frames are demultiplexed, decoded and pushed into a primed
//! sliding window. Every `stride` frames the window is classified; a label
//! that differs from the last emitted one is synthesized and written to the
//! relay as padded PCM.

use crate::audio::packetizer::AudioPacketizer;
use crate::defaults;
use crate::error::{RelayError, Result};
use crate::inference::classifier::GestureClassifier;
use crate::inference::synthesizer::SpeechSynthesizer;
use crate::pipeline::direction::Direction;
use crate::relay::connection::RelaySink;
use crate::streaming::debounce::{DebounceGate, GateDecision};
use crate::streaming::demux::JpegDemuxer;
use crate::streaming::frame::Frame;
use crate::streaming::window::SlidingWindow;
use log::{debug, info, warn};
use std::sync::Arc;

/// Window and cadence parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureSettings {
    pub window_capacity: usize,
    pub stride: usize,
    pub fps: u32,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            window_capacity: defaults::WINDOW_CAPACITY,
            stride: defaults::INFERENCE_STRIDE,
            fps: defaults::CLASSIFIER_FPS,
        }
    }
}

/// Collaborators shared by every gesture session, loaded once at startup.
pub struct GestureServices {
    pub classifier: Arc<dyn GestureClassifier>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub packetizer: AudioPacketizer,
    pub settings: GestureSettings,
}

/// Per-session state of the video → speech direction.
pub struct GestureToSpeech {
    services: Arc<GestureServices>,
    demux: JpegDemuxer,
    window: SlidingWindow<Frame>,
    gate: DebounceGate,
    dimensions: Option<(u32, u32)>,
    frames_decoded: u64,
    payloads_dropped: u64,
}

impl GestureToSpeech {
    pub fn new(services: Arc<GestureServices>) -> Self {
        let settings = services.settings;
        Self {
            services,
            demux: JpegDemuxer::new(),
            window: SlidingWindow::new(settings.window_capacity, settings.stride),
            gate: DebounceGate::new(),
            dimensions: None,
            frames_decoded: 0,
            payloads_dropped: 0,
        }
    }

    /// Label most recently let through the debounce gate.
    pub fn last_emitted(&self) -> Option<&str> {
        self.gate.last_emitted()
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn payloads_dropped(&self) -> u64 {
        self.payloads_dropped
    }

    pub fn window(&self) -> &SlidingWindow<Frame> {
        &self.window
    }
}

#[async_trait::async_trait]
impl Direction for GestureToSpeech {
    type Job = Vec<Frame>;
    type Output = String;

    fn name(&self) -> &'static str {
        "gesture"
    }

    fn ingest(&mut self, data: &[u8]) -> Vec<Vec<Frame>> {
        self.demux.push(data);
        let mut jobs = Vec::new();

        while let Some(payload) = self.demux.next_frame() {
            let frame = match Frame::decode_jpeg(self.frames_decoded, &payload) {
                Ok(frame) => frame,
                Err(e) => {
                    self.payloads_dropped += 1;
                    warn!("Dropping {}-byte payload: {}", payload.len(), e);
                    continue;
                }
            };
            self.frames_decoded += 1;

            // The classifier is told the size of the first frame of the session.
            if self.dimensions.is_none() {
                debug!("First frame {}x{}", frame.width(), frame.height());
                self.dimensions = Some((frame.width(), frame.height()));
            }

            self.window.push(frame);
            if self.window.should_infer() {
                jobs.push(self.window.snapshot());
            }
        }

        jobs
    }

    fn has_pending(&self) -> bool {
        self.demux.buffered_len() > 0
    }

    async fn infer(&mut self, frames: Vec<Frame>) -> Result<Option<String>> {
        let (width, height) = self.dimensions.unwrap_or_default();
        let fps = self.services.settings.fps;
        let classifier = Arc::clone(&self.services.classifier);
        let label = tokio::task::spawn_blocking(move || {
            classifier.classify(&frames, fps, width, height)
        })
        .await
        .map_err(|e| RelayError::Classification {
            message: format!("Classifier task panicked: {}", e),
        })??;

        debug!("Last prediction: {:?}", self.gate.last_emitted());
        info!("Prediction: {}", label);

        match self.gate.offer(&label) {
            GateDecision::Suppress => Ok(None),
            GateDecision::Emit(label) => Ok(Some(label)),
        }
    }

    async fn emit(&mut self, label: String, relay: &mut dyn RelaySink) -> Result<()> {
        let report = self
            .services
            .packetizer
            .emit(&label, Arc::clone(&self.services.synthesizer), relay)
            .await?;
        debug!("Emitted {:?}: {} bytes", label, report.total());
        Ok(())
    }
}
