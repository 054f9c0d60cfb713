//! Per-connection session loop.
//!
//! A session reads the inbound stream until the peer closes it, hands every
//! read to its [`Direction`], and writes whatever the direction produces to
//! the relay. All collaborator and relay failures are absorbed here: they
//! are logged and counted, and the loop keeps reading.

use crate::defaults;
use crate::error::RelayError;
use crate::pipeline::direction::Direction;
use crate::relay::connection::RelaySink;
use log::{error, info, trace, warn};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Where the session loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for inbound bytes with nothing buffered toward a job.
    Idle,
    /// Bytes are buffered but no job is ready yet.
    Accumulating,
    /// A collaborator is running for a ready job.
    Inferring,
    /// An inference result is being written to the relay.
    Emitting,
    /// The inbound stream has ended.
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Accumulating => "accumulating",
            SessionPhase::Inferring => "inferring",
            SessionPhase::Emitting => "emitting",
            SessionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the session loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Zero-length read.
    PeerClosed,
    /// The inbound socket failed.
    ReadFailed(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::PeerClosed => f.write_str("peer closed"),
            SessionEnd::ReadFailed(message) => write!(f, "read failed: {}", message),
        }
    }
}

/// Counters for one finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub bytes_read: u64,
    pub jobs: u64,
    pub emissions: u64,
    pub failed_emissions: u64,
    pub failed_inferences: u64,
    pub end: SessionEnd,
}

impl Default for SessionReport {
    fn default() -> Self {
        Self {
            bytes_read: 0,
            jobs: 0,
            emissions: 0,
            failed_emissions: 0,
            failed_inferences: 0,
            end: SessionEnd::PeerClosed,
        }
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes in, {} jobs, {} emissions ({} failed), {} failed inferences, {}",
            self.bytes_read,
            self.jobs,
            self.emissions,
            self.failed_emissions,
            self.failed_inferences,
            self.end
        )
    }
}

/// One inbound connection's worth of state.
pub struct Session<D: Direction> {
    direction: D,
    phase: SessionPhase,
    read_size: usize,
    report: SessionReport,
}

impl<D: Direction> Session<D> {
    pub fn new(direction: D) -> Self {
        Self {
            direction,
            phase: SessionPhase::Idle,
            read_size: defaults::READ_CHUNK_BYTES,
            report: SessionReport::default(),
        }
    }

    /// Maximum bytes taken from the socket per read.
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn direction(&self) -> &D {
        &self.direction
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    fn transition(&mut self, next: SessionPhase) {
        if self.phase != next {
            trace!("[{}] {} -> {}", self.direction.name(), self.phase, next);
            self.phase = next;
        }
    }

    fn log_failure(&self, what: &str, err: &RelayError) {
        if err.is_recoverable() {
            warn!("[{}] {}: {}", self.direction.name(), what, err);
        } else {
            error!("[{}] {}: {}", self.direction.name(), what, err);
        }
    }

    /// Runs until the inbound stream ends or fails.
    ///
    /// Never returns an error: the caller closes both sockets afterwards
    /// whatever happened inside.
    pub async fn run<R>(&mut self, inbound: &mut R, relay: &mut dyn RelaySink) -> SessionReport
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let mut buf = vec![0u8; self.read_size];
        let end = loop {
            match inbound.read(&mut buf).await {
                Ok(0) => break SessionEnd::PeerClosed,
                Ok(n) => self.handle_bytes(&buf[..n], relay).await,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let err = RelayError::InboundRead {
                        message: e.to_string(),
                    };
                    warn!("[{}] {}", self.direction.name(), err);
                    break SessionEnd::ReadFailed(e.to_string());
                }
            }
        };

        self.transition(SessionPhase::Closed);
        self.report.end = end;
        info!("[{}] Session ended: {}", self.direction.name(), self.report);
        self.report.clone()
    }

    /// Feeds one inbound read through the direction.
    pub async fn handle_bytes(&mut self, data: &[u8], relay: &mut dyn RelaySink) {
        self.report.bytes_read += data.len() as u64;

        let jobs = self.direction.ingest(data);
        if jobs.is_empty() {
            if self.direction.has_pending() {
                self.transition(SessionPhase::Accumulating);
            } else {
                self.transition(SessionPhase::Idle);
            }
            return;
        }

        for job in jobs {
            self.report.jobs += 1;
            self.transition(SessionPhase::Inferring);

            let output = match self.direction.infer(job).await {
                Ok(Some(output)) => output,
                Ok(None) => continue,
                Err(e) => {
                    self.report.failed_inferences += 1;
                    self.log_failure("Inference failed", &e);
                    continue;
                }
            };

            self.transition(SessionPhase::Emitting);
            match self.direction.emit(output, relay).await {
                Ok(()) => self.report.emissions += 1,
                Err(e) => {
                    self.report.failed_emissions += 1;
                    self.log_failure("Emission failed", &e);
                }
            }
        }

        self.transition(SessionPhase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::packetizer::{AudioPacketizer, PacketizerConfig};
    use crate::inference::classifier::MockClassifier;
    use crate::inference::renderer::MockRenderer;
    use crate::inference::synthesizer::MockSynthesizer;
    use crate::inference::transcriber::MockTranscriber;
    use crate::pipeline::gesture::{GestureServices, GestureSettings, GestureToSpeech};
    use crate::pipeline::speech::{SpeechServices, SpeechSettings, SpeechToSign};
    use crate::relay::connection::MemoryRelay;
    use crate::streaming::frame::encode_jpeg;
    use image::{Rgb, RgbImage};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    fn mjpeg(frames: usize) -> Vec<u8> {
        let jpeg =
            encode_jpeg(&RgbImage::from_pixel(16, 16, Rgb([10, 200, 40])), 80).unwrap();
        jpeg.repeat(frames)
    }

    fn gesture(classifier: Arc<MockClassifier>) -> GestureToSpeech {
        GestureToSpeech::new(Arc::new(GestureServices {
            classifier,
            synthesizer: Arc::new(MockSynthesizer::new()),
            packetizer: AudioPacketizer::new(PacketizerConfig::default()).unwrap(),
            settings: GestureSettings::default(),
        }))
    }

    /// Reader that yields its data and then fails.
    struct FailingReader {
        data: Vec<u8>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.data.is_empty() {
                return Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                )));
            }
            let n = self.data.len().min(buf.remaining());
            let chunk: Vec<u8> = self.data.drain(..n).collect();
            buf.put_slice(&chunk);
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_held_gesture_emits_once() {
        let classifier = Arc::new(MockClassifier::new("ciao"));
        let mut session = Session::new(gesture(Arc::clone(&classifier)));
        let mut relay = MemoryRelay::new();
        let stream = mjpeg(37);

        let report = session.run(&mut stream.as_slice(), &mut relay).await;

        assert_eq!(classifier.calls().len(), 7);
        assert!(classifier.calls().iter().all(|c| c.sequences.len() == 37));
        assert_eq!(report.jobs, 7);
        assert_eq!(report.emissions, 1);
        assert_eq!(report.bytes_read, stream.len() as u64);
        assert_eq!(report.end, SessionEnd::PeerClosed);
        assert_eq!(relay.log().lock().unwrap().writes.len(), 3);
        assert_eq!(session.phase(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_two_chunk_burst_flushes_twice() {
        let transcriber = Arc::new(MockTranscriber::new("m").with_response(""));
        let direction = SpeechToSign::new(Arc::new(SpeechServices {
            transcriber: transcriber.clone(),
            renderer: Arc::new(MockRenderer::new(2)),
            settings: SpeechSettings::default(),
        }));
        let mut session = Session::new(direction).with_read_size(2 * 192_000);
        let mut relay = MemoryRelay::new();
        let burst = vec![0u8; 2 * 192_000];

        let report = session.run(&mut burst.as_slice(), &mut relay).await;

        assert_eq!(report.jobs, 2);
        assert_eq!(transcriber.received().len(), 2);
        assert!(session.direction().accumulator().is_empty());
        assert!(relay.log().lock().unwrap().writes.is_empty());
    }

    #[tokio::test]
    async fn test_relay_reset_mid_emission_keeps_session_alive() {
        let classifier = Arc::new(MockClassifier::new("bye").with_script(&["hi"]));
        let mut session = Session::new(gesture(Arc::clone(&classifier)));
        // Write 1 is the speech of the first emission
        let mut relay = MemoryRelay::new().with_failing_writes(vec![1]);
        let stream = mjpeg(10);

        let report = session.run(&mut stream.as_slice(), &mut relay).await;

        assert_eq!(report.failed_emissions, 1);
        assert_eq!(report.emissions, 1);
        assert_eq!(report.bytes_read, stream.len() as u64);
        assert_eq!(session.direction().last_emitted(), Some("bye"));
        // pre-roll of "hi", then the full "bye" emission
        assert_eq!(relay.log().lock().unwrap().writes.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_emission_is_not_retried() {
        let classifier = Arc::new(MockClassifier::new("hi"));
        let mut session = Session::new(gesture(classifier));
        let mut relay = MemoryRelay::new().with_failing_writes(vec![0]);

        let report = session.run(&mut mjpeg(20).as_slice(), &mut relay).await;

        assert_eq!(report.jobs, 4);
        assert_eq!(report.failed_emissions, 1);
        assert_eq!(report.emissions, 0);
        assert_eq!(session.direction().last_emitted(), Some("hi"));
    }

    #[tokio::test]
    async fn test_inference_failures_are_counted() {
        let classifier = Arc::new(MockClassifier::new("x").with_failure());
        let mut session = Session::new(gesture(classifier));
        let mut relay = MemoryRelay::new();

        let report = session.run(&mut mjpeg(10).as_slice(), &mut relay).await;

        assert_eq!(report.failed_inferences, 2);
        assert_eq!(report.end, SessionEnd::PeerClosed);
    }

    #[tokio::test]
    async fn test_read_failure_ends_session() {
        let classifier = Arc::new(MockClassifier::new("x"));
        let mut session = Session::new(gesture(classifier));
        let mut relay = MemoryRelay::new();
        let mut reader = FailingReader { data: mjpeg(2) };

        let report = session.run(&mut reader, &mut relay).await;

        assert!(matches!(report.end, SessionEnd::ReadFailed(_)));
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert_eq!(session.direction().frames_decoded(), 2);
    }

    #[tokio::test]
    async fn test_partial_frame_leaves_session_accumulating() {
        let classifier = Arc::new(MockClassifier::new("x"));
        let mut session = Session::new(gesture(classifier));
        let mut relay = MemoryRelay::new();
        let stream = mjpeg(1);

        session.handle_bytes(&stream[..stream.len() / 2], &mut relay).await;
        assert_eq!(session.phase(), SessionPhase::Accumulating);
        assert_eq!(session.report().bytes_read, (stream.len() / 2) as u64);
    }

    #[tokio::test]
    async fn test_discarded_garbage_leaves_session_idle() {
        let classifier = Arc::new(MockClassifier::new("x"));
        let mut session = Session::new(gesture(classifier));
        let mut relay = MemoryRelay::new();

        session.handle_bytes(&[0x00, 0x42, 0x13, 0x37], &mut relay).await;
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.report().bytes_read, 4);
    }

    #[test]
    fn test_report_display() {
        let report = SessionReport {
            bytes_read: 10,
            jobs: 2,
            emissions: 1,
            failed_emissions: 1,
            failed_inferences: 0,
            end: SessionEnd::ReadFailed("reset".to_string()),
        };
        assert_eq!(
            report.to_string(),
            "10 bytes in, 2 jobs, 1 emissions (1 failed), 0 failed inferences, read failed: reset"
        );
    }
}
