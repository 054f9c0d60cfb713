//! Collaborators backed by external programs.
//!
//! Each call runs the configured program once, feeds it bytes on stdin and
//! reads its answer from stdout. The `CommandRunner` trait enables full
//! testability without the programs installed.

use crate::audio::pcm::PcmAudio;
use crate::audio::wav;
use crate::error::{Result, RelayError};
use crate::inference::classifier::GestureClassifier;
use crate::inference::renderer::SignRenderer;
use crate::inference::synthesizer::SpeechSynthesizer;
use crate::inference::transcriber::SpeechTranscriber;
use crate::streaming::demux::JpegDemuxer;
use crate::streaming::frame::{Frame, decode_jpeg, encode_jpeg};
use image::RgbImage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

/// A program and its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Arguments with `extra` appended.
    fn args_with(&self, extra: &[String]) -> Vec<String> {
        self.args.iter().chain(extra).cloned().collect()
    }
}

/// Trait for running external programs.
///
/// Object-safe, Send + Sync so one runner can serve every session.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, writing `stdin` to it.
    ///
    /// Returns the program's stdout on success.
    fn run(&self, program: &str, args: &[String], stdin: &[u8]) -> Result<Vec<u8>>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<T> {
    fn run(&self, program: &str, args: &[String], stdin: &[u8]) -> Result<Vec<u8>> {
        (**self).run(program, args, stdin)
    }
}

/// Production runner using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String], stdin: &[u8]) -> Result<Vec<u8>> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RelayError::CommandNotFound {
                        program: program.to_string(),
                    }
                } else {
                    RelayError::CommandFailed {
                        message: format!("Failed to execute {}: {}", program, e),
                    }
                }
            })?;

        // Feed stdin from a separate thread so a child that writes before it
        // finishes reading cannot deadlock against us.
        let writer = child.stdin.take().map(|mut pipe| {
            let input = stdin.to_vec();
            std::thread::spawn(move || pipe.write_all(&input))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| RelayError::CommandFailed {
                message: format!("Failed to wait for {}: {}", program, e),
            })?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // The program may legitimately stop reading early.
                Ok(Err(e)) => debug!("{} closed stdin early: {}", program, e),
                Err(_) => warn!("stdin writer for {} panicked", program),
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RelayError::CommandFailed {
                message: format!(
                    "{} failed with status {:?}: {}",
                    program,
                    output.status.code(),
                    stderr.trim()
                ),
            });
        }

        Ok(output.stdout)
    }
}

/// One recorded invocation of a [`MockCommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Vec<u8>,
}

/// Mock runner for testing.
#[derive(Debug, Default)]
pub struct MockCommandRunner {
    stdout: Vec<u8>,
    should_fail: bool,
    invocations: Mutex<Vec<Invocation>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure what every invocation prints.
    pub fn with_stdout(mut self, stdout: impl Into<Vec<u8>>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Configure the mock to fail on run
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|i| i.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for MockCommandRunner {
    fn run(&self, program: &str, args: &[String], stdin: &[u8]) -> Result<Vec<u8>> {
        if let Ok(mut invocations) = self.invocations.lock() {
            invocations.push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
                stdin: stdin.to_vec(),
            });
        }
        if self.should_fail {
            return Err(RelayError::CommandFailed {
                message: format!("{} failed with status Some(1): mock failure", program),
            });
        }
        Ok(self.stdout.clone())
    }
}

fn stdout_text(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout).trim().to_string()
}

/// Classifier that pipes the window as back-to-back JPEGs into a program.
///
/// `--fps`, `--width` and `--height` are appended to the arguments; the
/// trimmed stdout is the label.
pub struct CommandClassifier<R: CommandRunner> {
    spec: CommandSpec,
    runner: R,
    jpeg_quality: u8,
}

impl<R: CommandRunner> CommandClassifier<R> {
    pub fn new(spec: CommandSpec, runner: R, jpeg_quality: u8) -> Self {
        Self {
            spec,
            runner,
            jpeg_quality,
        }
    }
}

impl<R: CommandRunner> GestureClassifier for CommandClassifier<R> {
    fn classify(&self, frames: &[Frame], fps: u32, width: u32, height: u32) -> Result<String> {
        let mut stdin = Vec::new();
        for frame in frames {
            let encoded = encode_jpeg(&frame.image, self.jpeg_quality)
                .map_err(|e| RelayError::Classification {
                    message: e.to_string(),
                })?;
            stdin.extend_from_slice(&encoded);
        }
        let args = self.spec.args_with(&[
            "--fps".to_string(),
            fps.to_string(),
            "--width".to_string(),
            width.to_string(),
            "--height".to_string(),
            height.to_string(),
        ]);
        let stdout = self
            .runner
            .run(&self.spec.program, &args, &stdin)
            .map_err(|e| RelayError::Classification {
                message: e.to_string(),
            })?;
        Ok(stdout_text(&stdout))
    }

    fn name(&self) -> &str {
        &self.spec.program
    }
}

/// Synthesizer that passes the text as the last argument and reads a WAV
/// file from stdout (e.g. `espeak-ng --stdout`).
pub struct CommandSynthesizer<R: CommandRunner> {
    spec: CommandSpec,
    runner: R,
}

impl<R: CommandRunner> CommandSynthesizer<R> {
    pub fn new(spec: CommandSpec, runner: R) -> Self {
        Self { spec, runner }
    }
}

impl<R: CommandRunner> SpeechSynthesizer for CommandSynthesizer<R> {
    fn synthesize(&self, text: &str) -> Result<PcmAudio> {
        let args = self.spec.args_with(&[text.to_string()]);
        let stdout = self
            .runner
            .run(&self.spec.program, &args, &[])
            .map_err(|e| RelayError::Synthesis {
                message: e.to_string(),
            })?;
        wav::read_wav(&stdout).map_err(|e| RelayError::Synthesis {
            message: e.to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.spec.program
    }
}

/// Transcriber that writes a mono WAV on stdin and reads text from stdout.
pub struct CommandTranscriber<R: CommandRunner> {
    spec: CommandSpec,
    runner: R,
    sample_rate: u32,
}

impl<R: CommandRunner> CommandTranscriber<R> {
    pub fn new(spec: CommandSpec, runner: R, sample_rate: u32) -> Self {
        Self {
            spec,
            runner,
            sample_rate,
        }
    }
}

impl<R: CommandRunner> SpeechTranscriber for CommandTranscriber<R> {
    fn transcribe(&self, audio: &[i16]) -> Result<String> {
        let input = wav::write_wav(&PcmAudio::new(audio.to_vec(), self.sample_rate, 1))?;
        let stdout = self
            .runner
            .run(&self.spec.program, &self.spec.args, &input)
            .map_err(|e| RelayError::Transcription {
                message: e.to_string(),
            })?;
        Ok(stdout_text(&stdout))
    }

    fn model_name(&self) -> &str {
        &self.spec.program
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Renderer that passes the text as the last argument and reads an MJPEG
/// stream from stdout.
pub struct CommandRenderer<R: CommandRunner> {
    spec: CommandSpec,
    runner: R,
}

impl<R: CommandRunner> CommandRenderer<R> {
    pub fn new(spec: CommandSpec, runner: R) -> Self {
        Self { spec, runner }
    }
}

impl<R: CommandRunner> SignRenderer for CommandRenderer<R> {
    fn render(&self, text: &str) -> Result<Vec<RgbImage>> {
        let args = self.spec.args_with(&[text.to_string()]);
        let stdout = self
            .runner
            .run(&self.spec.program, &args, &[])
            .map_err(|e| RelayError::Rendering {
                message: e.to_string(),
            })?;

        let mut demux = JpegDemuxer::new();
        demux.push(&stdout);
        let mut frames = Vec::new();
        for payload in demux.drain_frames() {
            match decode_jpeg(&payload) {
                Ok(image) => frames.push(image),
                Err(e) => warn!("{}: dropping undecodable frame: {}", self.spec.program, e),
            }
        }
        Ok(frames)
    }

    fn name(&self) -> &str {
        &self.spec.program
    }
}
