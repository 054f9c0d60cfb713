use crate::error::{Result, RelayError};
use crate::streaming::frame::Frame;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for gesture classification over a window of frames.
///
/// This trait allows swapping implementations (external model vs mock).
pub trait GestureClassifier: Send + Sync {
    /// Classify an ordered window of frames.
    ///
    /// # Arguments
    /// * `frames` - Window snapshot, oldest first
    /// * `fps` - Frame rate of the source video
    /// * `width`, `height` - Frame dimensions
    ///
    /// # Returns
    /// The predicted label
    fn classify(&self, frames: &[Frame], fps: u32, width: u32, height: u32) -> Result<String>;

    /// Name of the backing model or command
    fn name(&self) -> &str;
}

impl<T: GestureClassifier + ?Sized> GestureClassifier for Arc<T> {
    fn classify(&self, frames: &[Frame], fps: u32, width: u32, height: u32) -> Result<String> {
        (**self).classify(frames, fps, width, height)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// What a [`MockClassifier`] was called with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyCall {
    /// Sequence numbers of the window, oldest first.
    pub sequences: Vec<u64>,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

/// Mock classifier for testing.
///
/// Returns scripted labels in order, then repeats the default label.
#[derive(Debug)]
pub struct MockClassifier {
    script: Mutex<VecDeque<String>>,
    default_label: String,
    should_fail: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<ClassifyCall>>,
}

impl MockClassifier {
    pub fn new(default_label: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_label: default_label.to_string(),
            should_fail: false,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Labels to return before falling back to the default.
    pub fn with_script(self, labels: &[&str]) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(labels.iter().map(|l| l.to_string()));
        }
        self
    }

    /// Configure the mock to fail on classify
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Block the calling thread for `delay` on every call, like a slow model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<ClassifyCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl GestureClassifier for MockClassifier {
    fn classify(&self, frames: &[Frame], fps: u32, width: u32, height: u32) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ClassifyCall {
                sequences: frames.iter().map(|f| f.sequence).collect(),
                fps,
                width,
                height,
            });
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.should_fail {
            return Err(RelayError::Classification {
                message: "mock classification failure".to_string(),
            });
        }
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        Ok(scripted.unwrap_or_else(|| self.default_label.clone()))
    }

    fn name(&self) -> &str {
        "mock-classifier"
    }
}
