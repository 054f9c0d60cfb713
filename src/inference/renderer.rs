use crate::error::{Result, RelayError};
use image::{Rgb, RgbImage};
use std::sync::{Arc, Mutex};

/// Trait for text → gloss → pose → video rendering.
pub trait SignRenderer: Send + Sync {
    /// Render `text` as an ordered sequence of sign-language video frames.
    fn render(&self, text: &str) -> Result<Vec<RgbImage>>;

    /// Name of the backing renderer or command
    fn name(&self) -> &str;
}

impl<T: SignRenderer + ?Sized> SignRenderer for Arc<T> {
    fn render(&self, text: &str) -> Result<Vec<RgbImage>> {
        (**self).render(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock renderer for testing
///
/// Renders a fixed number of solid frames per text.
#[derive(Debug)]
pub struct MockRenderer {
    frames: usize,
    width: u32,
    height: u32,
    should_fail: bool,
    texts: Mutex<Vec<String>>,
}

impl MockRenderer {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            width: 32,
            height: 24,
            should_fail: false,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Configure the mock to fail on render
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Texts rendered so far.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl SignRenderer for MockRenderer {
    fn render(&self, text: &str) -> Result<Vec<RgbImage>> {
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(text.to_string());
        }
        if self.should_fail {
            return Err(RelayError::Rendering {
                message: "mock rendering failure".to_string(),
            });
        }
        Ok((0..self.frames)
            .map(|i| {
                let shade = (i * 40 % 256) as u8;
                RgbImage::from_pixel(self.width, self.height, Rgb([shade, 128, 255 - shade]))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mock-renderer"
    }
}
