//! Frame types for the streaming pipeline.
//!
//! Defines the decoded image that flows from the demultiplexer into the
//! sliding window, plus JPEG decode/encode helpers.

use crate::error::{Result, RelayError};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use std::sync::Arc;

/// Decoded video frame with its arrival position.
///
/// Pixels are shared, so priming the window with many copies of one frame
/// and snapshotting the window are cheap.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Arrival order within the session, starting at 0.
    pub sequence: u64,
    /// RGB pixels.
    pub image: Arc<RgbImage>,
}

impl Frame {
    /// Creates a new frame.
    pub fn new(sequence: u64, image: RgbImage) -> Self {
        Self {
            sequence,
            image: Arc::new(image),
        }
    }

    /// Decodes a JPEG payload into an RGB frame.
    pub fn decode_jpeg(sequence: u64, payload: &[u8]) -> Result<Self> {
        let image = decode_jpeg(payload)?;
        Ok(Self::new(sequence, image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Decodes a JPEG payload into RGB pixels.
pub fn decode_jpeg(payload: &[u8]) -> Result<RgbImage> {
    image::load_from_memory_with_format(payload, ImageFormat::Jpeg)
        .map(|decoded| decoded.to_rgb8())
        .map_err(|e| RelayError::FrameDecode {
            message: e.to_string(),
        })
}

/// Encodes RGB pixels as a baseline JPEG at the given quality (1-100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality)
        .encode_image(image)
        .map_err(|e| RelayError::FrameEncode {
            message: e.to_string(),
        })?;
    Ok(encoded)
}
