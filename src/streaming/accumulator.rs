//! Fixed-threshold audio chunk accumulator.
//!
//! Inbound PCM is buffered until `threshold` bytes are available, then handed
//! out as exactly-`threshold`-byte chunks. Bytes beyond the last full chunk
//! stay buffered for the next one.

/// Byte buffer that flushes in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct ChunkAccumulator {
    buffer: Vec<u8>,
    threshold: usize,
    flushed: u64,
}

impl ChunkAccumulator {
    /// Creates an accumulator; `threshold` is clamped to at least 1.
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            buffer: Vec::with_capacity(threshold),
            threshold,
            flushed: 0,
        }
    }

    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.threshold
    }

    /// Takes the next full chunk, if any.
    pub fn take_chunk(&mut self) -> Option<Vec<u8>> {
        if !self.is_full() {
            return None;
        }
        let rest = self.buffer.split_off(self.threshold);
        let chunk = std::mem::replace(&mut self.buffer, rest);
        self.flushed += 1;
        Some(chunk)
    }

    /// Takes every full chunk currently buffered.
    pub fn drain_chunks(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.take_chunk()).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Chunks handed out since creation.
    pub fn flushed(&self) -> u64 {
        self.flushed
    }
}
