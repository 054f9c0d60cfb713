//! JPEG frame demultiplexer for MJPEG-style byte streams.
//!
//! The inbound stream carries JPEG images back to back with no length prefix.
//! Frame boundaries are the start-of-image (`FF D8`) and end-of-image
//! (`FF D9`) markers. Bytes arrive in arbitrary network-sized pieces, so a
//! marker may be split across two reads; only complete frames leave the
//! buffer.

/// JPEG start-of-image marker.
pub const START_MARKER: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker.
pub const END_MARKER: [u8; 2] = [0xFF, 0xD9];

/// Splits a continuous byte stream into marker-delimited JPEG payloads.
#[derive(Debug, Default)]
pub struct JpegDemuxer {
    buffer: Vec<u8>,
    /// Offset where the end-marker search resumes; everything before it has
    /// already been scanned without finding one.
    scan_from: usize,
    frames_extracted: u64,
}

impl JpegDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes received from the network.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extracts the next complete payload, markers included.
    ///
    /// Returns `None` when no complete start/end pair is buffered yet; the
    /// partial bytes stay for the next call.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let start = match find_marker(&self.buffer, START_MARKER, 0) {
            Some(start) => start,
            None => {
                self.discard_garbage();
                return None;
            }
        };

        // Bytes before a start marker can never belong to a frame.
        if start > 0 {
            self.buffer.drain(..start);
            self.scan_from = self.scan_from.saturating_sub(start);
        }

        let search_from = self.scan_from.max(START_MARKER.len());
        match find_marker(&self.buffer, END_MARKER, search_from) {
            Some(end) => {
                let frame_end = end + END_MARKER.len();
                let frame: Vec<u8> = self.buffer.drain(..frame_end).collect();
                self.scan_from = 0;
                self.frames_extracted += 1;
                Some(frame)
            }
            None => {
                // Resume one byte early so a marker split across reads is found.
                self.scan_from = self.buffer.len().saturating_sub(1).max(START_MARKER.len());
                None
            }
        }
    }

    /// Drains every complete payload currently buffered.
    pub fn drain_frames(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Total payloads extracted since creation.
    pub fn frames_extracted(&self) -> u64 {
        self.frames_extracted
    }

    /// Drops bytes that cannot start a frame, keeping a trailing `FF` that
    /// may be the first half of a start marker.
    fn discard_garbage(&mut self) {
        let keep = usize::from(self.buffer.last() == Some(&START_MARKER[0]));
        let drop_len = self.buffer.len() - keep;
        self.buffer.drain(..drop_len);
        self.scan_from = 0;
    }
}

/// Finds `marker` in `haystack` at or after `from`.
fn find_marker(haystack: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(marker.len())
        .position(|window| window == marker)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(body: &[u8]) -> Vec<u8> {
        let mut frame = START_MARKER.to_vec();
        frame.extend_from_slice(body);
        frame.extend_from_slice(&END_MARKER);
        frame
    }

    #[test]
    fn test_extracts_single_frame() {
        let mut demux = JpegDemuxer::new();
        let frame = payload(&[1, 2, 3]);
        demux.push(&frame);

        assert_eq!(demux.next_frame(), Some(frame));
        assert_eq!(demux.next_frame(), None);
        assert_eq!(demux.buffered_len(), 0);
        assert_eq!(demux.frames_extracted(), 1);
    }

    #[test]
    fn test_extracts_frames_between_garbage_in_order() {
        let frames = vec![payload(&[10]), payload(&[20, 21]), payload(&[30, 31, 32])];
        let mut stream = vec![0x00, 0x42, 0xFF];
        for frame in &frames {
            stream.extend_from_slice(frame);
            stream.extend_from_slice(&[0x13, 0x37, 0xD9]);
        }

        let mut demux = JpegDemuxer::new();
        demux.push(&stream);

        assert_eq!(demux.drain_frames(), frames);
    }

    #[test]
    fn test_incomplete_frame_is_retained() {
        let mut demux = JpegDemuxer::new();
        let frame = payload(&[7, 8, 9]);
        demux.push(&frame[..4]);

        assert_eq!(demux.next_frame(), None);
        assert_eq!(demux.buffered_len(), 4);

        demux.push(&frame[4..]);
        assert_eq!(demux.next_frame(), Some(frame));
    }

    #[test]
    fn test_end_marker_split_across_reads() {
        let mut demux = JpegDemuxer::new();
        let frame = payload(&[5, 5, 5]);
        let split = frame.len() - 1;

        demux.push(&frame[..split]);
        assert_eq!(demux.next_frame(), None);

        demux.push(&frame[split..]);
        assert_eq!(demux.next_frame(), Some(frame));
    }

    #[test]
    fn test_start_marker_split_across_reads() {
        let mut demux = JpegDemuxer::new();
        let frame = payload(&[1]);

        demux.push(&[0x00, 0x01, frame[0]]);
        assert_eq!(demux.next_frame(), None);
        assert_eq!(demux.buffered_len(), 1, "trailing FF must be kept");

        demux.push(&frame[1..]);
        assert_eq!(demux.next_frame(), Some(frame));
    }

    #[test]
    fn test_end_marker_before_start_is_ignored() {
        let mut demux = JpegDemuxer::new();
        let frame = payload(&[4, 4]);
        let mut stream = END_MARKER.to_vec();
        stream.extend_from_slice(&frame);
        demux.push(&stream);

        assert_eq!(demux.next_frame(), Some(frame));
    }

    #[test]
    fn test_empty_payload_between_markers() {
        let mut demux = JpegDemuxer::new();
        demux.push(&[0xFF, 0xD8, 0xFF, 0xD9]);

        assert_eq!(demux.next_frame(), Some(vec![0xFF, 0xD8, 0xFF, 0xD9]));
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let frames: Vec<Vec<u8>> = (0u8..6).map(|i| payload(&[i; 17])).collect();
        let mut stream = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            stream.extend(std::iter::repeat_n(0xAB, i));
            stream.extend_from_slice(frame);
        }

        for chunk_size in 1..=stream.len() {
            let mut demux = JpegDemuxer::new();
            let mut extracted = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                demux.push(chunk);
                extracted.extend(demux.drain_frames());
            }
            assert_eq!(extracted, frames, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_garbage_without_start_marker_is_discarded() {
        let mut demux = JpegDemuxer::new();
        demux.push(&[0x01; 1000]);

        assert_eq!(demux.next_frame(), None);
        assert_eq!(demux.buffered_len(), 0);
    }
}
