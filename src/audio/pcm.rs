//! Raw PCM formats and conversions.
//!
//! Everything on the wire is interleaved signed 16-bit little-endian PCM.
//! Conversions here cover what the two relay directions need: silence
//! blocks, channel mapping, linear resampling and byte (de)serialization.

use crate::defaults;
use crate::error::{Result, RelayError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interleaved integer PCM layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: defaults::RELAY_SAMPLE_RATE,
            channels: defaults::RELAY_CHANNELS,
            bytes_per_sample: defaults::RELAY_BYTES_PER_SAMPLE,
        }
    }
}

impl PcmFormat {
    pub const fn new(sample_rate: u32, channels: u16, bytes_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bytes_per_sample,
        }
    }

    /// Bytes per interleaved frame (one sample for every channel).
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bytes_per_sample)
    }

    /// Bytes per second of audio.
    pub fn byte_rate(&self) -> u64 {
        u64::from(self.sample_rate) * self.frame_size() as u64
    }

    /// Byte length of `duration` of audio, whole frames only.
    ///
    /// `sample_rate × channels × bytes_per_sample × seconds` for durations
    /// that land on a frame boundary.
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let frames = u128::from(self.sample_rate) * duration.as_nanos() / 1_000_000_000;
        frames as usize * self.frame_size()
    }

    /// A block of digital silence lasting `duration`.
    pub fn silence(&self, duration: Duration) -> Vec<u8> {
        vec![0u8; self.bytes_for(duration)]
    }

    /// Rejects layouts the relay cannot produce.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(RelayError::AudioFormat {
                message: "sample rate must be positive".to_string(),
            });
        }
        if self.channels == 0 {
            return Err(RelayError::AudioFormat {
                message: "channel count must be positive".to_string(),
            });
        }
        if self.bytes_per_sample != 2 {
            return Err(RelayError::AudioFormat {
                message: format!(
                    "only 16-bit samples are supported, got {} bytes per sample",
                    self.bytes_per_sample
                ),
            });
        }
        Ok(())
    }
}

/// Decoded PCM samples with their layout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PcmAudio {
    /// Interleaved samples.
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmAudio {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Parses interleaved s16le bytes.
    pub fn from_s16le(bytes: &[u8], sample_rate: u32, channels: u16) -> Self {
        Self::new(decode_s16le(bytes), sample_rate, channels)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Converts to `format`: channel mapping first, then resampling.
    pub fn convert(&self, format: &PcmFormat) -> PcmAudio {
        let mapped = map_channels(&self.samples, self.channels, format.channels);
        let resampled = resample_interleaved(
            &mapped,
            usize::from(format.channels),
            self.sample_rate,
            format.sample_rate,
        );
        PcmAudio::new(resampled, format.sample_rate, format.channels)
    }

    /// Serializes to interleaved s16le bytes.
    pub fn to_s16le(&self) -> Vec<u8> {
        encode_s16le(&self.samples)
    }
}

/// Decodes little-endian 16-bit samples; a trailing odd byte is ignored.
pub fn decode_s16le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encodes samples as little-endian 16-bit bytes.
pub fn encode_s16le(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Averages interleaved frames down to one channel.
///
/// An incomplete trailing frame is ignored.
pub fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Maps interleaved audio from `from` channels to `to` channels.
///
/// Mono is duplicated onto every output channel; other mismatches go
/// through mono.
pub fn map_channels(samples: &[i16], from: u16, to: u16) -> Vec<i16> {
    if from == to {
        return samples.to_vec();
    }
    let mono = downmix_to_mono(samples, from);
    if to <= 1 {
        return mono;
    }
    mono.iter()
        .flat_map(|&s| std::iter::repeat_n(s, usize::from(to)))
        .collect()
}

/// Simple linear interpolation resampling of mono audio.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

/// Resamples interleaved audio channel by channel.
pub fn resample_interleaved(
    samples: &[i16],
    channels: usize,
    from_rate: u32,
    to_rate: u32,
) -> Vec<i16> {
    if channels <= 1 {
        return resample(samples, from_rate, to_rate);
    }
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let planes: Vec<Vec<i16>> = (0..channels)
        .map(|ch| {
            let plane: Vec<i16> = samples
                .chunks_exact(channels)
                .map(|frame| frame[ch])
                .collect();
            resample(&plane, from_rate, to_rate)
        })
        .collect();

    let frames = planes.first().map_or(0, Vec::len);
    (0..frames)
        .flat_map(|i| planes.iter().map(move |plane| plane[i]))
        .collect()
}

/// Converts a raw inbound audio chunk to mono at `target_rate`.
///
/// This is the transcriber's input: interleaved s16le at `source` layout in,
/// mono samples out.
pub fn prepare_for_transcription(chunk: &[u8], source: &PcmFormat, target_rate: u32) -> Vec<i16> {
    let interleaved = decode_s16le(chunk);
    let mono = downmix_to_mono(&interleaved, source.channels);
    resample(&mono, source.sample_rate, target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_is_relay_format() {
        let format = PcmFormat::default();
        assert_eq!(format.sample_rate, 48_000);
        assert_eq!(format.channels, 2);
        assert_eq!(format.bytes_per_sample, 2);
        assert_eq!(format.frame_size(), 4);
        assert_eq!(format.byte_rate(), 192_000);
    }

    #[test]
    fn test_silence_lengths_match_formula() {
        let format = PcmFormat::default();
        for ms in [100u64, 200, 400, 1000] {
            let expected = 48_000 * 2 * 2 * ms as usize / 1000;
            assert_eq!(format.silence(Duration::from_millis(ms)).len(), expected);
        }
        assert_eq!(format.silence(Duration::from_millis(100)).len(), 19_200);
        assert_eq!(format.silence(Duration::from_millis(200)).len(), 38_400);
    }

    #[test]
    fn test_silence_is_zeroed() {
        let silence = PcmFormat::new(16_000, 1, 2).silence(Duration::from_millis(10));
        assert_eq!(silence.len(), 320);
        assert!(silence.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bytes_for_rounds_down_to_whole_frames() {
        let format = PcmFormat::new(44_100, 2, 2);
        let bytes = format.bytes_for(Duration::from_millis(1));
        assert_eq!(bytes % format.frame_size(), 0);
        assert_eq!(bytes, 44 * 4);
    }

    #[test]
    fn test_validate_rejects_unsupported_width() {
        assert!(PcmFormat::default().validate().is_ok());
        assert!(PcmFormat::new(48_000, 2, 3).validate().is_err());
        assert!(PcmFormat::new(0, 2, 2).validate().is_err());
        assert!(PcmFormat::new(48_000, 0, 2).validate().is_err());
    }

    #[test]
    fn test_s16le_roundtrip_ignores_odd_byte() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN];
        let mut bytes = encode_s16le(&samples);
        assert_eq!(bytes[2..4], [0x01, 0x00]);
        bytes.push(0x7F);
        assert_eq!(decode_s16le(&bytes), samples);
    }

    #[test]
    fn test_downmix_averages_frames() {
        let stereo = vec![100i16, 200, 300, 400, 500, 600, 7];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![150, 350, 550]);
    }

    #[test]
    fn test_map_mono_to_stereo_duplicates() {
        assert_eq!(map_channels(&[1, 2, 3], 1, 2), vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_map_stereo_to_mono() {
        assert_eq!(map_channels(&[10, 20, 30, 50], 2, 1), vec![15, 40]);
    }

    #[test]
    fn test_resample_48k_to_16k_length() {
        let input = vec![500i16; 48_000];
        let output = resample(&input, 48_000, 16_000);
        assert_eq!(output.len(), 16_000);
        assert!(output.iter().all(|&s| s == 500));
    }

    #[test]
    fn test_resample_upsamples_with_interpolation() {
        let output = resample(&[0, 100], 1, 2);
        assert_eq!(output, vec![0, 50, 100, 100]);
    }

    #[test]
    fn test_resample_interleaved_keeps_channels_apart() {
        let stereo: Vec<i16> = (0..100).flat_map(|_| [1000i16, -1000]).collect();
        let output = resample_interleaved(&stereo, 2, 24_000, 48_000);
        assert_eq!(output.len(), 400);
        for frame in output.chunks_exact(2) {
            assert_eq!(frame, [1000, -1000]);
        }
    }

    #[test]
    fn test_convert_mono_24k_to_relay_format() {
        let audio = PcmAudio::new(vec![42; 2400], 24_000, 1);
        let converted = audio.convert(&PcmFormat::default());
        assert_eq!(converted.sample_rate, 48_000);
        assert_eq!(converted.channels, 2);
        assert_eq!(converted.samples.len(), 4800 * 2);
        assert_eq!(converted.to_s16le().len(), 4800 * 4);
    }

    #[test]
    fn test_prepare_for_transcription_one_second_chunk() {
        let format = PcmFormat::new(48_000, 2, 2);
        let chunk = encode_s16le(&vec![100i16; 96_000]);
        assert_eq!(chunk.len(), 192_000);

        let mono = prepare_for_transcription(&chunk, &format, 16_000);
        assert_eq!(mono.len(), 16_000);
        assert!(mono.iter().all(|&s| s == 100));
    }
}
