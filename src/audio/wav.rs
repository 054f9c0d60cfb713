//! WAV encoding for the command backends.
//!
//! Speech engines print WAV on stdout and speech recognizers usually read
//! it, so the command adapters exchange audio as in-memory WAV files.

use crate::audio::pcm::PcmAudio;
use crate::error::{Result, RelayError};
use std::io::Cursor;

/// Parses an in-memory WAV file into interleaved 16-bit samples.
///
/// Streaming writers (e.g. `espeak-ng --stdout`) put a placeholder length in
/// the header, so running out of data early ends the audio instead of
/// failing.
pub fn read_wav(bytes: &[u8]) -> Result<PcmAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| {
        RelayError::AudioFormat {
            message: format!("Failed to parse WAV data: {}", e),
        }
    })?;

    let spec = reader.spec();
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => collect_until_eof(reader.samples::<i16>())?,
        (hound::SampleFormat::Float, 32) => collect_until_eof(reader.samples::<f32>())?
            .into_iter()
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect(),
        (format, bits) => {
            return Err(RelayError::AudioFormat {
                message: format!("Unsupported WAV sample format: {:?} {}-bit", format, bits),
            });
        }
    };

    Ok(PcmAudio::new(samples, spec.sample_rate, spec.channels))
}

fn collect_until_eof<T, I>(samples: I) -> Result<Vec<T>>
where
    I: Iterator<Item = hound::Result<T>>,
{
    let mut collected = Vec::new();
    for sample in samples {
        match sample {
            Ok(sample) => collected.push(sample),
            Err(hound::Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                return Err(RelayError::AudioFormat {
                    message: format!("Failed to read WAV samples: {}", e),
                });
            }
        }
    }
    Ok(collected)
}

/// Serializes audio as a 16-bit PCM WAV file.
pub fn write_wav(audio: &PcmAudio) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let to_error = |e: hound::Error| RelayError::AudioFormat {
        message: format!("Failed to write WAV data: {}", e),
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(to_error)?;
    for &sample in &audio.samples {
        writer.write_sample(sample).map_err(to_error)?;
    }
    writer.finalize().map_err(to_error)?;
    Ok(cursor.into_inner())
}
