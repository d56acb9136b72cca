use crate::{CoreError, CoreResult};

use std::{io::Cursor, panic::Location, time::Duration};

use error_location::ErrorLocation;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Decoded PCM audio, interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    /// Samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl Pcm {
    /// Playback length of the samples; zero for a degenerate format.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() / usize::from(self.channels);
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }
}

/// Encode float samples as a 16-bit PCM WAV file.
#[track_caller]
pub fn encode_f32(samples: &[f32], sample_rate: u32, channels: u16) -> CoreResult<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buf = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut buf, spec).map_err(encoding_error)?;
        for &sample in samples {
            let scaled = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer.write_sample(scaled).map_err(encoding_error)?;
        }
        writer.finalize().map_err(encoding_error)?;
    }

    Ok(buf.into_inner())
}

/// Decode a WAV file into float samples.
///
/// Headers with a zero sample rate or channel count are rejected.
#[track_caller]
pub fn decode(bytes: &[u8]) -> CoreResult<Pcm> {
    let mut reader = WavReader::new(Cursor::new(bytes)).map_err(encoding_error)?;
    let spec = reader.spec();
    if spec.sample_rate == 0 || spec.channels == 0 {
        return Err(CoreError::EncodingError {
            reason: format!(
                "unplayable format: {} Hz, {} channels",
                spec.sample_rate, spec.channels
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(encoding_error)?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(encoding_error)?
        }
    };

    Ok(Pcm {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Playback length read from the WAV header.
#[track_caller]
pub fn duration(bytes: &[u8]) -> CoreResult<Duration> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(encoding_error)?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return Err(CoreError::EncodingError {
            reason: "sample rate is zero".to_string(),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok(Duration::from_secs_f64(
        f64::from(reader.duration()) / f64::from(rate),
    ))
}

#[track_caller]
fn encoding_error(e: hound::Error) -> CoreError {
    CoreError::EncodingError {
        reason: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}
