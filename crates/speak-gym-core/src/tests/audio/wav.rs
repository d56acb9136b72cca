use crate::{
    CoreError,
    audio::{Clip, wav},
    tests::support::zero_rate_wav,
};

use std::time::Duration;

/// WHAT: Encoded samples decode back within 16-bit quantisation error
/// WHY: Captured PCM must reach the transcriber intact
#[test]
fn given_float_samples_when_encoding_then_decoded_samples_match() {
    // Given: A short ramp in stereo
    let samples: Vec<f32> = (0..200).map(|i| (i as f32 / 100.0) - 1.0).collect();

    // When: Encoding then decoding
    let bytes = wav::encode_f32(&samples, 22_050, 2).unwrap();
    let pcm = wav::decode(&bytes).unwrap();

    // Then: Format preserved and samples close
    assert_eq!(pcm.sample_rate, 22_050);
    assert_eq!(pcm.channels, 2);
    assert_eq!(pcm.samples.len(), samples.len());
    for (a, b) in samples.iter().zip(&pcm.samples) {
        assert!((a - b).abs() < 1e-3);
    }
}

/// WHAT: Out-of-range samples are clamped instead of wrapping
/// WHY: Wrapped samples produce loud clicks
#[test]
fn given_samples_beyond_full_scale_when_encoding_then_clamped() {
    // Given: Samples past +-1.0
    let samples = [2.0, -3.0];

    // When: Round-tripping
    let pcm = wav::decode(&wav::encode_f32(&samples, 8_000, 1).unwrap()).unwrap();

    // Then: Held at full scale with the sign kept
    assert!(pcm.samples[0] > 0.99);
    assert!(pcm.samples[1] < -0.99);
}

/// WHAT: Garbage bytes are rejected as an encoding error
/// WHY: A corrupt synth reply must fail playback, not panic
#[test]
fn given_non_wav_bytes_when_decoding_then_encoding_error() {
    // Given: Bytes without a RIFF header
    let bytes = b"definitely not audio";

    // When: Decoding
    let result = wav::decode(bytes);

    // Then: EncodingError
    assert!(matches!(result, Err(CoreError::EncodingError { .. })));
}

/// WHAT: Only WAV clips report a duration
/// WHY: Container formats cannot be measured without a demuxer
#[test]
fn given_clips_of_different_types_when_asking_duration_then_only_wav_answers() {
    // Given: Half a second of WAV and an opaque webm clip
    let wav_clip = Clip::wav(wav::encode_f32(&vec![0.0; 4_000], 8_000, 1).unwrap());
    let webm_clip = Clip::new(vec![1, 2, 3], "audio/webm;codecs=opus");

    // When / Then
    assert_eq!(wav_clip.duration().unwrap().as_millis(), 500);
    assert_eq!(webm_clip.duration(), None);
    assert_eq!(webm_clip.file_name(), "recording.webm");
}

/// WHAT: A header claiming 0 Hz is rejected instead of decoded
/// WHY: Playback length divides by the sample rate
#[test]
fn given_zero_sample_rate_when_decoding_then_encoding_error() {
    // Given: A stereo WAV with a zero sample rate
    let clip = zero_rate_wav();

    // When
    let result = wav::decode(clip.bytes());

    // Then: Rejected, and neither length helper panics
    assert!(matches!(result, Err(CoreError::EncodingError { .. })));
    assert_eq!(clip.duration(), None);
    let degenerate = wav::Pcm {
        samples: vec![0.0; 4],
        sample_rate: 0,
        channels: 2,
    };
    assert_eq!(degenerate.duration(), Duration::ZERO);
}

/// WHAT: Decoded length counts frames, not interleaved samples
/// WHY: Stereo clips would otherwise wait twice as long
#[test]
fn given_stereo_pcm_when_measuring_then_frames_counted() {
    // Given: 8000 stereo frames at 8 kHz
    let bytes = wav::encode_f32(&vec![0.0; 16_000], 8_000, 2).unwrap();

    // When
    let pcm = wav::decode(&bytes).unwrap();

    // Then
    assert_eq!(pcm.duration(), Duration::from_secs(1));
}
