//! WAV fast path: 16 kHz mono 16-bit PCM read directly with `hound`.

use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::types::SAMPLE_RATE;

/// Why a file did not qualify for the fast path. Always recovered by falling
/// back to the external decoder.
#[derive(Debug, thiserror::Error)]
pub(crate) enum WavValidationError {
    #[error("unreadable WAV: {0}")]
    Read(#[from] hound::Error),
    #[error("expected mono, found {0} channels")]
    Channels(u16),
    #[error("expected 16-bit integer samples, found {bits}-bit {format:?}")]
    SampleFormat { bits: u16, format: SampleFormat },
    #[error("expected 16000 Hz, found {0} Hz")]
    SampleRate(u32),
}

/// Whether `path` has a `.wav` extension, in any case.
pub(crate) fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Load a conforming WAV file as `f32` samples scaled by `1/32768`.
pub(crate) fn read_wav_mono16(path: &Path) -> Result<Vec<f32>, WavValidationError> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(WavValidationError::Channels(spec.channels));
    }
    if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(WavValidationError::SampleFormat {
            bits: spec.bits_per_sample,
            format: spec.sample_format,
        });
    }
    if spec.sample_rate != SAMPLE_RATE {
        return Err(WavValidationError::SampleRate(spec.sample_rate));
    }

    let samples = reader
        .into_samples::<i16>()
        .map(|s| s.map(|v| f32::from(v) / 32768.0))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(samples)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use hound::{SampleFormat, WavSpec, WavWriter};

    /// Write a 16-bit integer WAV with the given layout.
    pub(crate) fn write_wav_i16(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// Write a 32-bit float mono WAV.
    pub(crate) fn write_wav_f32(path: &Path, sample_rate: u32, samples: &[f32]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn conforming_wav_is_scaled() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.wav");
        write_wav_i16(&path, 1, 16_000, &[0, 16_384, -32_768, 32_767]);

        let samples = read_wav_mono16(&path).unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[1], 0.5);
        assert_eq!(samples[2], -1.0);
        assert!((samples[3] - 32_767.0 / 32_768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn stereo_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stereo.wav");
        write_wav_i16(&path, 2, 16_000, &[1, 2, 3, 4]);
        assert!(matches!(
            read_wav_mono16(&path),
            Err(WavValidationError::Channels(2))
        ));
    }

    #[test]
    fn wrong_rate_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cd.wav");
        write_wav_i16(&path, 1, 44_100, &[1, 2]);
        assert!(matches!(
            read_wav_mono16(&path),
            Err(WavValidationError::SampleRate(44_100))
        ));
    }

    #[test]
    fn float_samples_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("float.wav");
        write_wav_f32(&path, 16_000, &[0.1, 0.2]);
        let err = read_wav_mono16(&path).unwrap_err();
        assert!(matches!(err, WavValidationError::SampleFormat { bits: 32, .. }));
        assert!(err.to_string().contains("32-bit Float"));
    }

    #[test]
    fn corrupt_or_missing_files_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("junk.wav");
        std::fs::write(&path, b"not a riff header").unwrap();
        assert!(matches!(read_wav_mono16(&path), Err(WavValidationError::Read(_))));
        assert!(matches!(
            read_wav_mono16(&tmp.path().join("missing.wav")),
            Err(WavValidationError::Read(_))
        ));
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(has_wav_extension(Path::new("a.wav")));
        assert!(has_wav_extension(Path::new("/x/B.WAV")));
        assert!(!has_wav_extension(Path::new("b.mp4")));
        assert!(!has_wav_extension(Path::new("wav")));
    }
}
