//! WAV decoding and encoding via `hound`.

use std::io::{Cursor, Read};
use std::path::Path;

use super::resample::VOICE_SAMPLE_RATE;

/// Decoded PCM audio.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }
}

/// Decode a WAV file from disk.
///
/// # Errors
///
/// Returns the `hound` error when the file is missing or not a valid WAV.
pub fn decode_wav_file(path: &Path) -> Result<DecodedAudio, hound::Error> {
    let reader = hound::WavReader::open(path)?;
    decode(reader)
}

/// Decode WAV bytes from any reader.
pub fn decode_wav<R: Read>(input: R) -> Result<DecodedAudio, hound::Error> {
    decode(hound::WavReader::new(input)?)
}

fn decode<R: Read>(mut reader: hound::WavReader<R>) -> Result<DecodedAudio, hound::Error> {
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Encode 16 kHz mono `f32` samples as a 16-bit PCM WAV byte buffer.
///
/// Samples outside `[-1.0, 1.0]` are clipped.
pub fn encode_voice_wav(samples: &[f32]) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: VOICE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_voice_wav_decodes_with_voice_spec() {
        let samples = vec![0.0_f32, 0.5, -0.5, 1.0];
        let bytes = encode_voice_wav(&samples).expect("encode");

        let decoded = decode_wav(Cursor::new(bytes)).expect("decode");
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), 4);
        assert!((decoded.samples[1] - 0.5).abs() < 1e-3);
        assert!((decoded.samples[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn out_of_range_samples_are_clipped() {
        let bytes = encode_voice_wav(&[3.0, -3.0]).expect("encode");
        let decoded = decode_wav(Cursor::new(bytes)).expect("decode");
        assert!(decoded.samples[0] <= 1.0 && decoded.samples[0] > 0.99);
        assert!(decoded.samples[1] >= -1.0 && decoded.samples[1] < -0.99);
    }

    #[test]
    fn decode_file_reads_stereo_float() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("clip.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).expect("create");
        for _ in 0..441 {
            writer.write_sample(0.25_f32).expect("left");
            writer.write_sample(-0.25_f32).expect("right");
        }
        writer.finalize().expect("finalize");

        let decoded = decode_wav_file(&path).expect("decode");
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.samples.len(), 882);
        assert!((decoded.duration_secs() - 0.01).abs() < 1e-4);
    }

    #[test]
    fn decode_missing_file_errors() {
        assert!(decode_wav_file(Path::new("/nonexistent/clip.wav")).is_err());
    }
}
