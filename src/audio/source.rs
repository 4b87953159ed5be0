//! Audio sources for voice searches.
//!
//! A voice session consumes an [`AudioSource`] chunk by chunk until it is
//! exhausted or the user stops recording.  Every chunk is already in the
//! voice format (16 kHz mono `f32`).

use std::path::Path;

use async_trait::async_trait;

use super::resample::to_voice_format;
use super::wav::decode_wav_file;

/// Streaming source of 16 kHz mono audio.
#[async_trait]
pub trait AudioSource: Send {
    /// The next chunk of samples, or `None` once the source is exhausted.
    async fn next_chunk(&mut self) -> Option<Vec<f32>>;

    /// Short human-readable description (device or file name) for logs and
    /// the session record.
    fn describe(&self) -> String;
}

/// 100 ms at 16 kHz.
const CHUNK_SAMPLES: usize = 1_600;

/// Source that replays an in-memory buffer in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct BufferedSource {
    description: String,
    samples: Vec<f32>,
    position: usize,
}

impl BufferedSource {
    /// Wrap samples that are already 16 kHz mono.
    pub fn new(description: impl Into<String>, samples: Vec<f32>) -> Self {
        Self {
            description: description.into(),
            samples,
            position: 0,
        }
    }

    /// Decode a WAV file and convert it to the voice format.
    ///
    /// # Errors
    ///
    /// Returns the `hound` error when the file cannot be decoded.
    pub fn from_wav_file(path: &Path) -> Result<Self, hound::Error> {
        let decoded = decode_wav_file(path)?;
        let samples = to_voice_format(&decoded.samples, decoded.sample_rate, decoded.channels);
        log::debug!(
            "loaded {} ({:.2} s) as voice input",
            path.display(),
            decoded.duration_secs()
        );
        Ok(Self::new(path.display().to_string(), samples))
    }

    /// Samples not yet handed out.
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

#[async_trait]
impl AudioSource for BufferedSource {
    async fn next_chunk(&mut self) -> Option<Vec<f32>> {
        if self.position >= self.samples.len() {
            return None;
        }
        let end = (self.position + CHUNK_SAMPLES).min(self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;
        Some(chunk)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
