//! `cpal` playback of a decoded WAV clip.
//!
//! The clip is decoded once by [`ClipFactory`].  Each [`ClipPlayer`] converts
//! it to the default output device's rate and channel count and feeds it from
//! an output stream that is paused until [`AudioPlayer::start`].

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};

use crate::audio::{decode_wav_file, downmix_to_mono, resample, upmix, DecodedAudio};

use super::{AudioPlayer, PlaybackError, PlayerFactory};

// ---------------------------------------------------------------------------
// ClipFactory
// ---------------------------------------------------------------------------

pub struct ClipFactory {
    audio: Arc<DecodedAudio>,
}

impl ClipFactory {
    /// Decode the clip at `path`.
    pub fn open(path: &Path) -> Result<Self, PlaybackError> {
        let audio = decode_wav_file(path)?;
        log::info!(
            "loaded {} ({:.1} s, {} Hz, {} ch)",
            path.display(),
            audio.duration_secs(),
            audio.sample_rate,
            audio.channels
        );
        Ok(Self::from_audio(audio))
    }

    pub fn from_audio(audio: DecodedAudio) -> Self {
        Self {
            audio: Arc::new(audio),
        }
    }

    pub fn duration_secs(&self) -> f32 {
        self.audio.duration_secs()
    }
}

impl PlayerFactory for ClipFactory {
    fn create(&self) -> Result<Box<dyn AudioPlayer>, PlaybackError> {
        Ok(Box::new(ClipPlayer::new(&self.audio)?))
    }
}

// ---------------------------------------------------------------------------
// ClipPlayer
// ---------------------------------------------------------------------------

pub struct ClipPlayer {
    stream: cpal::Stream,
    position: Arc<AtomicUsize>,
    len: usize,
    stopped: bool,
}

impl ClipPlayer {
    /// Build a paused output stream for `audio` on the default device.
    ///
    /// # Errors
    ///
    /// Fails when there is no output device, the device's default sample
    /// format is not `f32`, `i16` or `u16`, or the stream cannot be built.
    pub fn new(audio: &DecodedAudio) -> Result<Self, PlaybackError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
        let supported = device.default_output_config()?;

        let format = supported.sample_format();
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let samples = Arc::new(prepare_clip(audio, sample_rate, channels));
        let len = samples.len();
        let position = Arc::new(AtomicUsize::new(0));

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, &position)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, &position)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, &position)?,
            other => return Err(PlaybackError::UnsupportedFormat(format!("{other:?}"))),
        };
        // Some hosts start streams on creation.
        stream.pause()?;

        log::debug!("output stream ready: {sample_rate} Hz, {channels} ch, {format:?}");
        Ok(Self {
            stream,
            position,
            len,
            stopped: false,
        })
    }

    /// `true` once every sample has been handed to the device.
    pub fn is_finished(&self) -> bool {
        self.position.load(Ordering::Relaxed) >= self.len
    }
}

impl AudioPlayer for ClipPlayer {
    fn start(&mut self) -> Result<(), PlaybackError> {
        if self.stopped {
            return Err(PlaybackError::Stopped);
        }
        if self.is_finished() {
            self.position.store(0, Ordering::Relaxed);
        }
        self.stream.play()?;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.stopped {
            return Err(PlaybackError::Stopped);
        }
        self.stream.pause()?;
        Ok(())
    }

    fn stop(&mut self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("could not pause output stream on stop: {e}");
        }
        self.stopped = true;
    }
}

// ---------------------------------------------------------------------------
// Sample plumbing
// ---------------------------------------------------------------------------

/// Convert a decoded clip to interleaved samples for an output device.
///
/// ```
/// use houndify_sample::audio::DecodedAudio;
/// use houndify_sample::playback::prepare_clip;
///
/// let clip = DecodedAudio { samples: vec![0.5; 100], sample_rate: 16_000, channels: 1 };
/// let out = prepare_clip(&clip, 16_000, 2);
/// assert_eq!(out.len(), 200);
/// ```
pub fn prepare_clip(audio: &DecodedAudio, sample_rate: u32, channels: u16) -> Vec<f32> {
    let mono = downmix_to_mono(&audio.samples, audio.channels);
    let resampled = resample(&mono, audio.sample_rate, sample_rate);
    upmix(&resampled, channels)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Vec<f32>>,
    position: &Arc<AtomicUsize>,
) -> Result<cpal::Stream, PlaybackError>
where
    T: SizedSample + FromSample<f32>,
{
    let position = Arc::clone(position);
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            fill(data, &samples, &position);
        },
        |err: cpal::StreamError| {
            log::error!("cpal output stream error: {err}");
        },
        None,
    )?;
    Ok(stream)
}

/// Copy the next samples into `out` in the device's sample type, padding
/// with silence past the end.
fn fill<T>(out: &mut [T], samples: &[f32], position: &AtomicUsize)
where
    T: SizedSample + FromSample<f32>,
{
    let start = position.load(Ordering::Relaxed).min(samples.len());
    let n = out.len().min(samples.len() - start);
    for (dst, &src) in out[..n].iter_mut().zip(&samples[start..start + n]) {
        *dst = T::from_sample(src);
    }
    out[n..].fill(T::EQUILIBRIUM);
    position.store(start + n, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_copies_then_pads_with_silence() {
        let samples = [0.1, 0.2, 0.3, 0.4, 0.5];
        let position = AtomicUsize::new(0);

        let mut out = [1.0f32; 3];
        fill(&mut out, &samples, &position);
        assert_eq!(out, [0.1, 0.2, 0.3]);
        assert_eq!(position.load(Ordering::Relaxed), 3);

        fill(&mut out, &samples, &position);
        assert_eq!(out, [0.4, 0.5, 0.0]);
        assert_eq!(position.load(Ordering::Relaxed), 5);

        fill(&mut out, &samples, &position);
        assert_eq!(out, [0.0; 3]);
        assert_eq!(position.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn fill_converts_for_integer_devices() {
        let samples = [0.5, -0.5];

        let position = AtomicUsize::new(0);
        let mut out = [1i16; 3];
        fill(&mut out, &samples, &position);
        assert_eq!(out, [16_384, -16_384, 0]);

        let position = AtomicUsize::new(0);
        let mut out = [1u16; 3];
        fill(&mut out, &samples, &position);
        assert_eq!(out, [49_152, 16_384, 32_768]);
        assert_eq!(position.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn prepare_clip_downmixes_and_resamples() {
        let clip = DecodedAudio {
            samples: [0.2, 0.4].repeat(8_000),
            sample_rate: 8_000,
            channels: 2,
        };
        let out = prepare_clip(&clip, 16_000, 1);
        assert_eq!(out.len(), 16_000);
        assert!(out.iter().all(|s| (s - 0.3).abs() < 1e-5));
    }

    #[test]
    fn factory_reports_clip_duration() {
        let factory = ClipFactory::from_audio(DecodedAudio {
            samples: vec![0.0; 32_000],
            sample_rate: 16_000,
            channels: 1,
        });
        assert!((factory.duration_secs() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn open_missing_file_is_decode_error() {
        let result = ClipFactory::open(Path::new("/nonexistent/sound.wav"));
        assert!(matches!(result, Err(PlaybackError::Decode(_))));
    }
}
