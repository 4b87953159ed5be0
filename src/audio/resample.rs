//! Sample-rate and channel conversion.
//!
//! Voice uploads are **16 kHz mono `f32`**; the music clip is converted to
//! whatever the output device asks for.  Both go through the same two steps:
//!
//! 1. [`downmix_to_mono`]: average interleaved channels into one.
//! 2. [`resample`]: linear interpolation from one rate to another.
//!
//! [`upmix`] duplicates a mono signal across output channels.

/// Sample rate of every chunk an [`AudioSource`](super::AudioSource) yields.
pub const VOICE_SAMPLE_RATE: u32 = 16_000;

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// * `channels == 1` returns the input unchanged.
/// * `channels == 0` returns an empty vector.
///
/// ```rust
/// use houndify_sample::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Interleave a mono signal into `channels` identical channels.
pub fn upmix(mono: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return mono.to_vec();
    }
    mono.iter()
        .flat_map(|&s| std::iter::repeat(s).take(channels))
        .collect()
}

/// Resample mono `samples` from `source_rate` to `target_rate` Hz using
/// linear interpolation.
///
/// Equal rates and empty input are returned unchanged.  The output length is
/// `ceil(samples.len() * target_rate / source_rate)`.
///
/// ```rust
/// use houndify_sample::audio::resample;
///
/// let hi = vec![0.5_f32; 480];
/// let lo = resample(&hi, 48_000, 16_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || source_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

/// Convert interleaved audio at any rate into the 16 kHz mono voice format.
pub fn to_voice_format(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<f32> {
    let mono = downmix_to_mono(samples, channels);
    resample(&mono, sample_rate, VOICE_SAMPLE_RATE)
}
