//! Audio plumbing: voice input sources, WAV codec, format conversion.
//!
//! # Voice input
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (std mpsc) → to_voice_format
//!           → tokio mpsc → MicrophoneSource::next_chunk
//! WAV file   → hound decode → to_voice_format → BufferedSource::next_chunk
//! ```
//!
//! Both sources implement [`AudioSource`]; the search backend pulls chunks
//! until the source ends or recording is stopped, then uploads the result
//! encoded with [`encode_voice_wav`].

pub mod capture;
pub mod resample;
pub mod source;
pub mod wav;

pub use capture::{AudioCapture, AudioChunk, CaptureError, MicrophoneSource, StreamHandle};
pub use resample::{downmix_to_mono, resample, to_voice_format, upmix, VOICE_SAMPLE_RATE};
pub use source::{AudioSource, BufferedSource};
pub use wav::{decode_wav, decode_wav_file, encode_voice_wav, DecodedAudio};
