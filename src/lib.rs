//! Text and voice search client for the Houndify service, plus a small
//! clip player.
//!
//! * [`session`]: the single-flight search state machine and its view model.
//! * [`backend`]: the search service seam and its HTTP implementation.
//! * [`context`]: identity, location and request-info metadata.
//! * [`audio`]: microphone capture, WAV files and sample conversion.
//! * [`playback`]: play / pause / stop of a bundled clip.
//! * [`config`]: `settings.toml` and platform paths.

pub mod audio;
pub mod backend;
pub mod config;
pub mod context;
pub mod playback;
pub mod session;
