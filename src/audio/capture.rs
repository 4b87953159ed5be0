//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.
//! [`MicrophoneSource`] runs it on a dedicated OS thread (cpal streams are
//! not `Send` on every platform) and forwards voice-format chunks to the
//! async side over a tokio channel.  Dropping the source stops the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc as tokio_mpsc;

use super::resample::to_voice_format;
use super::source::AudioSource;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("capture thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Default input device wrapper.
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Open the system default input device with its preferred config.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] when no input device is available,
    /// or [`CaptureError::DefaultConfig`] when the device cannot report a
    /// default stream configuration.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Start recording and send [`AudioChunk`]s to `tx`.
    ///
    /// Send errors (receiver dropped) are ignored so the audio thread never
    /// panics.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal input stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// MicrophoneSource
// ---------------------------------------------------------------------------

/// [`AudioSource`] backed by the default microphone.
pub struct MicrophoneSource {
    rx: tokio_mpsc::UnboundedReceiver<Vec<f32>>,
    stop: Arc<AtomicBool>,
    description: String,
}

impl MicrophoneSource {
    /// Open the microphone on a dedicated `mic-capture` thread.
    ///
    /// Returns once the stream is running, or with the error that prevented
    /// it from starting.
    pub fn start() -> Result<Self, CaptureError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<String, CaptureError>>();
        let (chunk_tx, chunk_rx) = tokio_mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let capture = match AudioCapture::new() {
                    Ok(capture) => capture,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let (raw_tx, raw_rx) = mpsc::channel::<AudioChunk>();
                let _handle = match capture.start(raw_tx) {
                    Ok(handle) => handle,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let description = format!(
                    "microphone ({} Hz, {} ch)",
                    capture.sample_rate(),
                    capture.channels()
                );
                let _ = ready_tx.send(Ok(description));

                while !thread_stop.load(Ordering::Acquire) {
                    match raw_rx.recv_timeout(Duration::from_millis(50)) {
                        Ok(chunk) => {
                            let voice =
                                to_voice_format(&chunk.samples, chunk.sample_rate, chunk.channels);
                            if chunk_tx.send(voice).is_err() {
                                break;
                            }
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("microphone capture stopped");
            })
            .map_err(|e| CaptureError::Thread(e.to_string()))?;

        let description = ready_rx
            .recv()
            .map_err(|_| CaptureError::Thread("capture thread exited during setup".into()))??;
        log::info!("recording from {description}");

        Ok(Self {
            rx: chunk_rx,
            stop,
            description,
        })
    }
}

#[async_trait]
impl AudioSource for MicrophoneSource {
    async fn next_chunk(&mut self) -> Option<Vec<f32>> {
        self.rx.recv().await
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}
