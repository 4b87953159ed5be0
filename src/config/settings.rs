//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::AppPaths;
use crate::session::SearchMode;

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Connection settings for the remote search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the search API (no trailing slash).
    pub base_url: String,
    /// Client id issued by the service console.
    ///
    /// The matching client key is only needed for request signing, which
    /// the service SDK does, so it is not part of this file.
    pub client_id: String,
    /// Maximum seconds to wait for a search response.
    pub timeout_secs: u64,
    /// Voice recordings are cut off after this many seconds of audio.
    pub max_recording_secs: u64,
    /// Verbose request/response logging.
    pub debug: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.houndify.com".into(),
            client_id: String::new(),
            timeout_secs: 30,
            max_recording_secs: 60,
            debug: false,
        }
    }
}

// ---------------------------------------------------------------------------
// SearchConfig
// ---------------------------------------------------------------------------

/// Defaults for the text and voice search screens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Query pre-filled into the text search input.
    pub default_query: String,
    /// IETF language tag of the spoken input for voice searches.
    pub input_language: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_query: "What is the weather".into(),
            input_language: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LocationConfig
// ---------------------------------------------------------------------------

/// Stand-in for the platform location service.
///
/// `enabled` plays the role of the location permission; the fix fields play
/// the role of the last-known position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Whether attaching the position to requests is permitted.
    pub enabled: bool,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Horizontal accuracy radius in metres.
    pub accuracy_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// VoiceResponseConfig
// ---------------------------------------------------------------------------

/// Spoken-response (TTS) settings attached to voice requests as extra fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceResponseConfig {
    /// Attach the fields below to voice requests.
    pub enabled: bool,
    /// Voice name from the service's voice collection.
    pub voice: String,
    /// `"Short"` or `"Long"` spoken response.
    pub short_or_long: String,
    pub speed: u32,
    pub volume: u32,
    pub pitch: u32,
    /// Audio encodings the client accepts for the spoken response.
    pub accepted_encodings: Vec<String>,
}

impl Default for VoiceResponseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            voice: "Laura".into(),
            short_or_long: "Short".into(),
            speed: 100,
            volume: 100,
            pitch: 100,
            accepted_encodings: vec!["WAV".into(), "Speex".into()],
        }
    }
}

impl VoiceResponseConfig {
    /// Request-info extra fields for this configuration.
    ///
    /// Returns an empty map when disabled.
    pub fn extra_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if !self.enabled {
            return fields;
        }
        fields.insert("ResponseAudioVoice".into(), json!(self.voice));
        fields.insert("ResponseAudioShortOrLong".into(), json!(self.short_or_long));
        fields.insert(
            "AcapelaVoiceParameters".into(),
            json!({
                "Speed": self.speed,
                "Volume": self.volume,
                "Pitch": self.pitch,
            }),
        );
        fields.insert(
            "ResponseAudioAcceptedEncodings".into(),
            json!(self.accepted_encodings),
        );
        fields
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Music screen settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// WAV clip to play.  `None` means [`AppPaths::sound_file`].
    pub sound_file: Option<PathBuf>,
}

impl PlaybackConfig {
    /// The clip path, falling back to the platform data directory.
    pub fn resolved_sound_file(&self) -> PathBuf {
        self.sound_file
            .clone()
            .unwrap_or_else(|| AppPaths::new().sound_file)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use houndify_sample::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// println!("{}", config.backend.base_url);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Search service connection.
    pub backend: BackendConfig,
    /// Text / voice search defaults.
    pub search: SearchConfig,
    /// Location permission and fix.
    pub location: LocationConfig,
    /// Spoken-response extras for voice requests.
    pub voice_response: VoiceResponseConfig,
    /// Music screen.
    pub playback: PlaybackConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Request-info extra fields for searches of `mode`.
    ///
    /// Text searches carry none.  Voice searches carry the spoken input
    /// language and, when enabled, the voice-response fields.
    pub fn request_extras(&self, mode: SearchMode) -> Map<String, Value> {
        match mode {
            SearchMode::Text => Map::new(),
            SearchMode::Voice => {
                let mut extras = self.voice_response.extra_fields();
                extras.insert(
                    "InputLanguageIETFTag".into(),
                    json!(self.search.input_language),
                );
                extras
            }
        }
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
