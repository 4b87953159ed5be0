//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + installation identity):
//!   Windows: %APPDATA%\houndify-sample\
//!   macOS:   ~/Library/Application Support/houndify-sample/
//!   Linux:   ~/.config/houndify-sample/
//!
//! Data dir (bundled audio clip):
//!   Windows: %LOCALAPPDATA%\houndify-sample\
//!   macOS:   ~/Library/Application Support/houndify-sample/
//!   Linux:   ~/.local/share/houndify-sample/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `user-id`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to the file holding the stable per-installation user id.
    pub user_id_file: PathBuf,
    /// Default location of the clip played by the music screen.
    pub sound_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "houndify-sample";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let user_id_file = config_dir.join("user-id");
        let sound_file = data_dir.join("sound.wav");

        Self {
            config_dir,
            settings_file,
            user_id_file,
            sound_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
