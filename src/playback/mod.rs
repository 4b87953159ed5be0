//! Music screen: play, pause and stop one bundled clip.
//!
//! [`PlaybackController`] holds a single [`AudioPlayer`].  Stopping releases
//! that player and asks the [`PlayerFactory`] for a fresh one, so the clip
//! can be played again from the start.
//!
//! [`ClipFactory`] / [`ClipPlayer`] are the `cpal` implementation.

pub mod clip;

pub use clip::{prepare_clip, ClipFactory, ClipPlayer};

use thiserror::Error;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("cannot decode clip: {0}")]
    Decode(#[from] hound::Error),

    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("output sample format {0} is not supported")]
    UnsupportedFormat(String),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("failed to pause output stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),

    #[error("player was stopped and cannot be restarted")]
    Stopped,
}

// ---------------------------------------------------------------------------
// AudioPlayer / PlayerFactory
// ---------------------------------------------------------------------------

/// One playable instance of a clip.
///
/// Not `Send`: output streams are tied to the thread that built them on some
/// platforms.
pub trait AudioPlayer {
    /// Start or resume playback.
    fn start(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self) -> Result<(), PlaybackError>;

    /// Stop for good; a stopped player refuses to start again.
    fn stop(&mut self);
}

pub trait PlayerFactory {
    fn create(&self) -> Result<Box<dyn AudioPlayer>, PlaybackError>;
}

// Compile-time assertion: both traits are object safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioPlayer>, _: Box<dyn PlayerFactory>) {}
};

// ---------------------------------------------------------------------------
// PlaybackController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Fresh player, positioned at the start.
    Ready,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::Ready => "Ready",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }
}

pub struct PlaybackController {
    factory: Box<dyn PlayerFactory>,
    player: Box<dyn AudioPlayer>,
    state: PlaybackState,
}

impl PlaybackController {
    /// Create the controller and its first player.
    pub fn new(factory: Box<dyn PlayerFactory>) -> Result<Self, PlaybackError> {
        let player = factory.create()?;
        Ok(Self {
            factory,
            player,
            state: PlaybackState::Ready,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.player.start()?;
        self.state = PlaybackState::Playing;
        log::debug!("playback: playing");
        Ok(())
    }

    /// Pause if playing; otherwise nothing happens.
    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        self.player.pause()?;
        self.state = PlaybackState::Paused;
        log::debug!("playback: paused");
        Ok(())
    }

    /// Stop and replace the player with a fresh one.
    ///
    /// If the new player cannot be created the error is returned and the
    /// stopped player stays in place, so a later `play` fails with
    /// [`PlaybackError::Stopped`].
    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        self.player.stop();
        self.state = PlaybackState::Ready;
        self.player = self.factory.create()?;
        log::debug!("playback: stopped, new player ready");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct FakePlayer {
        id: usize,
        stopped: bool,
        journal: Journal,
    }

    impl AudioPlayer for FakePlayer {
        fn start(&mut self) -> Result<(), PlaybackError> {
            if self.stopped {
                return Err(PlaybackError::Stopped);
            }
            self.journal.borrow_mut().push(format!("start {}", self.id));
            Ok(())
        }

        fn pause(&mut self) -> Result<(), PlaybackError> {
            self.journal.borrow_mut().push(format!("pause {}", self.id));
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped = true;
            self.journal.borrow_mut().push(format!("stop {}", self.id));
        }
    }

    struct FakeFactory {
        created: RefCell<usize>,
        fail_after: Option<usize>,
        journal: Journal,
    }

    impl FakeFactory {
        fn new(journal: &Journal) -> Self {
            Self {
                created: RefCell::new(0),
                fail_after: None,
                journal: Rc::clone(journal),
            }
        }
    }

    impl PlayerFactory for FakeFactory {
        fn create(&self) -> Result<Box<dyn AudioPlayer>, PlaybackError> {
            let mut created = self.created.borrow_mut();
            if self.fail_after.is_some_and(|limit| *created >= limit) {
                return Err(PlaybackError::NoDevice);
            }
            *created += 1;
            Ok(Box::new(FakePlayer {
                id: *created,
                stopped: false,
                journal: Rc::clone(&self.journal),
            }))
        }
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.borrow().clone()
    }

    #[test]
    fn play_pause_play() {
        let journal = Journal::default();
        let mut c = PlaybackController::new(Box::new(FakeFactory::new(&journal))).unwrap();
        assert_eq!(c.state(), PlaybackState::Ready);

        c.play().unwrap();
        assert_eq!(c.state(), PlaybackState::Playing);
        c.pause().unwrap();
        assert_eq!(c.state(), PlaybackState::Paused);
        c.play().unwrap();

        assert_eq!(entries(&journal), ["start 1", "pause 1", "start 1"]);
    }

    #[test]
    fn pause_when_not_playing_is_ignored() {
        let journal = Journal::default();
        let mut c = PlaybackController::new(Box::new(FakeFactory::new(&journal))).unwrap();
        c.pause().unwrap();
        assert_eq!(c.state(), PlaybackState::Ready);
        assert!(entries(&journal).is_empty());
    }

    #[test]
    fn stop_replaces_player_so_replay_works() {
        let journal = Journal::default();
        let mut c = PlaybackController::new(Box::new(FakeFactory::new(&journal))).unwrap();

        c.play().unwrap();
        c.stop().unwrap();
        assert_eq!(c.state(), PlaybackState::Ready);
        c.play().unwrap();

        assert_eq!(entries(&journal), ["start 1", "stop 1", "start 2"]);
    }

    #[test]
    fn failed_recreate_leaves_stopped_player() {
        let journal = Journal::default();
        let factory = FakeFactory {
            fail_after: Some(1),
            ..FakeFactory::new(&journal)
        };
        let mut c = PlaybackController::new(Box::new(factory)).unwrap();

        c.play().unwrap();
        assert!(matches!(c.stop(), Err(PlaybackError::NoDevice)));
        assert!(matches!(c.play(), Err(PlaybackError::Stopped)));
        assert_eq!(c.state(), PlaybackState::Ready);
    }
}
