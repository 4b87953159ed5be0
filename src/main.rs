//! Application entry point: Houndify search sample.
//!
//! # Startup sequence
//!
//! 1. Parse the command line.
//! 2. Initialise logging.
//! 3. Load [`AppConfig`] (defaults on first run) and apply CLI overrides.
//! 4. Run the chosen screen:
//!    * `text`:  one query, or an interactive prompt without one;
//!    * `voice`: microphone (Enter stops listening) or a WAV file;
//!    * `music`: play / pause / stop the bundled clip from stdin commands;
//!    * `init-config`: write a default `settings.toml`.
//!
//! The search screens run on a tokio runtime (multi-thread, 2 workers); the
//! music screen stays on the main thread because output streams are not
//! `Send` everywhere.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use houndify_sample::{
    audio::{AudioSource, BufferedSource, MicrophoneSource},
    backend::{HttpBackend, SearchBackend, SearchQuery},
    config::{AppConfig, AppPaths},
    context::{
        ConfiguredLocation, IdentityProvider, InstallationIdentity, LocationProvider, NoLocation,
    },
    playback::{ClipFactory, PlaybackController},
    session::{
        lock_view, SearchCommand, SearchController, SearchMode, SearchView, SessionState,
        SharedView,
    },
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Houndify text / voice search sample
#[derive(Parser)]
#[command(name = "houndify-sample", version, about)]
struct Cli {
    /// Settings file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Client id issued by the Houndify dashboard
    #[arg(long, env = "HOUNDIFY_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// Search service base URL
    #[arg(long, env = "HOUNDIFY_BASE_URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Text search; prompts for queries when none is given
    Text {
        /// Query to submit
        query: Option<String>,
    },
    /// Voice search from the microphone or a WAV file
    Voice {
        /// Send this WAV file instead of recording
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Play the bundled clip (commands on stdin: play, pause, stop, quit)
    Music {
        /// Clip to play instead of the configured one
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Write a settings file with default values
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("houndify-sample starting up");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings_file = cli
        .config
        .clone()
        .unwrap_or_else(|| AppPaths::new().settings_file);

    if let Command::InitConfig { force } = cli.command {
        return init_config(&settings_file, force);
    }

    let config = load_config(&cli, &settings_file);

    match cli.command {
        Command::Text { query } => runtime()?.block_on(text_screen(&config, query)),
        Command::Voice { file } => runtime()?.block_on(voice_screen(&config, file)),
        Command::Music { file } => music_screen(&config, file),
        Command::InitConfig { .. } => Ok(()),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn load_config(cli: &Cli, settings_file: &Path) -> AppConfig {
    let mut config = AppConfig::load_from(settings_file).unwrap_or_else(|e| {
        log::warn!(
            "Failed to load config from {} ({e}); using defaults",
            settings_file.display()
        );
        AppConfig::default()
    });

    if let Some(client_id) = &cli.client_id {
        config.backend.client_id = client_id.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.backend.base_url = base_url.clone();
    }
    config
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    AppConfig::default().save_to(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Search services
// ---------------------------------------------------------------------------

/// Collaborators shared by both search screens.
struct Services {
    backend: Arc<dyn SearchBackend>,
    identity: Arc<dyn IdentityProvider>,
    location: Arc<dyn LocationProvider>,
    config: AppConfig,
}

impl Services {
    fn from_config(config: &AppConfig) -> Self {
        let user_id_file = AppPaths::new().user_id_file;
        let identity = InstallationIdentity::load_or_create(&user_id_file).unwrap_or_else(|e| {
            log::warn!("{e}; using a temporary user id for this run");
            InstallationIdentity::ephemeral(uuid::Uuid::new_v4().to_string())
        });

        let location: Arc<dyn LocationProvider> = if config.location.enabled {
            Arc::new(ConfiguredLocation::new(config.location.clone()))
        } else {
            Arc::new(NoLocation)
        };

        Self {
            backend: Arc::new(HttpBackend::from_config(&config.backend)),
            identity: Arc::new(identity),
            location,
            config: config.clone(),
        }
    }

    fn controller(&self, mode: SearchMode) -> SearchController {
        SearchController::new(
            mode,
            Arc::clone(&self.backend),
            Arc::clone(&self.identity),
            Arc::clone(&self.location),
        )
        .with_extras(self.config.request_extras(mode))
    }
}

// ---------------------------------------------------------------------------
// Screens
// ---------------------------------------------------------------------------

async fn text_screen(config: &AppConfig, query: Option<String>) -> Result<()> {
    let services = Services::from_config(config);
    let controller = services.controller(SearchMode::Text);

    match query {
        Some(query) => one_shot(controller, SearchQuery::text(query)).await,
        None => prompt(controller, config.search.default_query.clone()).await,
    }
}

async fn voice_screen(config: &AppConfig, file: Option<PathBuf>) -> Result<()> {
    let source: Box<dyn AudioSource> = match file {
        Some(path) => Box::new(
            BufferedSource::from_wav_file(&path)
                .with_context(|| format!("cannot read {}", path.display()))?,
        ),
        None => {
            let mic = MicrophoneSource::start().context("microphone unavailable")?;
            eprintln!("Speak now; press Enter to stop listening.");
            Box::new(mic)
        }
    };

    let services = Services::from_config(config);
    one_shot(services.controller(SearchMode::Voice), SearchQuery::Voice(source)).await
}

/// Run a single search to completion.
///
/// Enter works the screen's button; Ctrl-C aborts.
async fn one_shot(mut controller: SearchController, query: SearchQuery) -> Result<()> {
    let mut printer = ViewPrinter::new(controller.view());
    let mut lines = stdin_lines();
    let mut interrupted = false;

    controller.start_search(query);
    printer.refresh();

    while !controller.is_settled() {
        tokio::select! {
            _ = controller.pump() => {}
            Some(_) = lines.recv() => {
                if !controller.stop_recording() {
                    controller.abort();
                }
            }
            result = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = result {
                    log::warn!("cannot listen for Ctrl-C: {e}");
                }
                interrupted = true;
                controller.shutdown();
            }
        }
        printer.refresh();
    }

    match controller.last_session() {
        Some(session) if session.state() == SessionState::Failed => bail!("search failed"),
        _ => Ok(()),
    }
}

/// Interactive text screen.
///
/// An empty line presses the search button with `default_query`; any other
/// line starts a search with that text.  `quit` or end of input exits.
async fn prompt(controller: SearchController, default_query: String) -> Result<()> {
    let mut printer = ViewPrinter::new(controller.view());
    let (command_tx, command_rx) = mpsc::channel::<SearchCommand>(16);

    eprintln!("Type a query, or press Enter for \"{default_query}\". `quit` exits.");
    spawn_prompt_reader(command_tx.clone(), default_query);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = command_tx.send(SearchCommand::Shutdown).await;
        }
    });

    let task = tokio::spawn(controller.run(command_rx));
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    while !task.is_finished() {
        ticker.tick().await;
        printer.refresh();
    }
    task.await.context("search controller task failed")?;
    printer.refresh();
    Ok(())
}

fn music_screen(config: &AppConfig, file: Option<PathBuf>) -> Result<()> {
    let path = file.unwrap_or_else(|| config.playback.resolved_sound_file());
    let factory =
        ClipFactory::open(&path).with_context(|| format!("cannot load {}", path.display()))?;
    let mut player = PlaybackController::new(Box::new(factory))?;

    eprintln!("Commands: play, pause, stop, quit");
    for line in std::io::stdin().lock().lines() {
        let line = line.context("cannot read stdin")?;
        let result = match line.trim() {
            "play" => player.play(),
            "pause" => player.pause(),
            "stop" => player.stop(),
            "quit" | "exit" => break,
            "" => continue,
            other => {
                eprintln!("unknown command: {other}");
                continue;
            }
        };
        match result {
            Ok(()) => eprintln!("[{}]", player.state().label()),
            Err(e) => log::error!("playback: {e}"),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Terminal plumbing
// ---------------------------------------------------------------------------

/// Prints the parts of a [`SearchView`] that changed since the last refresh:
/// status lines to stderr, content to stdout.
struct ViewPrinter {
    view: SharedView,
    shown: Option<SearchView>,
}

impl ViewPrinter {
    fn new(view: SharedView) -> Self {
        Self { view, shown: None }
    }

    fn refresh(&mut self) {
        let current = lock_view(&self.view).clone();
        let previous = self.shown.as_ref();

        if previous.map(|v| &v.status) != Some(&current.status) && !current.status.is_empty() {
            eprintln!("[{}] {}", current.button_label, current.status);
        }
        if previous.map(|v| &v.content) != Some(&current.content) && !current.content.is_empty() {
            println!("{}", current.content);
        }
        self.shown = Some(current);
    }
}

/// Lines typed on stdin, read on a plain thread so a pending read never
/// holds up runtime shutdown.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("cannot read stdin: {e}");
    }
    rx
}

fn spawn_prompt_reader(commands: mpsc::Sender<SearchCommand>, default_query: String) {
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let command = match line.trim() {
                    "quit" | "exit" => break,
                    "" => SearchCommand::Press(SearchQuery::text(default_query.clone())),
                    text => SearchCommand::Start(SearchQuery::text(text)),
                };
                if commands.blocking_send(command).is_err() {
                    return;
                }
            }
            let _ = commands.blocking_send(SearchCommand::Shutdown);
        });
    if let Err(e) = spawned {
        log::warn!("cannot read stdin: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_key_is_not_a_flag() {
        let parsed = Cli::try_parse_from(["houndify-sample", "--client-key", "secret", "text"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn command_line_overrides_settings_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cli = Cli::try_parse_from([
            "houndify-sample",
            "--client-id",
            "from-cli",
            "--base-url",
            "http://localhost:8080",
            "text",
            "hello",
        ])
        .expect("parse");

        let config = load_config(&cli, &dir.path().join("settings.toml"));
        assert_eq!(config.backend.client_id, "from-cli");
        assert_eq!(config.backend.base_url, "http://localhost:8080");
        assert_eq!(config.backend.max_recording_secs, 60);
    }
}
