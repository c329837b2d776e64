use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kiosk::constants::INPUT_CHANNEL_CAPACITY;
use kiosk::error::ConfigError;
use kiosk::playlist::{self, Playlist};
use kiosk::serial::native::NativeTransport;
use kiosk::shell::browser::{BrowserCommand, ContentLauncher};
use kiosk::shell::headless::{HeadlessShell, TerminalConsole, forward_interrupts};
use kiosk::shell::{DialogHost, DisplayShell, Input};
use kiosk::{Controller, Sequencer};

/// Runs a playlist of web projects fullscreen, with a title card before each.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Playlist file. Searched for when omitted.
    playlist: Option<PathBuf>,

    /// JSON object merged over the playlist's config block.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Program that shows project content.
    #[arg(long, value_name = "PROGRAM")]
    browser: Option<String>,

    /// Argument passed to the browser before the url. Repeatable.
    #[arg(long = "browser-arg", value_name = "ARG", allow_hyphen_values = true)]
    browser_args: Vec<String>,

    /// Do not look for the rotary encoder.
    #[arg(long)]
    no_serial: bool,

    /// Use the terminal shell even when the window shell is built in.
    #[arg(long)]
    headless: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let started_at = Instant::now();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli, started_at) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "kiosk=debug" } else { "kiosk=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, started_at: Instant) -> Result<()> {
    #[cfg(feature = "window")]
    if !cli.headless {
        return run_window(cli, started_at);
    }
    run_headless(cli, started_at)
}

fn run_headless(cli: Cli, started_at: Instant) -> Result<()> {
    let playlist = load_playlist(&cli)?;
    let runtime = build_runtime()?;

    let (inputs_tx, inputs_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    let shell = Arc::new(HeadlessShell::new(ContentLauncher::new(browser_command(&cli))));
    let console = TerminalConsole::new();
    let controller = build_controller(playlist, shell, Arc::new(console.clone()), inputs_rx, &cli).started_at(started_at);

    runtime.block_on(async move {
        console.spawn_reader(inputs_tx.clone());
        forward_interrupts(inputs_tx);
        controller.run().await;
    });
    // The stdin reader stays blocked in a read; do not wait for it.
    runtime.shutdown_background();
    Ok(())
}

#[cfg(feature = "window")]
fn run_window(cli: Cli, started_at: Instant) -> Result<()> {
    use anyhow::anyhow;
    use kiosk::shell::window;

    let playlist = match load_playlist(&cli) {
        Ok(playlist) => playlist,
        Err(e) => {
            window::show_startup_error(&e.to_string());
            return Err(e.into());
        }
    };
    let runtime = build_runtime()?;

    let (inputs_tx, inputs_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    let (shell, window_loop) = window::open(ContentLauncher::new(browser_command(&cli)), inputs_tx.clone());
    let shell = Arc::new(shell);
    let controller = build_controller(playlist, shell.clone(), shell, inputs_rx, &cli).started_at(started_at);

    // raylib keeps the main thread; the controller gets its own.
    let worker = std::thread::Builder::new()
        .name("controller".into())
        .spawn(move || {
            runtime.block_on(async move {
                // A browser on screen holds keyboard focus; the terminal still navigates.
                TerminalConsole::new().spawn_reader(inputs_tx.clone());
                forward_interrupts(inputs_tx);
                controller.run().await;
            });
            runtime.shutdown_background();
        })
        .context("failed to start controller thread")?;

    window_loop.run();
    worker.join().map_err(|_| anyhow!("controller thread panicked"))
}

fn load_playlist(cli: &Cli) -> Result<Playlist, ConfigError> {
    let path = match &cli.playlist {
        Some(path) => path.clone(),
        None => playlist::discover(&playlist::search_paths())?,
    };
    let overrides = cli.config.as_deref().map(playlist::read_json).transpose()?;

    info!(path = %path.display(), "loading playlist");
    Playlist::load(&path, overrides.as_ref())
}

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn browser_command(cli: &Cli) -> BrowserCommand {
    let mut command = BrowserCommand::default();
    if let Some(program) = &cli.browser {
        command.program = program.clone();
    }
    if !cli.browser_args.is_empty() {
        command.args = cli.browser_args.clone();
    }
    command
}

fn build_controller(
    playlist: Playlist,
    shell: Arc<dyn DisplayShell>,
    dialog: Arc<dyn DialogHost>,
    inputs: mpsc::Receiver<Input>,
    cli: &Cli,
) -> Controller {
    let controller = Controller::new(Sequencer::new(playlist), shell, dialog, inputs);
    if cli.no_serial {
        info!("serial input disabled");
        controller
    } else {
        controller.with_serial(Arc::new(NativeTransport))
    }
}
