//! The single control flow. Every piece of mutable state (cursor, transition
//! token, idle deadline, serial handle, quit state) is touched only from
//! [`Controller::run`], so ordering comes from the event queue alone.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use crate::constants::{EVENT_CHANNEL_CAPACITY, HOLD_POLL_INTERVAL};
use crate::error::{ChallengeError, ShellError};
use crate::idle::IdleMonitor;
use crate::quit::{QuitDecision, QuitGuard};
use crate::sequencer::{Effect, NavCommand, Sequencer, TransitionToken};
use crate::serial::{LinkSettings, SerialLinkManager, SerialTransport};
use crate::shell::{DialogHost, DisplayShell, Input};

/// Results of work the controller started earlier.
#[derive(Debug)]
enum Completion {
    InterstitialLoaded {
        token: TransitionToken,
        result: Result<(), ShellError>,
    },
    CardElapsed {
        token: TransitionToken,
    },
    ContentLoaded {
        token: TransitionToken,
        result: Result<(), ShellError>,
    },
    ChallengeResolved(Result<String, ChallengeError>),
}

pub struct Controller {
    sequencer: Sequencer,
    idle: IdleMonitor,
    quit: QuitGuard,
    serial: Option<SerialLinkManager>,
    scan_interval: Duration,
    shell: Arc<dyn DisplayShell>,
    dialog: Arc<dyn DialogHost>,
    inputs: mpsc::Receiver<Input>,
    completions_tx: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
    card_timer: Option<JoinHandle<()>>,
    exit: bool,
}

impl Controller {
    pub fn new(
        sequencer: Sequencer,
        shell: Arc<dyn DisplayShell>,
        dialog: Arc<dyn DialogHost>,
        inputs: mpsc::Receiver<Input>,
    ) -> Self {
        let config = &sequencer.playlist().config;
        let idle = IdleMonitor::new(config.idle_shuffle_timeout);
        let quit = QuitGuard::new(Instant::now(), config.quit_grace_period, config.password.clone());
        let scan_interval = config.serial_scan_interval;
        let (completions_tx, completions_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sequencer,
            idle,
            quit,
            serial: None,
            scan_interval,
            shell,
            dialog,
            inputs,
            completions_tx,
            completions_rx,
            card_timer: None,
            exit: false,
        }
    }

    /// Measures the quit grace period from `started_at` instead of from construction.
    pub fn started_at(mut self, started_at: Instant) -> Self {
        let config = &self.sequencer.playlist().config;
        self.quit = QuitGuard::new(started_at, config.quit_grace_period, config.password.clone());
        self
    }

    pub fn with_serial(mut self, transport: Arc<dyn SerialTransport>) -> Self {
        let settings = LinkSettings::from_config(&self.sequencer.playlist().config);
        self.serial = Some(SerialLinkManager::new(transport, settings));
        self
    }

    /// Runs until a quit is granted or the shell goes away.
    pub async fn run(mut self) {
        self.start();

        let mut scan = interval(self.scan_interval);
        scan.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut hold = interval(HOLD_POLL_INTERVAL);
        hold.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.exit {
            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => {
                        info!("shell input closed, stopping");
                        self.exit = true;
                    }
                },
                Some(completion) = self.completions_rx.recv() => self.handle_completion(completion),
                _ = self.idle.expired() => {
                    info!("idle timeout, shuffling");
                    if !self.navigate(NavCommand::Shuffle, "idle") {
                        // Nothing re-armed the monitor; try again after another idle period.
                        self.idle.record_activity();
                    }
                }
                _ = hold.tick(), if self.idle.is_holding() => self.idle.record_activity(),
                _ = scan.tick(), if self.serial.is_some() => {
                    if let Some(serial) = self.serial.as_mut() {
                        serial.scan();
                    }
                }
                commands = serial_commands(self.serial.as_mut()) => {
                    for command in commands {
                        self.navigate(command, "serial");
                    }
                }
            }
        }

        self.stop();
    }

    fn start(&mut self) {
        info!(projects = self.sequencer.playlist().len(), "controller starting");
        self.idle.record_activity();
        match self.sequencer.playlist().projects.iter().position(|p| p.has_url()) {
            Some(first) => {
                self.navigate(NavCommand::GoTo(first), "startup");
            }
            None => warn!("no project has a url, nothing to show"),
        }
    }

    fn stop(&mut self) {
        if let Some(timer) = self.card_timer.take() {
            timer.abort();
        }
        if let Some(serial) = self.serial.as_mut() {
            serial.shutdown();
        }
        self.shell.close();
        info!("controller stopped");
    }

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::Navigate(command) => {
                self.navigate(command, "input");
            }
            Input::Activity => self.idle.record_activity(),
            Input::PointerDown => self.idle.pointer_down(),
            Input::PointerUp => self.idle.pointer_up(),
            Input::FocusLost => self.idle.focus_lost(),
            Input::Quit => self.request_quit(),
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::InterstitialLoaded { token, result } => {
                let effects = self.sequencer.interstitial_loaded(token, result);
                self.apply(effects);
            }
            Completion::CardElapsed { token } => {
                let effects = self.sequencer.card_elapsed(token);
                self.apply(effects);
            }
            Completion::ContentLoaded { token, result } => self.sequencer.content_loaded(token, result),
            Completion::ChallengeResolved(answer) => {
                if self.quit.resolve(answer) {
                    // The first attempt was held back; ask again now that it will pass.
                    self.request_quit();
                } else {
                    info!("quit denied, staying up");
                }
            }
        }
    }

    /// Returns whether the navigation was performed.
    fn navigate(&mut self, command: NavCommand, source: &'static str) -> bool {
        match self.sequencer.navigate(command) {
            Ok(effects) => {
                debug!(source, ?command, cursor = self.sequencer.cursor(), "navigation");
                self.apply(effects);
                true
            }
            Err(e) => {
                warn!(source, ?command, "navigation refused: {e}");
                false
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RecordActivity => self.idle.record_activity(),
                Effect::SendCardData(card) => self.shell.send_card_data(&card),
                Effect::LoadInterstitial { token } => {
                    let load = self.shell.load_interstitial();
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = load.await;
                        let _ = completions.send(Completion::InterstitialLoaded { token, result }).await;
                    });
                }
                Effect::StartCardTimer { token, duration } => {
                    if let Some(previous) = self.card_timer.take() {
                        previous.abort();
                    }
                    let completions = self.completions_tx.clone();
                    self.card_timer = Some(tokio::spawn(async move {
                        sleep(duration).await;
                        let _ = completions.send(Completion::CardElapsed { token }).await;
                    }));
                }
                Effect::LoadContent { token, url } => {
                    self.card_timer = None;
                    let load = self.shell.load_content(&url);
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = load.await;
                        let _ = completions.send(Completion::ContentLoaded { token, result }).await;
                    });
                }
            }
        }
    }

    fn request_quit(&mut self) {
        match self.quit.request(Instant::now()) {
            QuitDecision::Granted => self.exit = true,
            QuitDecision::Challenge => {
                info!("quit requires password");
                let challenge = self.dialog.present_password_challenge();
                let completions = self.completions_tx.clone();
                tokio::spawn(async move {
                    let answer = challenge.await;
                    let _ = completions.send(Completion::ChallengeResolved(answer)).await;
                });
            }
            QuitDecision::Rejected(e) => debug!("quit attempt rejected: {e}"),
        }
    }
}

async fn serial_commands(serial: Option<&mut SerialLinkManager>) -> Vec<NavCommand> {
    match serial {
        Some(serial) => serial.next_commands().await,
        None => future::pending().await,
    }
}
