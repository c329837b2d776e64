//! Fullscreen raylib shell. raylib has to live on the main thread, so the
//! controller talks to it through [`RaylibShell`], which only queues commands
//! for [`WindowLoop`] to pick up between frames.

use std::path::Path;
use std::time::Duration;

use futures::future::BoxFuture;
use raylib::prelude::*;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::constants::{BACKGROUND_COLOR, FPS, WINDOW_TITLE};
use crate::error::{ChallengeError, ShellError};
use crate::sequencer::NavCommand;
use crate::shell::browser::ContentLauncher;
use crate::shell::texture_loader::load_background;
use crate::shell::{CardData, DialogHost, DisplayShell, Input};

#[derive(Debug)]
enum ShellCommand {
    ShowCard(oneshot::Sender<Result<(), ShellError>>),
    CardData(CardData),
    HideCard,
    PromptPassword(oneshot::Sender<Result<String, ChallengeError>>),
    Exit,
}

/// Handle the controller holds. Cheap to clone.
#[derive(Clone)]
pub struct RaylibShell {
    commands: mpsc::UnboundedSender<ShellCommand>,
    launcher: ContentLauncher,
}

impl RaylibShell {
    fn send(&self, command: ShellCommand) -> Result<(), ShellError> {
        self.commands.send(command).map_err(|_| ShellError::Closed)
    }
}

impl DisplayShell for RaylibShell {
    fn load_interstitial(&self) -> BoxFuture<'static, Result<(), ShellError>> {
        // The browser covers the window; it goes before the card can be seen.
        self.launcher.close();
        let (ack, ready) = oneshot::channel();
        let sent = self.send(ShellCommand::ShowCard(ack));
        Box::pin(async move {
            sent?;
            ready.await.map_err(|_| ShellError::Closed)?
        })
    }

    fn load_content(&self, url: &str) -> BoxFuture<'static, Result<(), ShellError>> {
        let launch = self.launcher.launch(url);
        let shell = self.clone();
        Box::pin(async move {
            launch.await?;
            shell.send(ShellCommand::HideCard)
        })
    }

    fn send_card_data(&self, card: &CardData) {
        if self.send(ShellCommand::CardData(card.clone())).is_err() {
            debug!("window gone, dropping card data");
        }
    }

    fn close(&self) {
        self.launcher.close();
        let _ = self.send(ShellCommand::Exit);
    }
}

impl DialogHost for RaylibShell {
    fn present_password_challenge(&self) -> BoxFuture<'static, Result<String, ChallengeError>> {
        let (reply, answer) = oneshot::channel();
        let sent = self.send(ShellCommand::PromptPassword(reply));
        Box::pin(async move {
            sent.map_err(|e| ChallengeError::HostUnavailable(e.to_string()))?;
            answer.await.unwrap_or(Err(ChallengeError::Cancelled))
        })
    }
}

struct PasswordPrompt {
    reply: oneshot::Sender<Result<String, ChallengeError>>,
    entered: String,
}

#[derive(Default)]
struct Card {
    visible: bool,
    data: Option<CardData>,
    background: Option<(String, Texture2D)>,
}

/// The render loop. Must run on the main thread.
pub struct WindowLoop {
    commands: mpsc::UnboundedReceiver<ShellCommand>,
    inputs: mpsc::Sender<Input>,
}

/// Creates the shell handle and the loop that serves it.
pub fn open(launcher: ContentLauncher, inputs: mpsc::Sender<Input>) -> (RaylibShell, WindowLoop) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    (
        RaylibShell {
            commands: commands_tx,
            launcher,
        },
        WindowLoop {
            commands: commands_rx,
            inputs,
        },
    )
}

fn init_window() -> (RaylibHandle, RaylibThread) {
    let (mut rl, thread) = raylib::init().size(0, 0).title(WINDOW_TITLE).vsync().build();
    rl.set_target_fps(FPS);
    rl.set_trace_log(TraceLogLevel::LOG_ERROR);
    if !rl.is_window_fullscreen() {
        rl.toggle_fullscreen();
    }
    rl.set_exit_key(None);
    (rl, thread)
}

/// Shows `message` on a bare window for a few seconds. Used when startup fails.
pub fn show_startup_error(message: &str) {
    let (mut rl, thread) = init_window();
    let mut d = rl.begin_drawing(&thread);
    d.clear_background(Color::BLACK);
    d.draw_text(&format!("Error: {message}"), 20, 20, 20, Color::RED);
    drop(d);
    std::thread::sleep(Duration::from_secs(5));
}

impl WindowLoop {
    /// Runs until the controller closes the shell or drops its handle.
    pub fn run(mut self) {
        let (mut rl, thread) = init_window();
        let mut card = Card::default();
        let mut prompt: Option<PasswordPrompt> = None;
        let mut focused = true;
        let mut closing = false;

        info!("window shell running");
        'frames: loop {
            while let Ok(command) = self.commands.try_recv() {
                match command {
                    ShellCommand::ShowCard(ack) => {
                        card.visible = true;
                        let _ = ack.send(Ok(()));
                    }
                    ShellCommand::CardData(data) => {
                        refresh_background(&mut rl, &thread, &mut card, data.background_image.as_deref());
                        card.data = Some(data);
                    }
                    ShellCommand::HideCard => card.visible = false,
                    ShellCommand::PromptPassword(reply) => {
                        if prompt.is_some() {
                            let _ = reply.send(Err(ChallengeError::AlreadyOpen));
                        } else {
                            prompt = Some(PasswordPrompt {
                                reply,
                                entered: String::new(),
                            });
                        }
                    }
                    ShellCommand::Exit => break 'frames,
                }
            }
            if self.commands.is_closed() && self.commands.is_empty() {
                break;
            }

            // The close flag stays raised once set; forward it once.
            let close_requested = rl.window_should_close();
            if close_requested && !closing {
                self.forward(Input::Quit);
            }
            closing = close_requested;

            let now_focused = rl.is_window_focused();
            if focused && !now_focused {
                self.forward(Input::FocusLost);
            }
            focused = now_focused;

            prompt = match prompt.take() {
                Some(open) => handle_prompt_keys(&mut rl, open),
                None => {
                    self.translate_input(&mut rl);
                    None
                }
            };

            let mut d = rl.begin_drawing(&thread);
            d.clear_background(Color::BLACK);
            if card.visible {
                draw_card(&mut d, &card);
            }
            if let Some(open) = &prompt {
                draw_prompt(&mut d, open);
            }
        }

        if let Some(open) = prompt {
            let _ = open.reply.send(Err(ChallengeError::Cancelled));
        }
        info!("window shell closed");
    }

    fn forward(&self, input: Input) {
        if let Err(e) = self.inputs.try_send(input) {
            warn!("dropping shell input: {e}");
        }
    }

    fn translate_input(&self, rl: &mut RaylibHandle) {
        use KeyboardKey::*;

        let mut any_key = false;
        while let Some(key) = rl.get_key_pressed() {
            any_key = true;
            match key {
                KEY_RIGHT | KEY_DOWN | KEY_SPACE => self.forward(Input::Navigate(NavCommand::Next)),
                KEY_LEFT | KEY_UP => self.forward(Input::Navigate(NavCommand::Previous)),
                KEY_S => self.forward(Input::Navigate(NavCommand::Shuffle)),
                _ => {}
            }
        }

        let moved = rl.get_mouse_delta().length() > 0.0;
        let scrolled = rl.get_mouse_wheel_move() != 0.0;
        let gestured = rl.get_gesture_detected() != Gesture::GESTURE_NONE;
        if any_key || moved || scrolled || gestured {
            self.forward(Input::Activity);
        }

        if rl.is_mouse_button_pressed(MouseButton::MOUSE_BUTTON_LEFT) {
            self.forward(Input::PointerDown);
        }
        if rl.is_mouse_button_released(MouseButton::MOUSE_BUTTON_LEFT) {
            self.forward(Input::PointerUp);
        }
    }
}

fn handle_prompt_keys(rl: &mut RaylibHandle, mut prompt: PasswordPrompt) -> Option<PasswordPrompt> {
    while let Some(c) = rl.get_char_pressed() {
        if !c.is_control() {
            prompt.entered.push(c);
        }
    }
    if rl.is_key_pressed(KeyboardKey::KEY_BACKSPACE) {
        prompt.entered.pop();
    }
    if rl.is_key_pressed(KeyboardKey::KEY_ENTER) || rl.is_key_pressed(KeyboardKey::KEY_KP_ENTER) {
        let _ = prompt.reply.send(Ok(prompt.entered));
        return None;
    }
    if rl.is_key_pressed(KeyboardKey::KEY_ESCAPE) {
        let _ = prompt.reply.send(Err(ChallengeError::Cancelled));
        return None;
    }
    Some(prompt)
}

fn refresh_background(rl: &mut RaylibHandle, thread: &RaylibThread, card: &mut Card, wanted: Option<&str>) {
    let current = card.background.as_ref().map(|(path, _)| path.as_str());
    if current == wanted {
        return;
    }
    card.background = wanted.and_then(|path| match load_background(rl, thread, Path::new(path)) {
        Ok(texture) => Some((path.to_string(), texture)),
        Err(e) => {
            warn!("{e}");
            None
        }
    });
}

fn draw_card(d: &mut RaylibDrawHandle, card: &Card) {
    let sw = d.get_screen_width();
    let sh = d.get_screen_height();

    let fallback = Color::from_hex(BACKGROUND_COLOR.trim_start_matches('#')).unwrap_or(Color::BLACK);
    let background = card
        .data
        .as_ref()
        .and_then(|data| Color::from_hex(data.background_color.trim_start_matches('#')).ok())
        .unwrap_or(fallback);
    d.clear_background(background);

    if let Some((_, texture)) = &card.background {
        // Cover the screen, cropping whichever side overflows.
        let scale = (sw as f32 / texture.width() as f32).max(sh as f32 / texture.height() as f32);
        let w = texture.width() as f32 * scale;
        let h = texture.height() as f32 * scale;
        d.draw_texture_pro(
            texture,
            Rectangle::new(0.0, 0.0, texture.width() as f32, texture.height() as f32),
            Rectangle::new((sw as f32 - w) / 2.0, (sh as f32 - h) / 2.0, w, h),
            Vector2::new(0.0, 0.0),
            0.0,
            Color::WHITE,
        );
    }

    let Some(data) = &card.data else {
        return;
    };
    let title_size = sh / 10;
    let author_size = sh / 20;
    let title_width = measure_text(&data.title, title_size);
    let author_width = measure_text(&data.author, author_size);
    d.draw_text(&data.title, (sw - title_width) / 2, sh / 2 - title_size, title_size, Color::WHITE);
    d.draw_text(&data.author, (sw - author_width) / 2, sh / 2 + author_size / 2, author_size, Color::LIGHTGRAY);

    let position = format!("{} / {}", data.index + 1, data.total);
    let position_size = sh / 40;
    let position_width = measure_text(&position, position_size);
    d.draw_text(&position, sw - position_width - 20, sh - position_size - 20, position_size, Color::GRAY);
}

fn draw_prompt(d: &mut RaylibDrawHandle, prompt: &PasswordPrompt) {
    let sw = d.get_screen_width();
    let sh = d.get_screen_height();
    d.draw_rectangle(0, 0, sw, sh, Color::new(0, 0, 0, 180));

    let (w, h) = (sw / 3, sh / 5);
    let (x, y) = ((sw - w) / 2, (sh - h) / 2);
    d.draw_rectangle(x, y, w, h, Color::DARKGRAY);
    d.draw_rectangle_lines(x, y, w, h, Color::WHITE);

    let size = h / 6;
    d.draw_text("Password to quit", x + size, y + size, size, Color::WHITE);
    let masked = "*".repeat(prompt.entered.chars().count());
    d.draw_text(&masked, x + size, y + size * 3, size, Color::WHITE);
}
