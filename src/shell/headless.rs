//! Shell for machines without the window feature: content in a browser,
//! title cards in the log, navigation and the quit password on the terminal.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ChallengeError, ShellError};
use crate::sequencer::NavCommand;
use crate::shell::browser::ContentLauncher;
use crate::shell::{CardData, DialogHost, DisplayShell, Input};

pub struct HeadlessShell {
    launcher: ContentLauncher,
}

impl HeadlessShell {
    pub fn new(launcher: ContentLauncher) -> Self {
        Self { launcher }
    }
}

impl DisplayShell for HeadlessShell {
    fn load_interstitial(&self) -> BoxFuture<'static, Result<(), ShellError>> {
        Box::pin(async { Ok(()) })
    }

    fn load_content(&self, url: &str) -> BoxFuture<'static, Result<(), ShellError>> {
        self.launcher.launch(url)
    }

    fn send_card_data(&self, card: &CardData) {
        match serde_json::to_string(card) {
            Ok(json) => info!(position = card.index + 1, total = card.total, card = %json, "title card"),
            Err(e) => warn!("cannot encode title card: {e}"),
        }
    }

    fn close(&self) {
        self.launcher.close();
    }
}

type Reply = oneshot::Sender<Result<String, ChallengeError>>;

#[derive(Default)]
struct Prompt {
    reply: Option<Reply>,
    closed: bool,
}

/// Line console on standard input, read by a single task.
///
/// `n`/`next`, `p`/`previous`, `s`/`shuffle`, a project number and `q`/`quit`
/// become inputs; any other line counts as activity. While a password
/// challenge is open the next line answers it instead.
#[derive(Clone, Default)]
pub struct TerminalConsole {
    prompt: Arc<Mutex<Prompt>>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves standard input until it closes.
    pub fn spawn_reader(&self, inputs: mpsc::Sender<Input>) -> JoinHandle<()> {
        tokio::spawn(self.clone().serve(BufReader::new(tokio::io::stdin()), inputs))
    }

    pub async fn serve<R>(self, reader: R, inputs: mpsc::Sender<Input>)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("terminal input failed: {e}");
                    break;
                }
            };

            if let Some(reply) = self.take_reply() {
                let _ = reply.send(Ok(line));
                continue;
            }
            if inputs.send(parse_command(&line)).await.is_err() {
                break;
            }
        }

        debug!("terminal input closed");
        if let Ok(mut prompt) = self.prompt.lock() {
            prompt.closed = true;
            if let Some(reply) = prompt.reply.take() {
                let _ = reply.send(Err(ChallengeError::Cancelled));
            }
        }
    }

    fn take_reply(&self) -> Option<Reply> {
        self.prompt.lock().ok().and_then(|mut p| p.reply.take())
    }

    fn open_prompt(&self) -> Result<oneshot::Receiver<Result<String, ChallengeError>>, ChallengeError> {
        let mut prompt = self
            .prompt
            .lock()
            .map_err(|_| ChallengeError::HostUnavailable("terminal prompt poisoned".into()))?;
        if prompt.closed {
            return Err(ChallengeError::HostUnavailable("standard input is closed".into()));
        }
        if prompt.reply.is_some() {
            return Err(ChallengeError::AlreadyOpen);
        }
        let (reply, answer) = oneshot::channel();
        prompt.reply = Some(reply);
        Ok(answer)
    }
}

impl DialogHost for TerminalConsole {
    fn present_password_challenge(&self) -> BoxFuture<'static, Result<String, ChallengeError>> {
        let answer = self.open_prompt();
        Box::pin(async move {
            let answer = answer?;
            let mut stderr = tokio::io::stderr();
            let _ = stderr.write_all(b"Password to quit: ").await;
            let _ = stderr.flush().await;
            answer.await.unwrap_or(Err(ChallengeError::Cancelled))
        })
    }
}

fn parse_command(line: &str) -> Input {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "n" | "next" => Input::Navigate(NavCommand::Next),
        "p" | "prev" | "previous" => Input::Navigate(NavCommand::Previous),
        "s" | "shuffle" => Input::Navigate(NavCommand::Shuffle),
        "q" | "quit" => Input::Quit,
        other => match other.parse::<usize>() {
            Ok(number) if number > 0 => Input::Navigate(NavCommand::GoTo(number - 1)),
            _ => Input::Activity,
        },
    }
}

/// Forwards every Ctrl-C as a quit attempt.
pub fn forward_interrupts(inputs: mpsc::Sender<Input>) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("cannot listen for Ctrl-C: {e}");
                return;
            }
            if inputs.send(Input::Quit).await.is_err() {
                return;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    async fn drain(rx: &mut mpsc::Receiver<Input>) -> Vec<Input> {
        let mut seen = Vec::new();
        while let Ok(input) = rx.try_recv() {
            seen.push(input);
        }
        seen
    }

    #[test]
    fn commands_map_to_inputs() {
        assert_eq!(parse_command("n"), Input::Navigate(NavCommand::Next));
        assert_eq!(parse_command(" Previous "), Input::Navigate(NavCommand::Previous));
        assert_eq!(parse_command("s"), Input::Navigate(NavCommand::Shuffle));
        assert_eq!(parse_command("3"), Input::Navigate(NavCommand::GoTo(2)));
        assert_eq!(parse_command("q"), Input::Quit);
        assert_eq!(parse_command(""), Input::Activity);
        assert_eq!(parse_command("0"), Input::Activity);
        assert_eq!(parse_command("hello"), Input::Activity);
    }

    #[tokio::test]
    async fn lines_become_inputs_until_eof() {
        let (tx, mut rx) = mpsc::channel(16);
        TerminalConsole::new().serve(&b"next\n\n2\n"[..], tx).await;
        assert_eq!(
            drain(&mut rx).await,
            vec![
                Input::Navigate(NavCommand::Next),
                Input::Activity,
                Input::Navigate(NavCommand::GoTo(1)),
            ]
        );
    }

    #[tokio::test]
    async fn open_challenge_takes_the_next_line() {
        let console = TerminalConsole::new();
        let (tx, mut rx) = mpsc::channel(16);
        let (mut writer, reader) = duplex(64);
        let server = tokio::spawn(console.clone().serve(BufReader::new(reader), tx));

        let answer = console.present_password_challenge();
        writer.write_all(b"n\n").await.unwrap();
        assert_eq!(answer.await, Ok("n".to_string()));

        writer.write_all(b"n\n").await.unwrap();
        drop(writer);
        server.await.unwrap();
        assert_eq!(drain(&mut rx).await, vec![Input::Navigate(NavCommand::Next)]);
    }

    #[tokio::test]
    async fn closed_input_cancels_and_refuses_challenges() {
        let console = TerminalConsole::new();
        let (tx, _rx) = mpsc::channel(16);
        let (writer, reader) = duplex(64);
        let server = tokio::spawn(console.clone().serve(BufReader::new(reader), tx));

        let answer = console.present_password_challenge();
        assert_eq!(
            console.present_password_challenge().await,
            Err(ChallengeError::AlreadyOpen)
        );
        drop(writer);
        server.await.unwrap();

        assert_eq!(answer.await, Err(ChallengeError::Cancelled));
        assert!(matches!(
            console.present_password_challenge().await,
            Err(ChallengeError::HostUnavailable(_))
        ));
    }
}
