//! Shows project content by running a browser in kiosk mode, one child at a time.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_BROWSER, DEFAULT_BROWSER_ARGS};
use crate::error::ShellError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for BrowserCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_BROWSER.to_string(),
            args: DEFAULT_BROWSER_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Clone)]
pub struct ContentLauncher {
    command: BrowserCommand,
    child: Arc<Mutex<Option<Child>>>,
}

impl ContentLauncher {
    pub fn new(command: BrowserCommand) -> Self {
        Self {
            command,
            child: Arc::new(Mutex::new(None)),
        }
    }

    /// Replaces the running browser with one showing `url`. Resolves once the
    /// new process has started.
    pub fn launch(&self, url: &str) -> BoxFuture<'static, Result<(), ShellError>> {
        let url = url.to_string();
        let command = self.command.clone();
        let slot = self.child.clone();
        Box::pin(async move {
            let mut browser = Command::new(&command.program);
            browser.args(&command.args).arg(&url).kill_on_drop(true);
            // Own process group, so a terminal Ctrl-C reaches only the kiosk.
            #[cfg(unix)]
            browser.process_group(0);

            let spawned = browser
                .spawn()
                .map_err(|e| ShellError::Content {
                    url: url.clone(),
                    reason: format!("{}: {e}", command.program),
                });

            let mut slot = slot.lock().map_err(|_| ShellError::Closed)?;
            if let Some(mut previous) = slot.take() {
                if let Err(e) = previous.start_kill() {
                    debug!("previous browser already gone: {e}");
                }
            }
            *slot = Some(spawned?);
            info!(%url, program = %command.program, "content launched");
            Ok(())
        })
    }

    /// Stops the running browser, if any.
    pub fn close(&self) {
        match self.child.lock() {
            Ok(mut slot) => {
                if let Some(mut child) = slot.take() {
                    if let Err(e) = child.start_kill() {
                        debug!("browser already gone: {e}");
                    }
                }
            }
            Err(_) => warn!("browser slot poisoned, leaving process to kill_on_drop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_a_content_error() {
        let launcher = ContentLauncher::new(BrowserCommand {
            program: "kiosk-test-no-such-browser".into(),
            args: Vec::new(),
        });
        let err = launcher.launch("https://a.example").await.unwrap_err();
        assert!(matches!(err, ShellError::Content { url, .. } if url == "https://a.example"));
        launcher.close();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn relaunch_replaces_child() {
        let launcher = ContentLauncher::new(BrowserCommand {
            program: "sleep".into(),
            args: Vec::new(),
        });
        launcher.launch("30").await.unwrap();
        let first = launcher.child.lock().unwrap().as_ref().and_then(|c| c.id());
        launcher.launch("30").await.unwrap();
        let second = launcher.child.lock().unwrap().as_ref().and_then(|c| c.id());
        assert!(first.is_some() && second.is_some());
        assert_ne!(first, second);
        launcher.close();
        assert!(launcher.child.lock().unwrap().is_none());
    }

    // Fifth field of /proc/<pid>/stat, counted after the parenthesized command name.
    #[cfg(target_os = "linux")]
    fn process_group_of(pid: &str) -> String {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).unwrap();
        let after_name = &stat[stat.rfind(')').unwrap() + 1..];
        after_name.split_whitespace().nth(2).unwrap().to_string()
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn browser_runs_in_its_own_process_group() {
        let launcher = ContentLauncher::new(BrowserCommand {
            program: "sleep".into(),
            args: Vec::new(),
        });
        launcher.launch("30").await.unwrap();
        let pid = launcher.child.lock().unwrap().as_ref().and_then(|c| c.id()).unwrap();

        let group = process_group_of(&pid.to_string());
        assert_eq!(group, pid.to_string());
        assert_ne!(group, process_group_of("self"));
        launcher.close();
    }
}
