//! Quit Guard: decides whether a quit attempt may terminate the process.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::ChallengeError;
use crate::state::QuitState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuitDecision {
    Granted,
    /// Present the password dialog and report its answer to [`QuitGuard::resolve`].
    Challenge,
    Rejected(ChallengeError),
}

pub struct QuitGuard {
    started_at: Instant,
    grace_period: Duration,
    password: Option<String>,
    validated: bool,
    state: QuitState,
}

impl QuitGuard {
    pub fn new(started_at: Instant, grace_period: Duration, password: Option<String>) -> Self {
        Self {
            started_at,
            grace_period,
            password: password.filter(|p| !p.is_empty()),
            validated: false,
            state: QuitState::NotRequested,
        }
    }

    pub fn state(&self) -> QuitState {
        self.state
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn request(&mut self, now: Instant) -> QuitDecision {
        match self.state {
            QuitState::Granted => return QuitDecision::Granted,
            QuitState::Challenging => {
                debug!("quit attempt while a challenge is open");
                return QuitDecision::Rejected(ChallengeError::AlreadyOpen);
            }
            QuitState::NotRequested => {}
        }

        let in_grace = now.saturating_duration_since(self.started_at) < self.grace_period;
        if self.password.is_none() || self.validated || in_grace {
            info!(in_grace, "quit granted");
            self.state = QuitState::Granted;
            return QuitDecision::Granted;
        }

        self.state = QuitState::Challenging;
        QuitDecision::Challenge
    }

    /// Applies the dialog's answer. Returns true when termination may proceed,
    /// in which case the caller re-issues the quit.
    pub fn resolve(&mut self, answer: Result<String, ChallengeError>) -> bool {
        if self.state != QuitState::Challenging {
            debug!("challenge answer with no challenge open");
            return self.state == QuitState::Granted;
        }

        let correct = match (&answer, &self.password) {
            (Ok(entered), Some(password)) => entered == password,
            (Ok(_), None) => true,
            (Err(e), _) => {
                debug!("challenge dismissed: {e}");
                false
            }
        };

        // The re-issued quit goes back through `request`.
        self.state = QuitState::NotRequested;
        if correct {
            info!("quit password accepted");
            self.validated = true;
        }
        correct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(password: Option<&str>) -> (QuitGuard, Instant) {
        let start = Instant::now();
        (
            QuitGuard::new(start, Duration::from_secs(10), password.map(str::to_string)),
            start,
        )
    }

    #[test]
    fn grace_period_grants_immediately() {
        let (mut quit, start) = guard(Some("abc123"));
        assert_eq!(quit.request(start), QuitDecision::Granted);
        assert_eq!(quit.state(), QuitState::Granted);
    }

    #[test]
    fn no_password_grants_immediately() {
        let (mut quit, start) = guard(None);
        assert_eq!(quit.request(start + Duration::from_secs(20)), QuitDecision::Granted);

        let (mut quit, start) = guard(Some(""));
        assert_eq!(quit.request(start + Duration::from_secs(20)), QuitDecision::Granted);
    }

    #[test]
    fn correct_password_grants_on_reissue() {
        let (mut quit, start) = guard(Some("abc123"));
        let later = start + Duration::from_secs(20);
        assert_eq!(quit.request(later), QuitDecision::Challenge);
        assert!(quit.resolve(Ok("abc123".into())));
        assert!(quit.is_validated());
        assert_eq!(quit.request(later), QuitDecision::Granted);
    }

    #[test]
    fn wrong_password_keeps_running() {
        let (mut quit, start) = guard(Some("abc123"));
        let later = start + Duration::from_secs(20);
        assert_eq!(quit.request(later), QuitDecision::Challenge);
        assert!(!quit.resolve(Ok("wrong".into())));
        assert_eq!(quit.state(), QuitState::NotRequested);
        assert_eq!(quit.request(later), QuitDecision::Challenge);
    }

    #[test]
    fn cancelled_dialog_keeps_running() {
        let (mut quit, start) = guard(Some("abc123"));
        quit.request(start + Duration::from_secs(20));
        assert!(!quit.resolve(Err(ChallengeError::Cancelled)));
        assert!(!quit.is_validated());
    }

    #[test]
    fn concurrent_attempt_is_rejected() {
        let (mut quit, start) = guard(Some("abc123"));
        let later = start + Duration::from_secs(20);
        assert_eq!(quit.request(later), QuitDecision::Challenge);
        assert_eq!(
            quit.request(later),
            QuitDecision::Rejected(ChallengeError::AlreadyOpen)
        );
        assert_eq!(quit.state(), QuitState::Challenging);
    }

    #[test]
    fn validation_is_sticky() {
        let (mut quit, start) = guard(Some("abc123"));
        let later = start + Duration::from_secs(20);
        quit.request(later);
        quit.resolve(Ok("abc123".into()));
        assert_eq!(quit.request(later + Duration::from_secs(3600)), QuitDecision::Granted);
    }
}
