//! Idle Monitor: folds every "someone is here" signal into one deadline and
//! fires once when that deadline passes untouched.

use std::future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

pub struct IdleMonitor {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    holding: bool,
}

impl IdleMonitor {
    /// `None` or a zero timeout disables the monitor for good.
    pub fn new(timeout: Option<Duration>) -> Self {
        let timeout = timeout.filter(|t| !t.is_zero());
        if timeout.is_none() {
            info!("idle shuffle disabled");
        }
        Self {
            timeout,
            deadline: None,
            holding: false,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drops the pending deadline and starts a fresh one. A timeout too long
    /// to represent never fires.
    pub fn record_activity(&mut self) {
        self.deadline = self.timeout.and_then(|t| Instant::now().checked_add(t));
    }

    /// Button went down. Activity keeps being recorded until it comes back up.
    pub fn pointer_down(&mut self) {
        self.holding = true;
        self.record_activity();
    }

    pub fn pointer_up(&mut self) {
        self.holding = false;
        self.record_activity();
    }

    pub fn focus_lost(&mut self) {
        if self.holding {
            debug!("focus lost while holding, stopping hold poll");
        }
        self.holding = false;
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Completes once per uninterrupted idle period, then stays pending until
    /// the next [`record_activity`](Self::record_activity). Cancel-safe.
    pub async fn expired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => future::pending::<()>().await,
        }
    }
}
