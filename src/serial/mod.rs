//! Serial Link Manager: finds the rotary encoder, keeps one connection to it
//! and turns its bytes into navigation commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::{EVENT_CHANNEL_CAPACITY, KNOWN_DEVICE_PATTERNS};
use crate::error::DeviceError;
use crate::sequencer::NavCommand;
use crate::state::LinkStatus;

pub mod native;
pub mod transport;

pub use transport::{DeviceInfo, LinkEvent, SerialHandle, SerialTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub advance_code: u8,
    pub retreat_code: u8,
    pub scan_interval: Duration,
}

impl LinkSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            baud_rate: config.serial_baud_rate,
            advance_code: config.serial_advance_code,
            retreat_code: config.serial_retreat_code,
            scan_interval: config.serial_scan_interval,
        }
    }
}

/// One command per recognized byte, in arrival order. Everything else is dropped.
pub fn decode(bytes: &[u8], settings: &LinkSettings) -> Vec<NavCommand> {
    bytes
        .iter()
        .filter_map(|&b| {
            if b == settings.advance_code {
                Some(NavCommand::Next)
            } else if b == settings.retreat_code {
                Some(NavCommand::Previous)
            } else {
                None
            }
        })
        .collect()
}

/// First device whose identifiers look like a known microcontroller bridge.
pub fn select_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices.iter().find(|d| d.matches_any(KNOWN_DEVICE_PATTERNS))
}

enum LinkState {
    Absent,
    Connecting(String),
    Open(SerialHandle),
}

enum ScanOutcome {
    Found(DeviceInfo),
    NothingFound,
    ListFailed(DeviceError),
    Opened(SerialHandle),
    OpenFailed(DeviceError),
}

enum Update {
    Scan(ScanOutcome),
    Link(LinkEvent),
}

pub struct SerialLinkManager {
    transport: Arc<dyn SerialTransport>,
    settings: LinkSettings,
    state: LinkState,
    scan_in_flight: bool,
    stopped: bool,
    outcomes_tx: mpsc::Sender<ScanOutcome>,
    outcomes_rx: mpsc::Receiver<ScanOutcome>,
}

impl SerialLinkManager {
    pub fn new(transport: Arc<dyn SerialTransport>, settings: LinkSettings) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            settings,
            state: LinkState::Absent,
            scan_in_flight: false,
            stopped: false,
            outcomes_tx,
            outcomes_rx,
        }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn status(&self) -> LinkStatus {
        match self.state {
            LinkState::Absent => LinkStatus::Absent,
            LinkState::Connecting(_) => LinkStatus::Connecting,
            LinkState::Open(_) => LinkStatus::Open,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_in_flight
    }

    /// Looks for the device unless one is already held or a scan is running.
    pub fn scan(&mut self) {
        if self.stopped || self.scan_in_flight || !matches!(self.state, LinkState::Absent) {
            return;
        }
        self.scan_in_flight = true;

        let devices = self.transport.list_devices();
        let outcomes = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let outcome = match devices.await {
                Ok(devices) => match select_device(&devices) {
                    Some(device) => ScanOutcome::Found(device.clone()),
                    None => ScanOutcome::NothingFound,
                },
                Err(e) => ScanOutcome::ListFailed(e),
            };
            let _ = outcomes.send(outcome).await;
        });
    }

    /// Waits for the next scan result or link event and applies it. Returns the
    /// navigation commands decoded from it, often none. Cancel-safe.
    pub async fn next_commands(&mut self) -> Vec<NavCommand> {
        let update = match &mut self.state {
            LinkState::Open(handle) => tokio::select! {
                Some(outcome) = self.outcomes_rx.recv() => Update::Scan(outcome),
                event = handle.recv() => Update::Link(event),
            },
            _ => match self.outcomes_rx.recv().await {
                Some(outcome) => Update::Scan(outcome),
                None => return Vec::new(),
            },
        };

        match update {
            Update::Scan(outcome) => {
                self.apply_outcome(outcome);
                Vec::new()
            }
            Update::Link(event) => self.apply_link_event(event),
        }
    }

    /// Drops the connection, if any. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        match std::mem::replace(&mut self.state, LinkState::Absent) {
            LinkState::Open(handle) => {
                info!(path = handle.path(), "serial link closed");
                handle.close();
            }
            LinkState::Connecting(path) => debug!(path = %path, "abandoning serial open"),
            LinkState::Absent => {}
        }
    }

    /// Stops scanning for good and releases the connection.
    pub fn shutdown(&mut self) {
        self.stopped = true;
        self.teardown();
    }

    fn connect(&mut self, device: DeviceInfo) {
        info!(path = %device.path, baud = self.settings.baud_rate, "connecting to serial device");
        self.state = LinkState::Connecting(device.path.clone());

        let open = self.transport.open(&device, self.settings.baud_rate);
        let outcomes = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let outcome = match open.await {
                Ok(handle) => ScanOutcome::Opened(handle),
                Err(e) => ScanOutcome::OpenFailed(e),
            };
            let _ = outcomes.send(outcome).await;
        });
    }

    fn apply_outcome(&mut self, outcome: ScanOutcome) {
        match outcome {
            ScanOutcome::Found(device) => {
                self.scan_in_flight = false;
                if !self.stopped && matches!(self.state, LinkState::Absent) {
                    self.connect(device);
                }
            }
            ScanOutcome::NothingFound => {
                self.scan_in_flight = false;
                debug!("no serial device found");
            }
            ScanOutcome::ListFailed(e) => {
                self.scan_in_flight = false;
                warn!("{e}");
            }
            ScanOutcome::Opened(handle) => {
                let expected = matches!(&self.state, LinkState::Connecting(path) if path == handle.path());
                if self.stopped || !expected {
                    debug!(path = handle.path(), "closing serial device opened after teardown");
                    handle.close();
                    return;
                }
                info!(path = handle.path(), "serial link open");
                self.state = LinkState::Open(handle);
            }
            ScanOutcome::OpenFailed(e) => {
                warn!("{e}");
                if matches!(self.state, LinkState::Connecting(_)) {
                    self.state = LinkState::Absent;
                }
            }
        }
    }

    fn apply_link_event(&mut self, event: LinkEvent) -> Vec<NavCommand> {
        match event {
            LinkEvent::Data(bytes) => {
                let commands = decode(&bytes, &self.settings);
                debug!(bytes = bytes.len(), commands = commands.len(), "serial data");
                commands
            }
            LinkEvent::Error(e) => {
                warn!("{e}");
                self.teardown();
                Vec::new()
            }
            LinkEvent::Closed => {
                self.teardown();
                Vec::new()
            }
        }
    }
}

impl Drop for SerialLinkManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
