use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::DeviceError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub path: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl DeviceInfo {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Case-insensitive substring match of path, manufacturer or product against `patterns`.
    pub fn matches_any(&self, patterns: &[&str]) -> bool {
        let fields = [Some(&self.path), self.manufacturer.as_ref(), self.product.as_ref()];
        fields.into_iter().flatten().any(|field| {
            let field = field.to_lowercase();
            patterns.iter().any(|p| field.contains(&p.to_lowercase()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Data(Vec<u8>),
    Error(DeviceError),
    Closed,
}

/// An open device: a stream of [`LinkEvent`]s plus a way to release it.
pub struct SerialHandle {
    path: String,
    events: mpsc::Receiver<LinkEvent>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl SerialHandle {
    pub fn new(path: impl Into<String>, events: mpsc::Receiver<LinkEvent>) -> Self {
        Self {
            path: path.into(),
            events,
            on_close: None,
        }
    }

    pub fn with_close(mut self, on_close: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(on_close));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next event; a dropped sender reads as `Closed`.
    pub async fn recv(&mut self) -> LinkEvent {
        self.events.recv().await.unwrap_or(LinkEvent::Closed)
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.events.close();
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl Drop for SerialHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SerialHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialHandle").field("path", &self.path).finish_non_exhaustive()
    }
}

pub trait SerialTransport: Send + Sync + 'static {
    fn list_devices(&self) -> BoxFuture<'static, Result<Vec<DeviceInfo>, DeviceError>>;

    fn open(&self, device: &DeviceInfo, baud_rate: u32) -> BoxFuture<'static, Result<SerialHandle, DeviceError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn matching_is_case_insensitive_over_all_fields() {
        let patterns = &["usbmodem", "arduino"];
        assert!(DeviceInfo::from_path("/dev/cu.USBmodem1421").matches_any(patterns));
        assert!(!DeviceInfo::from_path("/dev/ttyS0").matches_any(patterns));

        let device = DeviceInfo {
            path: "COM3".into(),
            manufacturer: Some("Arduino LLC".into()),
            ..Default::default()
        };
        assert!(device.matches_any(patterns));
    }

    #[tokio::test]
    async fn dropped_sender_reads_as_closed() {
        let (tx, rx) = mpsc::channel(4);
        let mut handle = SerialHandle::new("/dev/ttyACM0", rx);
        tx.send(LinkEvent::Data(b"R".to_vec())).await.unwrap();
        drop(tx);
        assert_eq!(handle.recv().await, LinkEvent::Data(b"R".to_vec()));
        assert_eq!(handle.recv().await, LinkEvent::Closed);
    }

    #[test]
    fn close_runs_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = mpsc::channel(1);
        let counter = closed.clone();
        let handle = SerialHandle::new("x", rx).with_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
