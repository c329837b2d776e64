//! Serial transport over the operating system's serial ports.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tokio::sync::mpsc;
use tokio::task;
use tracing::debug;

use crate::constants::{EVENT_CHANNEL_CAPACITY, SERIAL_CHUNK_SIZE, SERIAL_READ_TIMEOUT};
use crate::error::DeviceError;
use crate::serial::transport::{DeviceInfo, LinkEvent, SerialHandle, SerialTransport};

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTransport;

impl SerialTransport for NativeTransport {
    fn list_devices(&self) -> BoxFuture<'static, Result<Vec<DeviceInfo>, DeviceError>> {
        Box::pin(async {
            let ports = task::spawn_blocking(serialport::available_ports)
                .await
                .map_err(|e| DeviceError::List(e.to_string()))?
                .map_err(|e| DeviceError::List(e.to_string()))?;
            Ok(ports.into_iter().map(device_info).collect())
        })
    }

    fn open(&self, device: &DeviceInfo, baud_rate: u32) -> BoxFuture<'static, Result<SerialHandle, DeviceError>> {
        let path = device.path.clone();
        Box::pin(async move {
            let open_error = |reason: String| DeviceError::Open {
                path: path.clone(),
                reason,
            };

            let port_path = path.clone();
            let port = task::spawn_blocking(move || {
                serialport::new(port_path.as_str(), baud_rate)
                    .timeout(SERIAL_READ_TIMEOUT)
                    .open()
            })
            .await
            .map_err(|e| open_error(e.to_string()))?
            .map_err(|e| open_error(e.to_string()))?;

            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let stop = Arc::new(AtomicBool::new(false));
            let reader_stop = stop.clone();
            let reader_path = path.clone();
            task::spawn_blocking(move || read_loop(port, reader_path, tx, reader_stop));

            Ok(SerialHandle::new(path, rx).with_close(move || stop.store(true, Ordering::Release)))
        })
    }
}

fn device_info(port: SerialPortInfo) -> DeviceInfo {
    match port.port_type {
        SerialPortType::UsbPort(usb) => DeviceInfo {
            path: port.port_name,
            manufacturer: usb.manufacturer,
            product: usb.product,
            vendor_id: Some(usb.vid),
            product_id: Some(usb.pid),
        },
        _ => DeviceInfo::from_path(port.port_name),
    }
}

// Runs on a blocking thread until the handle is closed or the device goes away.
fn read_loop(mut port: Box<dyn SerialPort>, path: String, tx: mpsc::Sender<LinkEvent>, stop: Arc<AtomicBool>) {
    let mut buf = [0u8; SERIAL_CHUNK_SIZE];
    while !stop.load(Ordering::Acquire) {
        match port.read(&mut buf) {
            Ok(0) => {
                let _ = tx.blocking_send(LinkEvent::Closed);
                return;
            }
            Ok(n) => {
                if tx.blocking_send(LinkEvent::Data(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
            Err(e) => {
                let _ = tx.blocking_send(LinkEvent::Error(DeviceError::Read {
                    path: path.clone(),
                    reason: e.to_string(),
                }));
                return;
            }
        }
    }
    debug!(path = %path, "serial reader stopped");
}
