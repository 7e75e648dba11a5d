// Device collaborator used for diagnostic captures

use std::sync::Arc;
use std::time::Duration;

use crate::error::DeviceError;
use crate::state::InputStreamSource;

/// The device a capture is taken from.
///
/// Implementations talk to real hardware; the reporting pipeline only needs
/// to know when the device is reachable and how to pull a bugreport.
pub trait BugreportDevice: Send + Sync {
    fn serial(&self) -> &str;

    /// Block until the device is online or `timeout` elapses
    fn wait_for_device_online(&self, timeout: Duration) -> Result<(), DeviceError>;

    /// Take a bugreport; the returned source may be opened repeatedly
    fn bugreport(&self) -> Result<Arc<dyn InputStreamSource>, DeviceError>;
}

/// Poll `probe` until it reports the device online or `timeout` elapses.
///
/// Helper for [`BugreportDevice::wait_for_device_online`] implementations
/// backed by a cheap status query.
pub fn poll_until_online(
    serial: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: impl FnMut() -> bool,
) -> Result<(), DeviceError> {
    let start = std::time::Instant::now();
    loop {
        if probe() {
            return Ok(());
        }
        let waited = start.elapsed();
        if waited >= timeout {
            return Err(DeviceError::NotAvailable {
                serial: serial.to_string(),
                waited,
            });
        }
        std::thread::sleep(interval.min(timeout - waited));
    }
}
