use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;

use crate::config::{DeviceConfig, TransferKind};
use crate::transport::{SetupStage, Transport, TransportError};
use log::{debug, warn};

/// libusb's numeric code for an error reported by rusb.
pub fn libusb_code(err: &rusb::Error) -> i32 {
    match err {
        rusb::Error::Io => -1,
        rusb::Error::InvalidParam => -2,
        rusb::Error::Access => -3,
        rusb::Error::NoDevice => -4,
        rusb::Error::NotFound => -5,
        rusb::Error::Busy => -6,
        rusb::Error::Timeout => -7,
        rusb::Error::Overflow => -8,
        rusb::Error::Pipe => -9,
        rusb::Error::Interrupted => -10,
        rusb::Error::NoMem => -11,
        rusb::Error::NotSupported => -12,
        _ => -99,
    }
}

fn transfer_error(err: rusb::Error) -> TransportError {
    match err {
        rusb::Error::Timeout => TransportError::Timeout,
        err => TransportError::Io {
            code: libusb_code(&err),
        },
    }
}

fn setup_error(stage: SetupStage) -> impl Fn(rusb::Error) -> TransportError {
    move |err| TransportError::Config {
        stage,
        code: libusb_code(&err),
    }
}

/// A claimed interface on the device under test.
///
/// Dropping it releases the interface and resets the device, whatever state
/// the session ended in.
pub struct UsbTransport {
    device: DeviceHandle<Context>,
    interface: u8,
    transfer: TransferKind,
}

impl UsbTransport {
    pub fn open(config: &DeviceConfig) -> Result<Self, TransportError> {
        let context = Context::new().map_err(transfer_error)?;
        let mut device = context
            .open_device_with_vid_pid(config.vid, config.pid)
            .ok_or_else(|| TransportError::NotFound {
                vid: config.vid,
                pid: config.pid,
            })?;
        debug!("opened device {:04x}:{:04x}", config.vid, config.pid);

        if config.detach_kernel_driver {
            if let Ok(true) = device.kernel_driver_active(config.interface) {
                device
                    .detach_kernel_driver(config.interface)
                    .map_err(setup_error(SetupStage::DetachKernelDriver))?;
                debug!("detached kernel driver from interface {}", config.interface);
            }
        }

        device
            .set_active_configuration(config.configuration)
            .map_err(setup_error(SetupStage::SetConfiguration))?;
        debug!("set usb configuration {}", config.configuration);

        device
            .claim_interface(config.interface)
            .map_err(setup_error(SetupStage::ClaimInterface))?;
        debug!("claimed interface {}", config.interface);

        Ok(Self {
            device,
            interface: config.interface,
            transfer: config.transfer,
        })
    }
}

impl Transport for UsbTransport {
    fn read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        match self.transfer {
            TransferKind::Interrupt => self.device.read_interrupt(endpoint, buf, timeout),
            TransferKind::Bulk => self.device.read_bulk(endpoint, buf, timeout),
        }
        .map_err(transfer_error)
    }

    fn write(
        &mut self,
        endpoint: u8,
        buf: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        match self.transfer {
            TransferKind::Interrupt => self.device.write_interrupt(endpoint, buf, timeout),
            TransferKind::Bulk => self.device.write_bulk(endpoint, buf, timeout),
        }
        .map_err(transfer_error)
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        if let Err(err) = self.device.release_interface(self.interface) {
            warn!("releasing interface {} failed: {}", self.interface, err);
        }
        if let Err(err) = self.device.reset() {
            debug!("device reset failed: {}", err);
        }
    }
}
