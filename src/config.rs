use crate::layout::{FrameLayout, Variant};
use crate::Result;
use failure::ensure;
use std::time::Duration;

pub const DEFAULT_VID: u16 = 0x03eb;
pub const DEFAULT_PID: u16 = 0x204f;

pub const DEFAULT_IN_ENDPOINT: u8 = 0x81;
pub const DEFAULT_OUT_ENDPOINT: u8 = 0x02;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Interrupt,
    Bulk,
}

/// How to find and set up the device under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub vid: u16,
    pub pid: u16,
    pub interface: u8,
    pub configuration: u8,
    pub transfer: TransferKind,
    pub detach_kernel_driver: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vid: DEFAULT_VID,
            pid: DEFAULT_PID,
            interface: 0,
            configuration: 1,
            transfer: TransferKind::Interrupt,
            detach_kernel_driver: cfg!(target_os = "linux"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub frame_len: usize,
    pub layout: FrameLayout,
    /// Reads per batch.
    pub batch_len: u32,
    /// Stop after this many batches; run until cancelled if `None`.
    pub max_batches: Option<u64>,
    pub in_endpoint: u8,
    pub out_endpoint: u8,
    pub timeout: Duration,
    /// Send one zeroed frame to `out_endpoint` before the first batch.
    pub prime: bool,
    /// Abort on the first sequence error instead of counting it.
    pub fail_fast: bool,
}

impl SessionConfig {
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            frame_len: variant.frame_len(),
            layout: variant.layout(),
            batch_len: variant.batch_len(),
            max_batches: None,
            in_endpoint: DEFAULT_IN_ENDPOINT,
            out_endpoint: DEFAULT_OUT_ENDPOINT,
            timeout: DEFAULT_TIMEOUT,
            prime: variant.needs_priming(),
            fail_fast: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.frame_len > 0, "frame length must not be zero");
        ensure!(self.batch_len > 0, "batch length must not be zero");
        ensure!(
            self.in_endpoint & 0x80 != 0,
            "endpoint {:#04x} is not an IN endpoint",
            self.in_endpoint
        );
        if self.prime {
            ensure!(
                self.out_endpoint & 0x80 == 0,
                "endpoint {:#04x} is not an OUT endpoint",
                self.out_endpoint
            );
        }
        self.layout.validate(self.frame_len)
    }
}
