use failure::Fail;
use std::time::Duration;

/// The step of device setup that failed, reported with `TransportError::Config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    DetachKernelDriver,
    SetConfiguration,
    ClaimInterface,
}

impl std::fmt::Display for SetupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::DetachKernelDriver => "detach kernel driver",
            Self::SetConfiguration => "set configuration",
            Self::ClaimInterface => "claim interface",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Fail)]
pub enum TransportError {
    #[fail(display = "no device with VID {:#06x} and PID {:#06x} was found", vid, pid)]
    NotFound { vid: u16, pid: u16 },

    #[fail(display = "{} failed with error {}", stage, code)]
    Config { stage: SetupStage, code: i32 },

    #[fail(display = "short read: got {} of {} bytes", transferred, expected)]
    ShortRead { expected: usize, transferred: usize },

    #[fail(display = "short write: sent {} of {} bytes", transferred, expected)]
    ShortWrite { expected: usize, transferred: usize },

    #[fail(display = "transfer error {}", code)]
    Io { code: i32 },

    #[fail(display = "transfer timed out")]
    Timeout,
}

/// libusb's LIBUSB_ERROR_TIMEOUT
pub const TIMEOUT_CODE: i32 = -7;

impl TransportError {
    /// The libusb-style (negative) error code, if the failure came from the
    /// transfer layer. Short transfers report -1 like the C clients did.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => -5,
            Self::Config { code, .. } | Self::Io { code } => *code,
            Self::ShortRead { .. } | Self::ShortWrite { .. } => -1,
            Self::Timeout => TIMEOUT_CODE,
        }
    }
}

/// Blocking, single-frame transfers on one device.
///
/// Implementations return the number of bytes actually transferred; checking
/// that against the requested length is left to the caller. No two transfers
/// are ever in flight at the same time.
pub trait Transport {
    fn read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError>;

    fn write(
        &mut self,
        endpoint: u8,
        buf: &[u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError> {
        (**self).read(endpoint, buf, timeout)
    }

    fn write(
        &mut self,
        endpoint: u8,
        buf: &[u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransportError> {
        (**self).write(endpoint, buf, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_transfers_report_generic_failure() {
        let err = TransportError::ShortRead {
            expected: 64,
            transferred: 12,
        };
        assert_eq!(err.code(), -1);
        assert_eq!(err.to_string(), "short read: got 12 of 64 bytes");
    }

    #[test]
    fn config_errors_keep_their_code() {
        let err = TransportError::Config {
            stage: SetupStage::ClaimInterface,
            code: -6,
        };
        assert_eq!(err.code(), -6);
        assert_eq!(err.to_string(), "claim interface failed with error -6");
    }

    #[test]
    fn not_found_names_the_device() {
        let err = TransportError::NotFound {
            vid: 0x03eb,
            pid: 0x204f,
        };
        assert_eq!(
            err.to_string(),
            "no device with VID 0x03eb and PID 0x204f was found"
        );
    }
}
