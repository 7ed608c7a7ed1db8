use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::decoder::{decode, DecodeError, DecodedRecord};
use crate::meter::{ThroughputMeter, ThroughputSample};
use crate::transport::{Transport, TransportError};
use crate::validator::{Anomaly, Classification, SequenceValidator, Verdict};
use failure::Fail;
use log::{debug, info, trace, warn};

/// Asks a running session to stop. The session looks at it between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Fail)]
pub enum SessionError {
    #[fail(display = "{}", _0)]
    Transport(#[cause] TransportError),

    #[fail(display = "{}", _0)]
    Decode(#[cause] DecodeError),

    #[fail(display = "{:?} at counter {} (expected {})", anomaly, counter, expected)]
    Sequence {
        anomaly: Anomaly,
        counter: u32,
        expected: u32,
    },
}

impl SessionError {
    /// libusb-style code for the process exit status.
    pub fn code(&self) -> i32 {
        match self {
            Self::Transport(err) => err.code(),
            Self::Decode(_) | Self::Sequence { .. } => -1,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Transport(err)
    }
}

impl From<DecodeError> for SessionError {
    fn from(err: DecodeError) -> Self {
        SessionError::Decode(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub index: u64,
    pub sample: ThroughputSample,
    /// Errors since the session started.
    pub error_count: u64,
    pub records: u64,
    pub idle_records: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The first real counter of the session.
    Baseline { counter: u32 },
    Anomaly {
        anomaly: Anomaly,
        counter: u32,
        expected: u32,
        error_count: u64,
        /// Status byte of the offending record, if the layout has one.
        status: Option<u8>,
    },
    Batch(BatchReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub batches: u64,
    pub frames: u64,
    pub error_count: u64,
    pub last_counter: Option<u32>,
    /// Whether the run ended because of the cancel token.
    pub cancelled: bool,
}

/// One diagnostic run over the device's streaming endpoint.
pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    validator: SequenceValidator,
    meter: ThroughputMeter,
    buf: Vec<u8>,
    frames: u64,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: SessionConfig) -> crate::Result<Self> {
        config.validate()?;

        Ok(Self {
            transport,
            validator: SequenceValidator::for_layout(&config.layout),
            meter: ThroughputMeter::new(),
            buf: vec![0u8; config.frame_len],
            frames: 0,
            config,
        })
    }

    fn prime(&mut self) -> Result<(), SessionError> {
        let command = vec![0u8; self.config.frame_len];
        let written =
            self.transport
                .write(self.config.out_endpoint, &command, self.config.timeout)?;
        if written < command.len() {
            return Err(TransportError::ShortWrite {
                expected: command.len(),
                transferred: written,
            }
            .into());
        }
        info!("acquisition started");
        Ok(())
    }

    fn check(
        &mut self,
        record: &DecodedRecord,
        verdict: Verdict,
        on_event: &mut impl FnMut(&Event),
    ) -> Result<(), SessionError> {
        match verdict.classification {
            Classification::Baseline => {
                info!("started receiving data at counter {}", verdict.counter);
                on_event(&Event::Baseline {
                    counter: verdict.counter,
                });
            }
            Classification::Valid => {}
            Classification::Error(anomaly) => {
                let expected = verdict.expected.unwrap_or_default();
                warn!(
                    "{:?} at counter {} (expected {}), {} errors so far",
                    anomaly, verdict.counter, expected, verdict.error_count
                );
                on_event(&Event::Anomaly {
                    anomaly,
                    counter: verdict.counter,
                    expected,
                    error_count: verdict.error_count,
                    status: record.status,
                });
                if self.config.fail_fast {
                    return Err(SessionError::Sequence {
                        anomaly,
                        counter: verdict.counter,
                        expected,
                    });
                }
            }
        }
        Ok(())
    }

    fn run_batch(
        &mut self,
        index: u64,
        on_event: &mut impl FnMut(&Event),
    ) -> Result<(), SessionError> {
        let frame_len = self.config.frame_len;
        let mut records = 0;
        let mut idle_records = 0;

        info!("starting read batch {}", index);
        let mut batch = self.meter.start_batch();
        for _ in 0..self.config.batch_len {
            let transferred =
                self.transport
                    .read(self.config.in_endpoint, &mut self.buf, self.config.timeout)?;
            if transferred < frame_len {
                return Err(TransportError::ShortRead {
                    expected: frame_len,
                    transferred,
                }
                .into());
            }
            self.frames += 1;

            let decoded = decode(&self.buf, &self.config.layout)?;
            for record in decoded {
                records += 1;
                match self.validator.observe(&record) {
                    Some(verdict) => {
                        trace!(
                            "slot {}: counter {} status {:?}",
                            record.index,
                            record.counter,
                            record.status
                        );
                        self.check(&record, verdict, &mut *on_event)?;
                    }
                    None => {
                        trace!("slot {}: idle", record.index);
                        idle_records += 1;
                    }
                }
            }
            self.meter.record(&mut batch, transferred);
        }
        let sample = self.meter.finish_batch(batch);
        debug!("last frame: {:02x?}", &self.buf[..]);

        on_event(&Event::Batch(BatchReport {
            index,
            sample,
            error_count: self.validator.error_count(),
            records,
            idle_records,
        }));
        Ok(())
    }

    /// Reads batches until `cancel` is set or the configured number of
    /// batches is done.
    ///
    /// Transport and decode failures end the run immediately. The transport is
    /// dropped on return either way.
    pub fn run<F: FnMut(&Event)>(
        mut self,
        cancel: &CancelToken,
        mut on_event: F,
    ) -> Result<SessionSummary, SessionError> {
        if self.config.prime {
            self.prime()?;
        }

        let mut cancelled = false;
        loop {
            let batches = self.meter.batches();
            if self.config.max_batches.map_or(false, |max| batches >= max) {
                break;
            }
            if cancel.is_cancelled() {
                info!("cancelled after {} batches", batches);
                cancelled = true;
                break;
            }

            self.run_batch(batches, &mut on_event)?;
        }

        Ok(SessionSummary {
            batches: self.meter.batches(),
            frames: self.frames,
            error_count: self.validator.error_count(),
            last_counter: self.validator.last_counter(),
            cancelled,
        })
    }
}
