use std::time::{Duration, Instant};

/// An open batch. Created by `ThroughputMeter::start_batch`, closed by
/// `ThroughputMeter::finish_batch`.
#[derive(Debug)]
pub struct BatchHandle {
    started: Instant,
    frames: u32,
    bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughputSample {
    pub batch_size: u32,
    pub bytes: u64,
    pub elapsed: Duration,
    /// `None` when the batch recorded no frames.
    pub avg_latency: Option<Duration>,
}

impl ThroughputSample {
    pub fn bytes_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0. {
            Some(self.bytes as f64 / secs)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct ThroughputMeter {
    batches: u64,
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_batch(&mut self) -> BatchHandle {
        BatchHandle {
            started: Instant::now(),
            frames: 0,
            bytes: 0,
        }
    }

    pub fn record(&self, handle: &mut BatchHandle, bytes: usize) {
        handle.frames += 1;
        handle.bytes += bytes as u64;
    }

    pub fn finish_batch(&mut self, handle: BatchHandle) -> ThroughputSample {
        let elapsed = handle.started.elapsed();
        self.batches += 1;

        let avg_latency = if handle.frames == 0 {
            None
        } else {
            Some(elapsed / handle.frames)
        };

        ThroughputSample {
            batch_size: handle.frames,
            bytes: handle.bytes,
            elapsed,
            avg_latency,
        }
    }

    /// Number of batches finished so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }
}
