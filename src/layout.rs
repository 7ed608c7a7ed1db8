use crate::Result;
use failure::{ensure, format_err};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Where the sequence counter (and optionally a status byte) lives inside a
/// frame.
///
/// With `stride == 0` a frame carries exactly one record. Otherwise the frame
/// is split into `len / stride` sub-records, each holding its own counter at
/// the same relative offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub counter_width: usize,
    pub counter_endianness: Endianness,
    pub counter_offset: usize,
    pub status_offset: Option<usize>,
    pub stride: usize,
    /// Counter value marking an empty slot. Such records carry no sequence
    /// information.
    pub idle_sentinel: Option<u32>,
}

impl FrameLayout {
    /// 512 byte frames made of eight 64 byte sub-frames. Byte 0 of each is an
    /// 8 bit counter (0 = empty slot), byte 1 the device's free buffer count.
    pub fn multi_channel() -> Self {
        Self {
            counter_width: 1,
            counter_endianness: Endianness::Little,
            counter_offset: 0,
            status_offset: Some(1),
            stride: 64,
            idle_sentinel: Some(0),
        }
    }

    /// One little endian 16 bit counter at the start of each frame. Every
    /// value including 0 is a real sample.
    pub fn counter16() -> Self {
        Self {
            counter_width: 2,
            counter_endianness: Endianness::Little,
            counter_offset: 0,
            status_offset: None,
            stride: 0,
            idle_sentinel: None,
        }
    }

    pub fn counter8() -> Self {
        Self {
            counter_width: 1,
            counter_endianness: Endianness::Little,
            counter_offset: 0,
            status_offset: None,
            stride: 0,
            idle_sentinel: None,
        }
    }

    /// Largest value the counter field can hold; the counter wraps after it.
    pub fn max_counter(&self) -> u32 {
        match self.counter_width {
            1 => u8::max_value() as u32,
            2 => u16::max_value() as u32,
            _ => u32::max_value(),
        }
    }

    /// The value a counter wraps to. A sentinel of 0 takes 0 out of the
    /// sequence, so such streams count 1..=max.
    pub fn min_counter(&self) -> u32 {
        match self.idle_sentinel {
            Some(0) => 1,
            _ => 0,
        }
    }

    /// Bytes a single record needs to hold every configured field.
    pub fn record_len(&self) -> usize {
        let counter_end = self.counter_offset + self.counter_width;
        match self.status_offset {
            Some(status) => counter_end.max(status + 1),
            None => counter_end,
        }
    }

    pub fn validate(&self, frame_len: usize) -> Result<()> {
        ensure!(
            [1, 2, 4].contains(&self.counter_width),
            "counter width must be 1, 2 or 4 bytes, not {}",
            self.counter_width
        );
        ensure!(
            frame_len >= self.record_len(),
            "frames of {} bytes cannot hold a {} byte record",
            frame_len,
            self.record_len()
        );
        if self.stride > 0 {
            ensure!(
                self.stride >= self.record_len(),
                "stride {} is smaller than the {} byte record",
                self.stride,
                self.record_len()
            );
            ensure!(
                frame_len % self.stride == 0,
                "frame length {} is not a multiple of stride {}",
                frame_len,
                self.stride
            );
        }
        if let Some(sentinel) = self.idle_sentinel {
            ensure!(
                sentinel <= self.max_counter(),
                "idle sentinel {} does not fit in the counter",
                sentinel
            );
        }
        Ok(())
    }
}

/// The device firmware variants this tool knows how to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    MultiChannel,
    Counter16,
    Timed8,
}

impl Variant {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "multi-channel" => Ok(Self::MultiChannel),
            "counter16" => Ok(Self::Counter16),
            "timed8" => Ok(Self::Timed8),
            _ => Err(format_err!("Unknown device variant {}", name)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MultiChannel => "multi-channel",
            Self::Counter16 => "counter16",
            Self::Timed8 => "timed8",
        }
    }

    pub fn frame_len(&self) -> usize {
        match self {
            Self::MultiChannel => 512,
            Self::Counter16 => 64,
            Self::Timed8 => 8,
        }
    }

    pub fn layout(&self) -> FrameLayout {
        match self {
            Self::MultiChannel => FrameLayout::multi_channel(),
            Self::Counter16 => FrameLayout::counter16(),
            Self::Timed8 => FrameLayout::counter8(),
        }
    }

    /// Reads per batch the firmware test clients used.
    pub fn batch_len(&self) -> u32 {
        match self {
            Self::MultiChannel | Self::Counter16 => 60000,
            Self::Timed8 => 100,
        }
    }

    /// Whether the firmware waits for a zeroed command frame before streaming.
    pub fn needs_priming(&self) -> bool {
        match self {
            Self::MultiChannel => true,
            Self::Counter16 | Self::Timed8 => false,
        }
    }
}
