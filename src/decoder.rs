use crate::layout::{Endianness, FrameLayout};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use failure::Fail;

#[derive(Debug, Clone, PartialEq, Eq, Fail)]
pub enum DecodeError {
    #[fail(display = "frame of {} bytes is truncated, need at least {}", len, needed)]
    Truncated { len: usize, needed: usize },

    #[fail(display = "unsupported counter width of {} bytes", width)]
    UnsupportedWidth { width: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Position of the sub-record within its frame.
    pub index: usize,
    pub counter: u32,
    pub status: Option<u8>,
    pub is_idle: bool,
}

fn read_counter(bytes: &[u8], width: usize, endianness: Endianness) -> u32 {
    match (width, endianness) {
        (1, _) => bytes[0] as u32,
        (2, Endianness::Little) => LittleEndian::read_u16(bytes) as u32,
        (2, Endianness::Big) => BigEndian::read_u16(bytes) as u32,
        (4, Endianness::Little) => LittleEndian::read_u32(bytes),
        (4, Endianness::Big) => BigEndian::read_u32(bytes),
        _ => unreachable!("counter width is checked in decode"),
    }
}

fn decode_record(record: &[u8], index: usize, layout: &FrameLayout) -> DecodedRecord {
    let start = layout.counter_offset;
    let counter = read_counter(
        &record[start..start + layout.counter_width],
        layout.counter_width,
        layout.counter_endianness,
    );
    let status = layout.status_offset.map(|offset| record[offset]);

    DecodedRecord {
        index,
        counter,
        status,
        is_idle: layout.idle_sentinel == Some(counter),
    }
}

/// Splits a raw frame into its records, in the order they were sampled.
///
/// The layout and length are checked here even though the session validates
/// its layout and the transport already refuses short transfers.
pub fn decode(raw: &[u8], layout: &FrameLayout) -> Result<Vec<DecodedRecord>, DecodeError> {
    if ![1, 2, 4].contains(&layout.counter_width) {
        return Err(DecodeError::UnsupportedWidth {
            width: layout.counter_width,
        });
    }

    let needed = if layout.stride > 0 {
        layout.stride.max(layout.record_len())
    } else {
        layout.record_len()
    };
    if raw.len() < needed {
        return Err(DecodeError::Truncated {
            len: raw.len(),
            needed,
        });
    }

    if layout.stride == 0 {
        return Ok(vec![decode_record(raw, 0, layout)]);
    }
    if layout.stride < layout.record_len() {
        return Err(DecodeError::Truncated {
            len: layout.stride,
            needed: layout.record_len(),
        });
    }

    Ok(raw
        .chunks_exact(layout.stride)
        .enumerate()
        .map(|(index, record)| decode_record(record, index, layout))
        .collect())
}
