//! Intel HEX decoding.
//!
//! The decoder walks the text one line at a time. The only state carried from
//! line to line is the extended address offset set by record types 02 and 04;
//! it is threaded through the loop as an explicit accumulator so decoding is
//! reentrant.

use std::collections::BTreeMap;

use ihex::Record;

use crate::error::{RecordFault, StampError};
use crate::layout::AddressRange;

/// Address-indexed bytes decoded from a hex stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteStream {
    bytes: BTreeMap<u64, u8>,
}

impl ByteStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: u64) -> Option<u8> {
        self.bytes.get(&address).copied()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes recorded in `range`, in ascending address order.
    pub fn range(&self, range: AddressRange) -> impl Iterator<Item = (u64, u8)> + '_ {
        self.bytes.range(range.start..range.end).map(|(a, b)| (*a, *b))
    }

    /// Records `byte` at `address`, returning the value it replaced.
    pub fn insert(&mut self, address: u64, byte: u8) -> Option<u8> {
        self.bytes.insert(address, byte)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Reject records whose trailing checksum byte does not match.
    pub verify_checksums: bool,
}

/// Which addresses the decoder keeps.
#[derive(Debug, Clone, Copy)]
pub enum Filter<'a> {
    All,
    Ranges(&'a [AddressRange]),
}

impl Filter<'_> {
    fn keeps(&self, address: u64) -> bool {
        match self {
            Filter::All => true,
            Filter::Ranges(ranges) => ranges.iter().any(|r| r.contains(address)),
        }
    }
}

struct DecodeState {
    address_offset: u64,
    stream: ByteStream,
    records: usize,
    finished: bool,
}

/// Decodes `text` into a [`ByteStream`], keeping only bytes accepted by `filter`.
///
/// Decoding stops at the first end-of-file record. Blank lines are skipped.
pub fn decode(text: &str, filter: Filter<'_>, options: DecodeOptions) -> Result<ByteStream, StampError> {
    let initial = DecodeState {
        address_offset: 0,
        stream: ByteStream::new(),
        records: 0,
        finished: false,
    };

    let state = text
        .lines()
        .enumerate()
        .try_fold(initial, |mut state, (index, line)| {
            let line = line.trim();
            if state.finished || line.is_empty() {
                return Ok(state);
            }
            let record = parse_record(line, options).map_err(|fault| StampError::MalformedRecord {
                line: index + 1,
                fault,
            })?;
            state.records += 1;
            apply(&mut state, record, filter);
            Ok::<_, StampError>(state)
        })?;

    tracing::debug!(
        "decoded {} records, kept {} bytes",
        state.records,
        state.stream.len()
    );
    if !state.finished {
        tracing::warn!("hex stream has no end-of-file record");
    }
    Ok(state.stream)
}

fn apply(state: &mut DecodeState, record: Record, filter: Filter<'_>) {
    match record {
        Record::Data { offset, value } => {
            let base = state.address_offset + u64::from(offset);
            for (i, byte) in value.into_iter().enumerate() {
                let address = base + i as u64;
                if !filter.keeps(address) {
                    continue;
                }
                if let Some(previous) = state.stream.insert(address, byte) {
                    tracing::warn!(
                        "address {:#010x} written twice ({:#04x} replaced by {:#04x})",
                        address,
                        previous,
                        byte
                    );
                }
            }
        }
        Record::ExtendedSegmentAddress(segment) => {
            state.address_offset = u64::from(segment) * 16;
            tracing::trace!("segment offset {:#010x}", state.address_offset);
        }
        Record::ExtendedLinearAddress(upper) => {
            state.address_offset = u64::from(upper) << 16;
            tracing::trace!("linear offset {:#010x}", state.address_offset);
        }
        Record::EndOfFile => state.finished = true,
        Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {}
    }
}

/// Parses one `:BBAAAATTDD..DDCC` line.
pub fn parse_record(line: &str, options: DecodeOptions) -> Result<Record, RecordFault> {
    let digits = line.strip_prefix(':').ok_or(RecordFault::MissingStartCode)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RecordFault::InvalidCharacters);
    }
    if digits.len() % 2 != 0 {
        return Err(RecordFault::OddLength);
    }
    let bytes = (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| RecordFault::InvalidCharacters)?;

    // count, address (2), type, checksum
    if bytes.len() < 5 {
        return Err(RecordFault::TooShort);
    }
    let declared = usize::from(bytes[0]);
    let payload = &bytes[4..bytes.len() - 1];
    if payload.len() != declared {
        return Err(RecordFault::ByteCountMismatch {
            declared,
            actual: payload.len(),
        });
    }

    let (body, found) = bytes.split_at(bytes.len() - 1);
    if options.verify_checksums {
        let expected = ihex::checksum(body);
        if expected != found[0] {
            return Err(RecordFault::ChecksumMismatch {
                found: found[0],
                expected,
            });
        }
    }

    let address = u16::from_be_bytes([bytes[1], bytes[2]]);
    let record_type = bytes[3];
    let expect_len = |expected: usize| {
        if payload.len() == expected {
            Ok(())
        } else {
            Err(RecordFault::PayloadLength {
                record_type,
                expected,
                actual: payload.len(),
            })
        }
    };

    match record_type {
        0x00 => Ok(Record::Data {
            offset: address,
            value: payload.to_vec(),
        }),
        0x01 => {
            expect_len(0)?;
            Ok(Record::EndOfFile)
        }
        0x02 => {
            expect_len(2)?;
            Ok(Record::ExtendedSegmentAddress(u16::from_be_bytes([
                payload[0], payload[1],
            ])))
        }
        0x03 => {
            expect_len(4)?;
            Ok(Record::StartSegmentAddress {
                cs: u16::from_be_bytes([payload[0], payload[1]]),
                ip: u16::from_be_bytes([payload[2], payload[3]]),
            })
        }
        0x04 => {
            expect_len(2)?;
            Ok(Record::ExtendedLinearAddress(u16::from_be_bytes([
                payload[0], payload[1],
            ])))
        }
        0x05 => {
            expect_len(4)?;
            Ok(Record::StartLinearAddress(u32::from_be_bytes([
                payload[0], payload[1], payload[2], payload[3],
            ])))
        }
        other => Err(RecordFault::UnsupportedType(other)),
    }
}
