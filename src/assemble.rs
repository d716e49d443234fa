//! Range assembly.
//!
//! Concatenates the bytes of several address ranges in the order the caller
//! gives them. The order is part of the checksum's definition.

use crate::error::StampError;
use crate::hex::ByteStream;
use crate::layout::AddressRange;

/// Appends the bytes of each range, in range order, to one buffer.
///
/// Every address inside every range must have been decoded; a hole means the
/// hex image does not match the layout the symbols describe.
pub fn assemble(stream: &ByteStream, ranges: &[AddressRange]) -> Result<Vec<u8>, StampError> {
    let mut out = Vec::new();
    for &range in ranges {
        if range.start > range.end {
            return Err(StampError::InvalidRange { range });
        }
        let mut expected = range.start;
        for (address, byte) in stream.range(range) {
            if address != expected {
                return Err(StampError::GapInRange { range, address: expected });
            }
            out.push(byte);
            expected += 1;
        }
        if expected != range.end {
            return Err(StampError::GapInRange { range, address: expected });
        }
        tracing::debug!("assembled {} ({} bytes)", range, range.len());
    }
    Ok(out)
}
