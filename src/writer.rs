//! In-place patching of the object file.
//!
//! Resolution happens against a read-only mapping which is dropped before the
//! file is reopened for writing, so the two accesses never overlap.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::StampError;
use crate::symbol::ObjectImage;

/// Size of the stamped value in bytes.
pub const STAMP_SIZE: u64 = 4;

/// Where a stamp lives in the object file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampLocation {
    pub symbol_address: u64,
    pub file_offset: u64,
}

/// Resolves `symbol` to the file offset of its 4-byte stamp.
pub fn locate(image: &ObjectImage, symbol: &str) -> Result<StampLocation, StampError> {
    let symbol_address = image.resolve(symbol)?;
    let file_offset = image.sections.file_offset_for(symbol_address, STAMP_SIZE)?;
    Ok(StampLocation {
        symbol_address,
        file_offset,
    })
}

/// Reads the little-endian value currently stored at `symbol`.
pub fn read_stamp(path: &Path, symbol: &str) -> Result<u32, StampError> {
    let location = locate(&ObjectImage::load(path)?, symbol)?;
    let mut file = File::open(path).map_err(StampError::io(path))?;
    read_at(&mut file, path, location.file_offset)
}

/// Overwrites the 4 bytes at `symbol` with `value` in little-endian order.
///
/// Returns the location written and the value it replaced. No other byte of
/// the file is touched.
pub fn patch(path: &Path, symbol: &str, value: u32) -> Result<(StampLocation, u32), StampError> {
    let location = locate(&ObjectImage::load(path)?, symbol)?;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(StampError::io(path))?;
    let previous = read_at(&mut file, path, location.file_offset)?;

    file.seek(SeekFrom::Start(location.file_offset))
        .map_err(StampError::io(path))?;
    file.write_all(&value.to_le_bytes())
        .map_err(StampError::io(path))?;
    file.sync_all().map_err(StampError::io(path))?;

    tracing::info!(
        "wrote {:#010x} to {} at file offset {:#x} (was {:#010x})",
        value,
        symbol,
        location.file_offset,
        previous
    );
    Ok((location, previous))
}

fn read_at(file: &mut File, path: &Path, offset: u64) -> Result<u32, StampError> {
    let mut buf = [0u8; STAMP_SIZE as usize];
    file.seek(SeekFrom::Start(offset))
        .map_err(StampError::io(path))?;
    file.read_exact(&mut buf).map_err(StampError::io(path))?;
    Ok(u32::from_le_bytes(buf))
}
