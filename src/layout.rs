//! Memory layout types.
//!
//! Sections describe how virtual addresses map onto the bytes of the object
//! file. Address ranges describe which parts of the future flash image are
//! covered by the checksum.

use std::fmt;

use crate::error::StampError;

/// A file-backed section of the object file.
///
/// Within a section the mapping from virtual address to file offset is affine:
/// `file_offset + (addr - virtual_address)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name, for diagnostics only.
    pub name: String,
    /// The address the section occupies at runtime.
    pub virtual_address: u64,
    /// The byte position of the section's contents in the object file.
    pub file_offset: u64,
    /// Size of the section in bytes.
    pub size: u64,
}

impl Section {
    pub fn contains(&self, address: u64, len: u64) -> bool {
        let Some(end) = address.checked_add(len) else {
            return false;
        };
        address >= self.virtual_address && end <= self.virtual_address.saturating_add(self.size)
    }
}

/// The ordered section list of an object file.
#[derive(Debug, Clone, Default)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Maps a virtual address to its file offset.
    pub fn file_offset(&self, address: u64) -> Result<u64, StampError> {
        self.file_offset_for(address, 1)
    }

    /// Maps `len` bytes starting at `address` to a file offset. The whole
    /// window must lie inside one section; the first such section wins.
    pub fn file_offset_for(&self, address: u64, len: u64) -> Result<u64, StampError> {
        self.sections
            .iter()
            .find(|s| s.contains(address, len.max(1)))
            .map(|s| s.file_offset + (address - s.virtual_address))
            .ok_or(StampError::UnmappedAddress { address, len })
    }
}

/// A half-open address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
}

impl AddressRange {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, address: u64) -> bool {
        self.start <= address && address < self.end
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}, {:#010x})", self.start, self.end)
    }
}

/// A checksummed range described by its two boundary symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    pub start_symbol: String,
    pub end_symbol: String,
}

impl RangeSpec {
    pub fn new(start_symbol: &str, end_symbol: &str) -> Self {
        Self {
            start_symbol: start_symbol.to_string(),
            end_symbol: end_symbol.to_string(),
        }
    }
}

/// The ranges fed to the checksum, in checksum order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePlan {
    pub ranges: Vec<RangeSpec>,
}

impl Default for RangePlan {
    /// Interrupt vector table, application code, then the ROM copy of the
    /// initialized data.
    fn default() -> Self {
        Self {
            ranges: vec![
                RangeSpec::new("FLASH_START", "__CRC_IVT_END"),
                RangeSpec::new("__CRC_APP_START", "__ROM_CRC_END"),
                RangeSpec::new("__DATA_ROM_START", "__USED_FLASH_END"),
            ],
        }
    }
}
