//! In-process ELF to Intel HEX conversion.
//!
//! Every `PT_LOAD` segment with file contents is emitted at its physical
//! address, which is where the bytes live in non-volatile memory. Initialized
//! data therefore shows up at its ROM load address, not at its RAM address.

use std::path::Path;

use ihex::Record;
use object::elf::{FileHeader32, FileHeader64, PT_LOAD};
use object::read::elf::{ElfFile, FileHeader, ProgramHeader};
use object::{Endianness, FileKind};

use super::HexConverter;
use crate::error::StampError;

/// Data bytes per hex record, as `objcopy` writes them.
const RECORD_LEN: usize = 16;

/// Builtin converter reading ELF program headers with the `object` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElfToHex;

impl HexConverter for ElfToHex {
    fn name(&self) -> &str {
        "builtin"
    }

    fn convert(&self, object: &Path, hex_out: &Path) -> Result<String, StampError> {
        let data = std::fs::read(object).map_err(StampError::io(object))?;
        let segments = load_segments(object, &data)?;
        let text = to_hex(&segments)?;
        std::fs::write(hex_out, &text).map_err(StampError::io(hex_out))?;
        Ok(text)
    }
}

/// File-backed contents of one loadable segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSegment {
    /// Physical (load) address.
    pub address: u64,
    pub data: Vec<u8>,
}

/// Extracts the loadable segments of an ELF file, sorted by load address.
pub fn load_segments(path: &Path, data: &[u8]) -> Result<Vec<LoadSegment>, StampError> {
    let kind = FileKind::parse(data).map_err(|source| StampError::ObjectParse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut segments = match kind {
        FileKind::Elf32 => segments_of::<FileHeader32<Endianness>>(path, data)?,
        FileKind::Elf64 => segments_of::<FileHeader64<Endianness>>(path, data)?,
        kind => {
            return Err(StampError::Conversion(format!(
                "{} is not an ELF file ({:?})",
                path.display(),
                kind
            )))
        }
    };

    if segments.is_empty() {
        return Err(StampError::Conversion(format!(
            "{} has no loadable segments",
            path.display()
        )));
    }
    segments.sort_by_key(|s| s.address);
    Ok(segments)
}

fn segments_of<Elf: FileHeader<Endian = Endianness>>(
    path: &Path,
    data: &[u8],
) -> Result<Vec<LoadSegment>, StampError> {
    let elf = ElfFile::<Elf>::parse(data).map_err(|source| StampError::ObjectParse {
        path: path.to_path_buf(),
        source,
    })?;
    let endian = elf.endian();

    let mut segments = Vec::new();
    for header in elf.elf_program_headers() {
        if header.p_type(endian) != PT_LOAD {
            continue;
        }
        let bytes = header
            .data(endian, data)
            .map_err(|_| {
                StampError::Conversion(format!(
                    "segment contents of {} lie outside the file",
                    path.display()
                ))
            })?;
        if bytes.is_empty() {
            continue;
        }
        let address: u64 = header.p_paddr(endian).into();
        tracing::debug!(
            "loadable segment at {:#010x} ({} bytes)",
            address,
            bytes.len()
        );
        segments.push(LoadSegment {
            address,
            data: bytes.to_vec(),
        });
    }
    Ok(segments)
}

/// Serializes segments as Intel HEX with 32-bit linear addressing.
///
/// No data record crosses a 64 KiB boundary, and an extended linear address
/// record precedes the first record of every 64 KiB page.
pub fn to_hex(segments: &[LoadSegment]) -> Result<String, StampError> {
    let mut records = Vec::new();
    let mut page = None;

    for segment in segments {
        let end = segment.address.checked_add(segment.data.len() as u64);
        if end.map_or(true, |end| end > u64::from(u32::MAX) + 1) {
            return Err(StampError::Conversion(format!(
                "segment at {:#x} does not fit in 32-bit addressing",
                segment.address
            )));
        }

        let mut address = segment.address;
        let mut rest = segment.data.as_slice();
        while !rest.is_empty() {
            let upper = (address >> 16) as u16;
            if page != Some(upper) {
                records.push(Record::ExtendedLinearAddress(upper));
                page = Some(upper);
            }
            let to_page_end = (0x1_0000 - (address & 0xFFFF)) as usize;
            let n = rest.len().min(RECORD_LEN).min(to_page_end);
            records.push(Record::Data {
                offset: (address & 0xFFFF) as u16,
                value: rest[..n].to_vec(),
            });
            address += n as u64;
            rest = &rest[n..];
        }
    }
    records.push(Record::EndOfFile);

    ihex::create_object_file_representation(&records)
        .map_err(|e| StampError::Conversion(format!("cannot encode hex records: {:?}", e)))
}
