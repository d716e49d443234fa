//! Stamping pipeline.
//!
//! This module contains the `Stamper` which runs the whole process in a fixed
//! order:
//! 1. Symbol resolution: boundary symbols and the checksum slot.
//! 2. Conversion: the object file is written out as Intel HEX.
//! 3. Decoding and assembly of the checksummed ranges, in plan order.
//! 4. Word byte-order normalization and CRC computation.
//! 5. Patching the CRC into the original object file (or, in check mode,
//!    comparing it with the stored value).
//!
//! Any failure aborts the run. The object file is only written in the last
//! step, so a failure anywhere before it leaves the file untouched.

use std::path::Path;

use crate::assemble::assemble;
use crate::checksum::{checksum, DEFAULT_MASK};
use crate::convert::HexConverter;
use crate::endian::{to_little_endian_words, PartialWord};
use crate::error::{PipelineError, Stage, StageExt, StampError};
use crate::hex::{self, DecodeOptions, Filter};
use crate::layout::{AddressRange, RangePlan, RangeSpec};
use crate::symbol::ObjectImage;
use crate::writer::{self, StampLocation};

/// Symbol whose 4 bytes receive the checksum.
pub const CHECKSUM_SYMBOL: &str = "__checksum_result";

/// Initialized data: its RAM location and its ROM image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataCopy {
    pub ram: RangeSpec,
    pub rom: RangeSpec,
}

impl Default for DataCopy {
    fn default() -> Self {
        Self {
            ram: RangeSpec::new("__DATA_RAM", "__data_end__"),
            rom: RangeSpec::new("__DATA_ROM_START", "__USED_FLASH_END"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StampOptions {
    pub checksum_symbol: String,
    pub plan: RangePlan,
    /// Cross-checked against the plan; `None` skips the check.
    pub data_copy: Option<DataCopy>,
    pub mask: u32,
    pub decode: DecodeOptions,
    pub partial_word: PartialWord,
    /// Compare instead of patching.
    pub check_only: bool,
}

impl Default for StampOptions {
    fn default() -> Self {
        Self {
            checksum_symbol: CHECKSUM_SYMBOL.to_string(),
            plan: RangePlan::default(),
            data_copy: Some(DataCopy::default()),
            mask: DEFAULT_MASK,
            decode: DecodeOptions::default(),
            partial_word: PartialWord::Reject,
            check_only: false,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampReport {
    pub checksum: u32,
    /// The value stored at the checksum symbol before this run.
    pub previous: u32,
    pub location: StampLocation,
    /// Checksummed ranges, in checksum order.
    pub ranges: Vec<AddressRange>,
    /// Number of bytes fed to the CRC.
    pub byte_count: usize,
    /// Whether the object file was written.
    pub patched: bool,
}

pub struct Stamper<C: HexConverter> {
    converter: C,
    options: StampOptions,
}

impl<C: HexConverter> Stamper<C> {
    pub fn new(converter: C, options: StampOptions) -> Self {
        Self { converter, options }
    }

    /// Runs the pipeline on `object`, writing the intermediate hex to `hex_out`.
    pub fn run(&self, object: &Path, hex_out: &Path) -> Result<StampReport, PipelineError> {
        let symbol = self.options.checksum_symbol.as_str();

        // The read-only view is dropped at the end of this block.
        let (ranges, location) = {
            let image = ObjectImage::load(object).stage(Stage::Resolve)?;
            let ranges = self.resolve_ranges(&image).stage(Stage::Resolve)?;
            if let Some(copy) = &self.options.data_copy {
                check_data_copy(&image, copy).stage(Stage::Resolve)?;
            }
            let location = writer::locate(&image, symbol).stage(Stage::Resolve)?;
            (ranges, location)
        };

        tracing::info!(
            "converting {} to {} ({})",
            object.display(),
            hex_out.display(),
            self.converter.name()
        );
        let text = self
            .converter
            .convert(object, hex_out)
            .stage(Stage::Convert)?;

        let stream = hex::decode(&text, Filter::Ranges(&ranges), self.options.decode)
            .stage(Stage::Decode)?;
        let bytes = assemble(&stream, &ranges).stage(Stage::Assemble)?;
        let words =
            to_little_endian_words(&bytes, self.options.partial_word).stage(Stage::Normalize)?;
        let crc = checksum(&words, self.options.mask);
        tracing::info!("checksum over {} bytes: {:#010x}", words.len(), crc);

        let mut report = StampReport {
            checksum: crc,
            previous: 0,
            location,
            ranges,
            byte_count: words.len(),
            patched: false,
        };

        if self.options.check_only {
            let stored = writer::read_stamp(object, symbol).stage(Stage::Verify)?;
            if stored != crc {
                return Err(PipelineError {
                    stage: Stage::Verify,
                    source: StampError::ChecksumMismatch {
                        stored,
                        computed: crc,
                    },
                });
            }
            tracing::info!("stored checksum matches");
            report.previous = stored;
            return Ok(report);
        }

        let (location, previous) = writer::patch(object, symbol, crc).stage(Stage::Patch)?;
        report.location = location;
        report.previous = previous;
        report.patched = true;
        Ok(report)
    }

    fn resolve_ranges(&self, image: &ObjectImage) -> Result<Vec<AddressRange>, StampError> {
        self.options
            .plan
            .ranges
            .iter()
            .map(|spec| {
                let range = resolve_range(image, spec)?;
                tracing::debug!(
                    "range {}..{} = {}",
                    spec.start_symbol,
                    spec.end_symbol,
                    range
                );
                Ok::<_, StampError>(range)
            })
            .collect()
    }
}

fn resolve_range(image: &ObjectImage, spec: &RangeSpec) -> Result<AddressRange, StampError> {
    Ok(AddressRange::new(
        image.resolve(&spec.start_symbol)?,
        image.resolve(&spec.end_symbol)?,
    ))
}

/// Warns when the ROM image of the initialized data is shorter than the RAM
/// area it initializes.
fn check_data_copy(image: &ObjectImage, copy: &DataCopy) -> Result<(), StampError> {
    let ram = resolve_range(image, &copy.ram)?;
    let rom = resolve_range(image, &copy.rom)?;
    tracing::debug!("data copy: RAM {} from ROM {}", ram, rom);
    if ram.len() > rom.len() {
        tracing::warn!(
            "initialized data needs {} bytes but its ROM image {} holds {}",
            ram.len(),
            rom,
            rom.len()
        );
    }
    Ok(())
}
