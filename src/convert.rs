//! Object-to-hex conversion.
//!
//! The pipeline only needs the hex text of the object file. Anything that can
//! produce it implements [`HexConverter`]: the in-process [`ElfToHex`] or an
//! external `objcopy`.

use std::path::Path;

use crate::error::StampError;

pub mod elf;
pub mod objcopy;

pub use elf::ElfToHex;
pub use objcopy::Objcopy;

pub trait HexConverter {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Writes the Intel HEX form of `object` to `hex_out` and returns its text.
    fn convert(&self, object: &Path, hex_out: &Path) -> Result<String, StampError>;
}
