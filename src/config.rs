//! Configuration module.
//!
//! This module defines the command-line interface (CLI) of the stamping tool
//! using `clap`, and turns it into the library's [`StampOptions`].

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::checksum::DEFAULT_MASK;
use crate::endian::PartialWord;
use crate::hex::DecodeOptions;
use crate::select::Strategy;
use crate::stamper::{StampOptions, CHECKSUM_SYMBOL};

/// Stamps a firmware image with the CRC-32 its boot-time ROM check expects.
///
/// The checksum covers the interrupt vector table, the application code and
/// the ROM copy of the initialized data, in that order, and is written
/// little-endian into the `__checksum_result` slot of the ELF file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Object file, or a glob pattern matching candidate build artifacts
    pub input: String,

    /// Where the intermediate Intel HEX file is written
    #[arg(long, default_value = "output.hex")]
    pub hex_out: PathBuf,

    /// How the object file is converted to Intel HEX
    #[arg(long, value_enum, default_value_t = ConverterKind::Builtin)]
    pub converter: ConverterKind,

    /// objcopy executable used by `--converter objcopy`
    #[arg(long, default_value = "objcopy")]
    pub objcopy: PathBuf,

    /// Symbol whose 4 bytes receive the checksum
    #[arg(long, default_value = CHECKSUM_SYMBOL)]
    pub checksum_symbol: String,

    /// Mask applied to the computed CRC
    #[arg(long, default_value = "0xFFFFFFFF", value_parser = parse_u32)]
    pub mask: u32,

    /// Reject hex records whose checksum byte is wrong
    #[arg(long)]
    pub strict_hex: bool,

    /// Drop a trailing partial word instead of failing
    #[arg(long)]
    pub truncate_partial_word: bool,

    /// Only verify the stored checksum, do not modify the file
    #[arg(long)]
    pub check: bool,

    /// Prefer artifacts whose path contains this text (repeatable, in priority order)
    #[arg(long = "prefer", value_name = "SUBSTRING")]
    pub prefer: Vec<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", help = "Set the logging level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConverterKind {
    /// In-process conversion from ELF program headers
    Builtin,
    /// External `objcopy -O ihex`
    Objcopy,
}

impl Config {
    pub fn options(&self) -> StampOptions {
        StampOptions {
            checksum_symbol: self.checksum_symbol.clone(),
            mask: self.mask,
            decode: DecodeOptions {
                verify_checksums: self.strict_hex,
            },
            partial_word: if self.truncate_partial_word {
                PartialWord::Truncate
            } else {
                PartialWord::Reject
            },
            check_only: self.check,
            ..StampOptions::default()
        }
    }

    pub fn strategy(&self) -> Strategy {
        if self.prefer.is_empty() {
            Strategy::default()
        } else {
            Strategy::preferring(&self.prefer)
        }
    }
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid 32-bit value `{}`: {}", s, e))
}
