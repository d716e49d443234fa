//! Firmware CRC stamping library.
//!
//! This library provides the core components of the `crc-stamp` tool, which
//! computes the checksum a firmware image verifies at boot and writes it into
//! the linked ELF file. It is organized into several modules:
//! - `config`: CLI configuration.
//! - `symbol`: Symbol table and section loading.
//! - `layout`: Sections, address ranges and the checksum range plan.
//! - `convert`: Object-to-hex conversion backends.
//! - `hex`: Intel HEX decoding.
//! - `assemble`: Extraction of the checksummed ranges.
//! - `endian`: Word byte-order normalization.
//! - `checksum`: CRC computation.
//! - `writer`: In-place patching of the object file.
//! - `select`: Choosing among candidate build artifacts.
//! - `stamper`: The pipeline tying it all together.

pub mod assemble;
pub mod checksum;
pub mod config;
pub mod convert;
pub mod endian;
pub mod error;
pub mod hex;
pub mod layout;
pub mod select;
pub mod stamper;
pub mod symbol;
pub mod writer;
