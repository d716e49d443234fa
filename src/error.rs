//! Error types.
//!
//! Every failure in the stamping pipeline is terminal for the current run. The
//! library reports them as [`StampError`]; the pipeline wraps the first one in a
//! [`PipelineError`] naming the stage that produced it.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::layout::AddressRange;

#[derive(Debug, Error)]
pub enum StampError {
    #[error("symbol `{name}` not found")]
    SymbolNotFound { name: String },

    #[error("address {address:#010x} (+{len} bytes) is not covered by any section")]
    UnmappedAddress { address: u64, len: u64 },

    #[error("malformed hex record on line {line}: {fault}")]
    MalformedRecord { line: usize, fault: RecordFault },

    #[error("no data recorded for address {address:#010x} inside range {range}")]
    GapInRange { range: AddressRange, address: u64 },

    #[error("range {range} ends before it starts")]
    InvalidRange { range: AddressRange },

    #[error("{len} bytes cannot be split into 32-bit words")]
    UnalignedLength { len: usize },

    #[error("stored checksum {stored:#010x} does not match computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("no build artifact matches `{pattern}`")]
    NoArtifact { pattern: String },

    #[error("hex conversion failed: {0}")]
    Conversion(String),

    #[error("failed to parse object file {}", path.display())]
    ObjectParse {
        path: PathBuf,
        #[source]
        source: object::Error,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StampError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Why a single hex line could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordFault {
    #[error("missing ':' start code")]
    MissingStartCode,
    #[error("odd number of hex digits")]
    OddLength,
    #[error("non-hex characters")]
    InvalidCharacters,
    #[error("record shorter than its fixed fields")]
    TooShort,
    #[error("byte count {declared} does not match {actual} payload bytes")]
    ByteCountMismatch { declared: usize, actual: usize },
    #[error("checksum byte {found:#04x}, expected {expected:#04x}")]
    ChecksumMismatch { found: u8, expected: u8 },
    #[error("record type {record_type:02X} expects {expected} payload bytes, found {actual}")]
    PayloadLength {
        record_type: u8,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported record type {0:02X}")]
    UnsupportedType(u8),
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Select,
    Resolve,
    Convert,
    Decode,
    Assemble,
    Normalize,
    Patch,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Select => "artifact selection",
            Stage::Resolve => "symbol resolution",
            Stage::Convert => "hex conversion",
            Stage::Decode => "hex decoding",
            Stage::Assemble => "range assembly",
            Stage::Normalize => "endianness normalization",
            Stage::Patch => "patching",
            Stage::Verify => "verification",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{stage} failed")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StampError,
}

pub trait StageExt<T> {
    /// Attributes an error to a pipeline stage.
    fn stage(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> StageExt<T> for Result<T, StampError> {
    fn stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError { stage, source })
    }
}
