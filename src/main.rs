//! Entry point for the crc-stamp tool.
//!
//! This file handles high-level application flow:
//! 1. Parse command-line arguments using `clap` and set up logging.
//! 2. Pick the object file to stamp from the (possibly globbed) input.
//! 3. Run the stamping pipeline with the selected hex converter.
//!
//! Error handling is done via `anyhow`.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crc_stamp::config::{Config, ConverterKind};
use crc_stamp::convert::{ElfToHex, Objcopy};
use crc_stamp::error::{PipelineError, Stage};
use crc_stamp::select::select_artifact;
use crc_stamp::stamper::Stamper;

fn main() -> Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let object = select_artifact(&config.input, &config.strategy())
        .map_err(|source| PipelineError {
            stage: Stage::Select,
            source,
        })?;
    tracing::info!("using {}", object.display());

    let options = config.options();
    let report = match config.converter {
        ConverterKind::Builtin => Stamper::new(ElfToHex, options).run(&object, &config.hex_out),
        ConverterKind::Objcopy => {
            Stamper::new(Objcopy::new(&config.objcopy), options).run(&object, &config.hex_out)
        }
    }
    .with_context(|| format!("failed to stamp {}", object.display()))?;

    if report.patched {
        println!(
            "Stamped {} with CRC {:#010x} at {} (file offset {:#x})",
            object.display(),
            report.checksum,
            config.checksum_symbol,
            report.location.file_offset
        );
    } else {
        println!(
            "{}: stored CRC {:#010x} is valid",
            object.display(),
            report.checksum
        );
    }
    Ok(())
}
