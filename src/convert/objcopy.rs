//! External `objcopy` backend.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::HexConverter;
use crate::error::StampError;

/// Runs `<program> -O ihex <object> <hex_out>`.
pub struct Objcopy {
    pub program: PathBuf,
}

impl Objcopy {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl HexConverter for Objcopy {
    fn name(&self) -> &str {
        "objcopy"
    }

    fn convert(&self, object: &Path, hex_out: &Path) -> Result<String, StampError> {
        tracing::debug!(
            "running {} -O ihex {} {}",
            self.program.display(),
            object.display(),
            hex_out.display()
        );
        let output = Command::new(&self.program)
            .arg("-O")
            .arg("ihex")
            .arg(object)
            .arg(hex_out)
            .output()
            .map_err(|e| {
                StampError::Conversion(format!("failed to run {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            return Err(StampError::Conversion(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        std::fs::read_to_string(hex_out).map_err(StampError::io(hex_out))
    }
}
