//! Load script for the flashing step
//!
//! A single line of whitespace-separated `0x<address> <path>` pairs, one per
//! file flashed outside the main image, followed by the main image itself.
//! The format drops straight into an `esptool.py write_flash` invocation.

use crate::error::{PackError, Result};
use crate::sink::ScriptSink;
use std::path::{Path, PathBuf};

/// Script sink that collects address/path pairs
#[derive(Debug, Clone, Default)]
pub struct LoadScript {
    entries: Vec<(u64, PathBuf)>,
    finished: bool,
}

impl LoadScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs recorded so far, in order
    pub fn entries(&self) -> &[(u64, PathBuf)] {
        &self.entries
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Final script text
    pub fn render(&self) -> String {
        let pairs: Vec<String> = self
            .entries
            .iter()
            .map(|(address, path)| format!("0x{:x} {}", address, path.display()))
            .collect();
        format!("{}\n", pairs.join(" "))
    }
}

impl ScriptSink for LoadScript {
    fn push_external(&mut self, address: u64, source: &Path) -> Result<()> {
        if self.finished {
            return Err(PackError::Config(
                "load script already finished".to_string(),
            ));
        }
        self.entries.push((address, source.to_path_buf()));
        Ok(())
    }

    fn finish(&mut self, image: &Path, base: u64) -> Result<()> {
        if self.finished {
            return Err(PackError::Config(
                "load script already finished".to_string(),
            ));
        }
        self.entries.push((base, image.to_path_buf()));
        self.finished = true;
        Ok(())
    }
}
