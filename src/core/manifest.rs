//! C header manifest
//!
//! Renders the file list and descriptor table as two preprocessor macros
//! that the device firmware expands into an enum and a metadata array:
//!
//! ```text
//! #define FFS_FILE_LIST \
//! config_device_cfg, \
//!
//! #define FFS_FILE_METADATA \
//! 		{ "/config/device.cfg", config_device_cfg, 0, 4096, "ffs", 0x1, 0x82, 0x0 }, \
//!
//! ```

use crate::error::Result;
use crate::sink::{ManifestEntry, ManifestSink};
use std::fmt::Write;

/// Macro holding the ordered identifier list
pub const FILE_LIST_MACRO: &str = "FFS_FILE_LIST";

/// Macro holding the descriptor tuples
pub const FILE_METADATA_MACRO: &str = "FFS_FILE_METADATA";

/// Partition marker for raw-address files
pub const NULL_PARTITION: &str = "NULL";

/// Manifest sink that accumulates the header text
#[derive(Debug, Clone, Default)]
pub struct HeaderManifest {
    list: String,
    metadata: String,
    count: usize,
}

impl HeaderManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files recorded
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Final header text
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("#define {} \\\n", FILE_LIST_MACRO));
        out.push_str(&self.list);
        out.push('\n');
        out.push_str(&format!("#define {} \\\n", FILE_METADATA_MACRO));
        out.push_str(&self.metadata);
        out.push('\n');
        out
    }
}

impl ManifestSink for HeaderManifest {
    fn push(&mut self, entry: &ManifestEntry) -> Result<()> {
        let partition = match &entry.partition {
            Some(name) => format!("\"{}\"", c_escape(name)),
            None => NULL_PARTITION.to_string(),
        };

        // Writing into a String cannot fail
        let _ = writeln!(self.list, "{}, \\", entry.ident);
        let _ = writeln!(
            self.metadata,
            "\t\t{{ \"{}\", {}, {}, {}, {}, 0x{:x}, 0x{:x}, 0x{:x} }}, \\",
            c_escape(&entry.path),
            entry.ident,
            entry.length,
            entry.allocated,
            partition,
            entry.ptype,
            entry.subtype,
            entry.offset
        );

        self.count += 1;
        Ok(())
    }
}

fn c_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}
