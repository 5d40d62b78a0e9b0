//! Output sinks fed by the layout pass
//!
//! One iteration over the input set drives three independent sinks, so each
//! artifact can be produced (and tested) without the others:
//!
//! - [`ManifestSink`] - per-file descriptors for the C header
//! - [`ScriptSink`] - address/path pairs for the flashing step
//! - [`ImageSink`] - bytes of the main partition image

use crate::error::Result;
use crate::input::InputFile;
use crate::partition::PartitionRecord;
use crate::placement::FilePlacement;
use serde::Serialize;
use std::path::Path;

/// Descriptor of one placed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// Normalized path with a leading `/`
    pub path: String,

    /// C identifier derived from the path
    pub ident: String,

    /// Declared (input) length
    pub length: u64,

    /// Reserved bytes
    pub allocated: u64,

    /// Destination partition, `None` for raw-address placement
    pub partition: Option<String>,

    #[serde(rename = "type")]
    pub ptype: u8,

    pub subtype: u8,

    /// Partition-relative offset, or absolute address when `partition` is `None`
    pub offset: u64,

    /// Absolute flash address
    pub address: u64,

    /// True when the bytes are inside the main image
    pub embedded: bool,
}

impl ManifestEntry {
    pub fn new(file: &InputFile, placement: &FilePlacement, main: &PartitionRecord) -> Self {
        let partition = placement.partition(main);

        ManifestEntry {
            path: file.display_path(),
            ident: file.identifier(),
            length: file.len(),
            allocated: placement.allocated_size,
            partition: partition.map(|p| p.name.clone()),
            ptype: partition.map_or(0, |p| p.ptype),
            subtype: partition.map_or(0, |p| p.subtype),
            offset: placement.start_offset,
            address: placement.absolute_address(main),
            embedded: placement.is_main(),
        }
    }
}

/// Receives one descriptor per file, in processing order
pub trait ManifestSink {
    fn push(&mut self, entry: &ManifestEntry) -> Result<()>;
}

/// Receives the out-of-image placements and, last, the image itself
pub trait ScriptSink {
    /// A file flashed separately at `address`
    fn push_external(&mut self, address: u64, source: &Path) -> Result<()>;

    /// The packed main image, flashed at the main partition's base
    fn finish(&mut self, image: &Path, base: u64) -> Result<()>;
}

/// Receives main-partition file contents at their resolved offsets
pub trait ImageSink {
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;
}

impl ManifestSink for Vec<ManifestEntry> {
    fn push(&mut self, entry: &ManifestEntry) -> Result<()> {
        Vec::push(self, entry.clone());
        Ok(())
    }
}
