//! # ffs-pack - Flash File System Image Packer
//!
//! `ffs-pack` turns a directory tree into the three artifacts a read-only
//! flash filesystem needs on an ESP32-class device:
//!
//! - **Header** with the `FFS_FILE_LIST` / `FFS_FILE_METADATA` macros
//! - **Load script** with `0x<address> <path>` pairs for the flasher
//! - **Image** exactly the size of the main partition
//!
//! Files are appended to the main partition in sorted order, each rounded up
//! to the allocation increment. Placement rules (`<glob>=<directives>`) can
//! redirect matching files to another partition or a raw flash address, or
//! change how much space they reserve.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ffs_pack::{PackerBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! let packer = PackerBuilder::new()
//!     .source("data")
//!     .header_output("build/ffs_files.h")
//!     .script_output("build/ffs_flash.mk")
//!     .image_output("build/ffs.bin")
//!     .partition_table_file("partitions.csv")
//!     .partition("ffs")
//!     .increment(4096)
//!     .rule("*.bin=p:storage,o:0x1000")
//!     .build()?;
//!
//! let report = packer.pack()?;
//! println!("{} bytes free", report.free);
//! # Ok(())
//! # }
//! ```
//!
//! Nothing is written unless the whole layout succeeds; see [`io`].

pub mod config;
pub mod core;
pub mod error;
pub mod io;

// Core modules at the crate root so crate:: paths inside core resolve
#[allow(unused_imports)]
pub(crate) use crate::core::{
    allocator, image, input, layout, manifest, partition, pattern, placement, rule, script, sink,
    validation,
};

pub use crate::config::PackConfig;
pub use crate::core::{
    allocator::BuildState,
    image::ImageBuffer,
    input::{collect_inputs, InputFile},
    layout::{LayoutEngine, LayoutSummary, Outputs},
    manifest::HeaderManifest,
    partition::{PartitionRecord, PartitionTable},
    pattern::{GlobPattern, PathMatcher},
    placement::{allocation_size, grown_size, Destination, FilePlacement, PlacementResolver},
    rule::{GrowSize, PlacementRule, RuleSet},
    script::LoadScript,
    sink::{ImageSink, ManifestEntry, ManifestSink, ScriptSink},
};
pub use crate::error::{ErrorKind, PackError, Result};
pub use crate::io::StagedArtifacts;

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// In-memory results of a layout pass, before anything is written
#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    pub header: String,
    pub script: String,
    pub image: Vec<u8>,
    pub summary: LayoutSummary,
}

/// Summary of a finished build, also the JSON report format
#[derive(Debug, Clone, Serialize)]
pub struct PackReport {
    /// Main partition the image was built for
    pub partition: PartitionRecord,

    /// Bytes reserved in the main partition
    pub used: u64,

    /// Bytes still free in the main partition
    pub free: u64,

    /// SHA-256 of the image, lowercase hex
    pub image_sha256: String,

    pub files: Vec<ManifestEntry>,
}

impl PackReport {
    fn new(artifacts: &BuildArtifacts) -> Self {
        PackReport {
            partition: artifacts.summary.main.clone(),
            used: artifacts.summary.used,
            free: artifacts.summary.free(),
            image_sha256: format!("{:x}", Sha256::digest(&artifacts.image)),
            files: artifacts.summary.entries.clone(),
        }
    }

    /// Manifest paths of every packed file, in order
    pub fn file_paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A fully configured build
#[derive(Debug, Clone)]
pub struct Packer {
    source: PathBuf,
    header: PathBuf,
    script: PathBuf,
    image: PathBuf,
    report: Option<PathBuf>,
    table: PartitionTable,
    partition: String,
    increment: u64,
    rules: RuleSet,
}

impl Packer {
    /// Create a packer from a [`PackConfig`]
    pub fn from_config(config: &PackConfig) -> Result<Self> {
        let mut builder = PackerBuilder::new()
            .source(&config.source)
            .header_output(&config.header)
            .script_output(&config.script)
            .image_output(&config.image)
            .partition_table_file(&config.partition_table)
            .partition(&config.partition)
            .increment(config.increment)
            .rules(config.rules.iter());

        if let Some(report) = &config.report {
            builder = builder.report_output(report);
        }

        builder.build()
    }

    pub fn partition_table(&self) -> &PartitionTable {
        &self.table
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Lay out `files` in memory without touching the filesystem
    pub fn plan(&self, files: &[InputFile]) -> Result<BuildArtifacts> {
        let engine = LayoutEngine::new(&self.table, &self.rules, &self.partition, self.increment)?;

        let mut outputs = Outputs {
            manifest: HeaderManifest::new(),
            script: LoadScript::new(),
            image: ImageBuffer::new(engine.state().main_partition())?,
        };

        let summary = engine.run(files, &mut outputs, &self.image)?;

        Ok(BuildArtifacts {
            header: outputs.manifest.render(),
            script: outputs.script.render(),
            image: outputs.image.into_bytes(),
            summary,
        })
    }

    /// Read the source folder, lay it out and write every artifact
    ///
    /// Artifacts are staged and moved into place together, only after the
    /// layout has succeeded. The image is moved last. If moving any artifact
    /// fails, the returned error means none of the targets can be trusted.
    pub fn pack(&self) -> Result<PackReport> {
        let files = collect_inputs(&self.source)?;
        info!(
            "Found {} files under {}",
            files.len(),
            self.source.display()
        );

        let artifacts = self.plan(&files)?;
        let report = PackReport::new(&artifacts);

        let mut staged = StagedArtifacts::new();
        staged.stage(&self.header, artifacts.header.as_bytes())?;
        staged.stage(&self.script, artifacts.script.as_bytes())?;
        if let Some(path) = &self.report {
            staged.stage(path, report.to_json()?.as_bytes())?;
        }
        // Image last
        staged.stage(&self.image, &artifacts.image)?;

        for path in staged.commit()? {
            debug!("Wrote {}", path.display());
        }

        info!(
            "Packed {} files into {} ({} bytes, {} free)",
            report.files.len(),
            self.image.display(),
            artifacts.image.len(),
            report.free
        );

        Ok(report)
    }
}

enum TableSource {
    File(PathBuf),
    Table(PartitionTable),
}

/// Builder for [`Packer`] instances
///
/// # Examples
///
/// ```rust
/// use ffs_pack::{PackerBuilder, PartitionRecord, PartitionTable, InputFile};
///
/// # fn main() -> ffs_pack::Result<()> {
/// let table = PartitionTable::from_records(vec![
///     PartitionRecord::new("ffs", 0x01, 0x82, 0x310000, 0x10000),
/// ])?;
///
/// let packer = PackerBuilder::new()
///     .source("data")
///     .header_output("ffs_files.h")
///     .script_output("flash.mk")
///     .image_output("ffs.bin")
///     .partition_table(table)
///     .partition("ffs")
///     .increment(4096)
///     .build()?;
///
/// let artifacts = packer.plan(&[InputFile::from_bytes("hello.txt", b"hi".to_vec())])?;
/// assert_eq!(artifacts.image.len(), 0x10000);
/// # Ok(())
/// # }
/// ```
pub struct PackerBuilder {
    source: Option<PathBuf>,
    header: Option<PathBuf>,
    script: Option<PathBuf>,
    image: Option<PathBuf>,
    report: Option<PathBuf>,
    table: Option<TableSource>,
    partition: Option<String>,
    increment: Option<u64>,
    rules: Vec<String>,
}

impl PackerBuilder {
    pub fn new() -> Self {
        PackerBuilder {
            source: None,
            header: None,
            script: None,
            image: None,
            report: None,
            table: None,
            partition: None,
            increment: None,
            rules: Vec::new(),
        }
    }

    /// Folder whose contents are packed
    pub fn source<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn header_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.header = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn script_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.script = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn image_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.image = Some(path.as_ref().to_path_buf());
        self
    }

    /// Also write a JSON build report
    pub fn report_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.report = Some(path.as_ref().to_path_buf());
        self
    }

    /// Read the partition table from a CSV file at build time
    pub fn partition_table_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.table = Some(TableSource::File(path.as_ref().to_path_buf()));
        self
    }

    /// Use an already loaded partition table
    pub fn partition_table(mut self, table: PartitionTable) -> Self {
        self.table = Some(TableSource::Table(table));
        self
    }

    /// Main partition name
    pub fn partition<S: Into<String>>(mut self, name: S) -> Self {
        self.partition = Some(name.into());
        self
    }

    /// Default allocation increment in bytes
    pub fn increment(mut self, increment: u64) -> Self {
        self.increment = Some(increment);
        self
    }

    /// Append one placement rule expression
    pub fn rule<S: Into<String>>(mut self, expression: S) -> Self {
        self.rules.push(expression.into());
        self
    }

    /// Append several placement rule expressions, in order
    pub fn rules<I, S>(mut self, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rules
            .extend(expressions.into_iter().map(|e| e.as_ref().to_string()));
        self
    }

    /// Validate settings, load the table and parse the rules
    pub fn build(self) -> Result<Packer> {
        let required = |value: Option<PathBuf>, what: &str| {
            value.ok_or_else(|| PackError::Config(format!("{} must be set", what)))
        };

        let source = required(self.source, "source folder")?;
        let header = required(self.header, "header output")?;
        let script = required(self.script, "script output")?;
        let image = required(self.image, "image output")?;

        let partition = self
            .partition
            .ok_or_else(|| PackError::Config("main partition must be set".to_string()))?;
        let increment = self
            .increment
            .ok_or_else(|| PackError::Config("increment must be set".to_string()))?;
        if increment == 0 {
            return Err(PackError::Config(
                "allocation increment must be positive".to_string(),
            ));
        }

        let table = match self.table {
            Some(TableSource::File(path)) => PartitionTable::from_file(path)?,
            Some(TableSource::Table(table)) => table,
            None => {
                return Err(PackError::Config(
                    "partition table must be set".to_string(),
                ))
            }
        };

        let main = table.get(&partition)?;
        info!(
            "Main partition '{}' at 0x{:x}, {} bytes",
            main.name, main.offset, main.size
        );

        let rules = RuleSet::parse_args(&self.rules)?;
        for name in rules.partition_names() {
            table.get(name)?;
        }
        debug!("Parsed {} placement rules", rules.len());

        Ok(Packer {
            source,
            header,
            script,
            image,
            report: self.report,
            table,
            partition,
            increment,
            rules,
        })
    }
}

impl Default for PackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
