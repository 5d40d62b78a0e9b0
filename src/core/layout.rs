//! Layout pass
//!
//! Processes the input set in sorted order. For each file the placement is
//! resolved, committed to the [`BuildState`] (capacity checks), then handed
//! to the three sinks. Any error aborts the pass; sinks are in-memory, so
//! nothing reaches disk until the caller decides to write the results.

use crate::allocator::BuildState;
use crate::error::Result;
use crate::input::{check_unique_identifiers, InputFile};
use crate::partition::{PartitionRecord, PartitionTable};
use crate::placement::{Destination, PlacementResolver};
use crate::rule::RuleSet;
use crate::sink::{ImageSink, ManifestEntry, ManifestSink, ScriptSink};
use std::path::Path;
use tracing::{debug, info};

/// The three sinks driven by one layout pass
#[derive(Debug)]
pub struct Outputs<M, S, I> {
    pub manifest: M,
    pub script: S,
    pub image: I,
}

/// Result of a completed layout pass
#[derive(Debug, Clone)]
pub struct LayoutSummary {
    pub main: PartitionRecord,

    /// Bytes reserved in the main partition
    pub used: u64,

    /// One entry per file, in processing order
    pub entries: Vec<ManifestEntry>,
}

impl LayoutSummary {
    pub fn free(&self) -> u64 {
        self.main.size - self.used
    }
}

/// Lays out files for one main partition
pub struct LayoutEngine<'a> {
    resolver: PlacementResolver<'a>,
    state: BuildState,
}

impl<'a> LayoutEngine<'a> {
    /// Create an engine targeting the partition named `main`
    pub fn new(
        table: &'a PartitionTable,
        rules: &'a RuleSet,
        main: &str,
        increment: u64,
    ) -> Result<Self> {
        let main = table.get(main)?.clone();
        let resolver = PlacementResolver::new(table, rules, increment)?;

        Ok(LayoutEngine {
            resolver,
            state: BuildState::new(main),
        })
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Run the pass over `files`
    ///
    /// `image_path` is the location the packed image will be written to; it
    /// is recorded as the final load script entry.
    pub fn run<M, S, I>(
        mut self,
        files: &[InputFile],
        outputs: &mut Outputs<M, S, I>,
        image_path: &Path,
    ) -> Result<LayoutSummary>
    where
        M: ManifestSink,
        S: ScriptSink,
        I: ImageSink,
    {
        check_unique_identifiers(files)?;

        let mut ordered: Vec<&InputFile> = files.iter().collect();
        ordered.sort_by(|a, b| a.path.cmp(&b.path));

        let mut entries = Vec::with_capacity(ordered.len());

        for file in ordered {
            let placement = self.resolver.resolve(&file.path, file.len(), &self.state)?;
            self.state.commit(&file.display_path(), &placement)?;

            let entry = ManifestEntry::new(file, &placement, self.state.main_partition());
            outputs.manifest.push(&entry)?;

            if !file.is_empty() {
                match placement.destination {
                    Destination::Main | Destination::Pinned => {
                        outputs.image.write_at(placement.start_offset, &file.bytes)?;
                    }
                    Destination::Partition(_) | Destination::Raw => {
                        outputs.script.push_external(entry.address, &file.source)?;
                    }
                }
            } else {
                debug!("{} is empty, nothing to copy", entry.path);
            }

            entries.push(entry);
        }

        let main = self.state.main_partition().clone();
        outputs.script.finish(image_path, main.offset)?;

        info!(
            "Laid out {} files, {} of {} bytes used in '{}'",
            entries.len(),
            self.state.cursor(),
            main.size,
            main.name
        );

        Ok(LayoutSummary {
            used: self.state.cursor(),
            main,
            entries,
        })
    }
}
