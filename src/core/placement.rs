//! Placement resolution
//!
//! Decides, for each input file, where its bytes go and how much space they
//! reserve. The default policy appends the file to the main partition at the
//! current cursor; the first matching [`PlacementRule`] can redirect it to a
//! named partition, a raw flash address, or change its growth quantum.

use crate::allocator::BuildState;
use crate::error::{PackError, Result};
use crate::partition::{PartitionRecord, PartitionTable};
use crate::rule::{GrowSize, PlacementRule, RuleSet};
use tracing::debug;

/// Quanta reserved by a zero-length file
///
/// Empty files still get a manifest slot they can grow into on the device.
pub const EMPTY_FILE_QUANTA: u64 = 1;

/// Allocation reserved for `length` bytes rounded to `quantum`
///
/// Always a positive multiple of `quantum` and never less than `length`.
///
/// # Examples
///
/// ```
/// use ffs_pack::core::placement::allocation_size;
///
/// assert_eq!(allocation_size(10, 4096), 4096);
/// assert_eq!(allocation_size(4096, 4096), 4096);
/// assert_eq!(allocation_size(5000, 4096), 8192);
/// assert_eq!(allocation_size(0, 4096), 4096);
/// ```
pub fn allocation_size(length: u64, quantum: u64) -> u64 {
    debug_assert!(quantum > 0, "quantum must be positive");
    let quanta = if length == 0 {
        EMPTY_FILE_QUANTA
    } else {
        length.div_ceil(quantum)
    };
    quanta.saturating_mul(quantum)
}

/// Allocation for an explicit `g:` quantum
///
/// Divides, adds one and multiplies: an exact multiple still gains one more
/// quantum, unlike [`allocation_size`].
///
/// # Examples
///
/// ```
/// use ffs_pack::core::placement::grown_size;
///
/// assert_eq!(grown_size(10, 4096), 4096);
/// assert_eq!(grown_size(8192, 4096), 12288);
/// assert_eq!(grown_size(0, 4096), 4096);
/// ```
pub fn grown_size(length: u64, quantum: u64) -> u64 {
    debug_assert!(quantum > 0, "quantum must be positive");
    (length / quantum).saturating_add(1).saturating_mul(quantum)
}

/// Where a file's bytes end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Packed into the main image at the running cursor
    Main,
    /// Packed into the main image at a rule-given offset, cursor untouched
    Pinned,
    /// A named partition at a fixed offset, delivered by the load script
    Partition(PartitionRecord),
    /// An absolute flash address outside any partition
    Raw,
}

/// Resolved placement of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlacement {
    pub destination: Destination,

    /// Partition-relative offset, or the absolute address for [`Destination::Raw`]
    pub start_offset: u64,

    /// Reserved bytes, a positive multiple of the active quantum
    pub allocated_size: u64,
}

impl FilePlacement {
    /// True when the bytes are embedded in the main image
    pub fn is_main(&self) -> bool {
        matches!(self.destination, Destination::Main | Destination::Pinned)
    }

    /// Destination partition record, if any
    pub fn partition<'a>(&'a self, main: &'a PartitionRecord) -> Option<&'a PartitionRecord> {
        match &self.destination {
            Destination::Main | Destination::Pinned => Some(main),
            Destination::Partition(record) => Some(record),
            Destination::Raw => None,
        }
    }

    /// Absolute flash address of the first byte
    pub fn absolute_address(&self, main: &PartitionRecord) -> u64 {
        match self.partition(main) {
            Some(record) => record.offset.saturating_add(self.start_offset),
            None => self.start_offset,
        }
    }
}

/// Applies the rule set over the default policy
#[derive(Debug)]
pub struct PlacementResolver<'a> {
    table: &'a PartitionTable,
    rules: &'a RuleSet,
    increment: u64,
}

impl<'a> PlacementResolver<'a> {
    /// Create a resolver
    ///
    /// Every partition named by a rule must exist in `table`, so lookup
    /// failures surface before any file is placed.
    pub fn new(table: &'a PartitionTable, rules: &'a RuleSet, increment: u64) -> Result<Self> {
        if increment == 0 {
            return Err(PackError::Config(
                "allocation increment must be positive".to_string(),
            ));
        }

        for name in rules.partition_names() {
            table.get(name)?;
        }

        Ok(PlacementResolver {
            table,
            rules,
            increment,
        })
    }

    pub fn increment(&self) -> u64 {
        self.increment
    }

    /// Resolve the placement of a file given the current build state
    pub fn resolve(&self, path: &str, length: u64, state: &BuildState) -> Result<FilePlacement> {
        let placement = match self.rules.first_match(path) {
            None => FilePlacement {
                destination: Destination::Main,
                start_offset: state.cursor(),
                allocated_size: allocation_size(length, self.increment),
            },
            Some(rule) => self.apply_rule(rule, length, state)?,
        };

        debug!(
            "Placed {} ({} bytes): {:?} at 0x{:x}, {} bytes reserved",
            path, length, placement.destination, placement.start_offset, placement.allocated_size
        );

        Ok(placement)
    }

    fn apply_rule(
        &self,
        rule: &PlacementRule,
        length: u64,
        state: &BuildState,
    ) -> Result<FilePlacement> {
        let target = rule
            .partition
            .as_deref()
            .map(|name| self.table.get(name))
            .transpose()?;

        let allocated_size = match rule.grow {
            None => allocation_size(length, self.increment),
            Some(GrowSize::Quantum(quantum)) => grown_size(length, quantum),
            Some(GrowSize::WholePartition) => {
                let record = target.ok_or_else(|| {
                    PackError::rule(rule.expression(), "g:max needs a target partition (p:)")
                })?;
                grown_size(length, record.size)
            }
        };

        let (destination, start_offset) = match (rule.raw_offset, target) {
            (Some(address), _) => (Destination::Raw, address),
            (None, Some(record)) if record.name == state.main_partition().name => {
                (Destination::Pinned, rule.offset.unwrap_or(0))
            }
            (None, Some(record)) => (
                Destination::Partition(record.clone()),
                rule.offset.unwrap_or(0),
            ),
            (None, None) => (Destination::Main, state.cursor()),
        };

        Ok(FilePlacement {
            destination,
            start_offset,
            allocated_size,
        })
    }
}
