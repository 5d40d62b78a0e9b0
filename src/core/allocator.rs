//! Allocation accounting for a single build
//!
//! [`BuildState`] owns the write cursor of the main partition and the list of
//! regions already handed out. Every resolved placement is committed here,
//! which is where capacity and exclusivity are enforced:
//!
//! - main partition: the cursor advances and may not pass the partition size
//! - pinned in main, or a named partition: `offset + allocation` must fit
//! - no two files may share bytes of the same partition
//! - raw address: not checked, the caller owns the address

use crate::error::{PackError, Result};
use crate::partition::PartitionRecord;
use crate::placement::{Destination, FilePlacement};

/// Bytes `start..end` of one partition held by one file
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reservation {
    partition: String,
    start: u64,
    end: u64,
    file: String,
}

/// Mutable state threaded through one build
#[derive(Debug, Clone)]
pub struct BuildState {
    main: PartitionRecord,
    cursor: u64,
    reserved: Vec<Reservation>,
}

impl BuildState {
    pub fn new(main: PartitionRecord) -> Self {
        BuildState {
            main,
            cursor: 0,
            reserved: Vec::new(),
        }
    }

    /// Next free offset inside the main partition
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn main_partition(&self) -> &PartitionRecord {
        &self.main
    }

    /// Bytes of the main partition not yet passed by the cursor
    pub fn free_bytes(&self) -> u64 {
        self.main.size - self.cursor
    }

    /// Account for a resolved placement
    ///
    /// On error the state is left unchanged.
    pub fn commit(&mut self, file: &str, placement: &FilePlacement) -> Result<()> {
        let (record, start) = match &placement.destination {
            Destination::Main => (&self.main, self.cursor),
            Destination::Pinned => (&self.main, placement.start_offset),
            Destination::Partition(record) => (record, placement.start_offset),
            Destination::Raw => return Ok(()),
        };

        let end = start.saturating_add(placement.allocated_size);
        check_fits(record, file, end)?;
        check_free(&self.reserved, &record.name, file, start, end)?;

        let partition = record.name.clone();
        if placement.destination == Destination::Main {
            self.cursor = end;
        }
        self.reserved.push(Reservation {
            partition,
            start,
            end,
            file: file.to_string(),
        });
        Ok(())
    }
}

fn check_fits(partition: &PartitionRecord, file: &str, end: u64) -> Result<()> {
    if end > partition.size {
        return Err(PackError::PartitionOverflow {
            partition: partition.name.clone(),
            file: file.to_string(),
            capacity: partition.size,
            overflow: end - partition.size,
        });
    }
    Ok(())
}

fn check_free(
    reserved: &[Reservation],
    partition: &str,
    file: &str,
    start: u64,
    end: u64,
) -> Result<()> {
    let clash = reserved
        .iter()
        .find(|r| r.partition == partition && r.start < end && start < r.end);

    match clash {
        Some(other) => Err(PackError::RegionOverlap {
            partition: partition.to_string(),
            file: file.to_string(),
            other: other.file.clone(),
            start,
            end,
        }),
        None => Ok(()),
    }
}
