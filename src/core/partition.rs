//! Partition table records and the ESP-IDF CSV reader
//!
//! The table is read once per build and is read-only afterwards. Each line of
//! the CSV describes one partition:
//!
//! ```text
//! # Name,   Type, SubType, Offset,   Size, Flags
//! nvs,      data, nvs,     0x9000,   0x6000,
//! factory,  app,  factory, 0x10000,  1M,
//! ffs,      data, spiffs,  ,         512K,
//! ```
//!
//! An empty offset continues from the end of the previous partition, aligned
//! to [`APP_ALIGNMENT`] for app partitions and [`DATA_ALIGNMENT`] otherwise.

use crate::error::{PackError, Result};
use crate::validation::{parse_int, parse_size};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Partition type code for application images
pub const TYPE_APP: u8 = 0x00;

/// Partition type code for data partitions
pub const TYPE_DATA: u8 = 0x01;

/// First offset available after the bootloader and the table itself
pub const FIRST_PARTITION_OFFSET: u64 = 0x9000;

/// Offset alignment for app partitions
pub const APP_ALIGNMENT: u64 = 0x10000;

/// Offset alignment for data partitions
pub const DATA_ALIGNMENT: u64 = 0x1000;

/// One partition of the flash layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionRecord {
    /// Unique partition label
    pub name: String,

    /// Type code (0x00 app, 0x01 data, or custom)
    #[serde(rename = "type")]
    pub ptype: u8,

    /// Subtype code
    pub subtype: u8,

    /// Absolute byte address of the partition
    pub offset: u64,

    /// Capacity in bytes
    pub size: u64,

    /// Raw flags column (e.g. "encrypted"), informational only
    #[serde(skip_serializing_if = "String::is_empty")]
    pub flags: String,
}

impl PartitionRecord {
    pub fn new(name: impl Into<String>, ptype: u8, subtype: u8, offset: u64, size: u64) -> Self {
        PartitionRecord {
            name: name.into(),
            ptype,
            subtype,
            offset,
            size,
            flags: String::new(),
        }
    }

    /// Absolute address one past the last byte, `None` past the address space
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }

    /// True when the two partitions share at least one byte
    pub fn overlaps(&self, other: &PartitionRecord) -> bool {
        let end = |p: &PartitionRecord| p.end().unwrap_or(u64::MAX);
        self.offset < end(other) && other.offset < end(self)
    }
}

/// Ordered set of partitions, addressable by name
#[derive(Debug, Clone, Default)]
pub struct PartitionTable {
    partitions: Vec<PartitionRecord>,
}

impl PartitionTable {
    /// Build a table from records, rejecting duplicate names
    pub fn from_records(records: Vec<PartitionRecord>) -> Result<Self> {
        let mut table = PartitionTable::default();
        for (idx, record) in records.into_iter().enumerate() {
            table.insert(idx + 1, record)?;
        }
        Ok(table)
    }

    /// Read a CSV partition table from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let table = Self::from_csv(&text)?;
        debug!(
            "Loaded {} partitions from {}",
            table.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// Parse CSV partition table text
    pub fn from_csv(text: &str) -> Result<Self> {
        let mut table = PartitionTable::default();
        let mut next_free = FIRST_PARTITION_OFFSET;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < 5 {
                return Err(PackError::PartitionTable {
                    line: line_no,
                    reason: format!("expected at least 5 fields, found {}", fields.len()),
                });
            }

            let name = fields[0];
            if name.is_empty() {
                return Err(PackError::PartitionTable {
                    line: line_no,
                    reason: "partition name is empty".to_string(),
                });
            }

            let ptype = parse_type(fields[1]).map_err(|reason| PackError::PartitionTable {
                line: line_no,
                reason,
            })?;
            let subtype =
                parse_subtype(ptype, fields[2]).map_err(|reason| PackError::PartitionTable {
                    line: line_no,
                    reason,
                })?;

            let size = parse_size(fields[4]).map_err(|_| PackError::PartitionTable {
                line: line_no,
                reason: format!("invalid size '{}'", fields[4]),
            })?;
            if size == 0 {
                return Err(PackError::PartitionTable {
                    line: line_no,
                    reason: format!("partition '{}' has zero size", name),
                });
            }

            let offset = if fields[3].is_empty() {
                let alignment = if ptype == TYPE_APP {
                    APP_ALIGNMENT
                } else {
                    DATA_ALIGNMENT
                };
                align_up(next_free, alignment).ok_or_else(|| PackError::PartitionTable {
                    line: line_no,
                    reason: format!("partition '{}' starts past the address space", name),
                })?
            } else {
                parse_size(fields[3]).map_err(|_| PackError::PartitionTable {
                    line: line_no,
                    reason: format!("invalid offset '{}'", fields[3]),
                })?
            };

            let mut record = PartitionRecord::new(name, ptype, subtype, offset, size);
            record.flags = fields.get(5).copied().unwrap_or("").to_string();

            next_free = record.end().ok_or_else(|| PackError::PartitionTable {
                line: line_no,
                reason: format!(
                    "partition '{}' at 0x{:x} with size 0x{:x} ends past the address space",
                    name, offset, size
                ),
            })?;

            // Rows may be listed out of address order; only shared bytes conflict
            if let Some(other) = table.partitions.iter().find(|p| p.overlaps(&record)) {
                return Err(PackError::PartitionTable {
                    line: line_no,
                    reason: format!(
                        "partition '{}' at 0x{:x} overlaps '{}' at 0x{:x}",
                        name, offset, other.name, other.offset
                    ),
                });
            }

            table.insert(line_no, record)?;
        }

        Ok(table)
    }

    fn insert(&mut self, line: usize, record: PartitionRecord) -> Result<()> {
        if record.end().is_none() {
            return Err(PackError::PartitionTable {
                line,
                reason: format!("partition '{}' ends past the address space", record.name),
            });
        }
        if self.partitions.iter().any(|p| p.name == record.name) {
            return Err(PackError::PartitionTable {
                line,
                reason: format!("duplicate partition name '{}'", record.name),
            });
        }
        self.partitions.push(record);
        Ok(())
    }

    /// Look up a partition by name
    pub fn get(&self, name: &str) -> Result<&PartitionRecord> {
        self.partitions
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| PackError::PartitionNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.partitions.iter().any(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartitionRecord> {
        self.partitions.iter()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

fn align_up(value: u64, alignment: u64) -> Option<u64> {
    value.div_ceil(alignment).checked_mul(alignment)
}

fn parse_type(text: &str) -> std::result::Result<u8, String> {
    match text {
        "app" => Ok(TYPE_APP),
        "data" => Ok(TYPE_DATA),
        other => parse_code(other).map_err(|_| format!("unknown partition type '{}'", other)),
    }
}

fn parse_subtype(ptype: u8, text: &str) -> std::result::Result<u8, String> {
    if text.is_empty() {
        return Ok(0);
    }

    let named = match (ptype, text) {
        (TYPE_APP, "factory") => Some(0x00),
        (TYPE_APP, "test") => Some(0x20),
        (TYPE_APP, name) if name.starts_with("ota_") => {
            let slot = name[4..]
                .parse::<u8>()
                .ok()
                .filter(|slot| *slot < 16)
                .ok_or_else(|| format!("invalid OTA slot '{}'", name))?;
            Some(0x10 + slot)
        }
        (TYPE_DATA, "ota") => Some(0x00),
        (TYPE_DATA, "phy") => Some(0x01),
        (TYPE_DATA, "nvs") => Some(0x02),
        (TYPE_DATA, "coredump") => Some(0x03),
        (TYPE_DATA, "nvs_keys") => Some(0x04),
        (TYPE_DATA, "efuse") => Some(0x05),
        (TYPE_DATA, "undefined") => Some(0x06),
        (TYPE_DATA, "esphttpd") => Some(0x80),
        (TYPE_DATA, "fat") => Some(0x81),
        (TYPE_DATA, "spiffs") => Some(0x82),
        (TYPE_DATA, "littlefs") => Some(0x83),
        _ => None,
    };

    match named {
        Some(code) => Ok(code),
        None => parse_code(text).map_err(|_| format!("unknown partition subtype '{}'", text)),
    }
}

fn parse_code(text: &str) -> Result<u8> {
    let value = parse_int(text)?;
    u8::try_from(value).map_err(|_| PackError::InvalidNumber(text.to_string()))
}
