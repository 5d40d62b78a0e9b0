//! Main partition image buffer

use crate::error::{PackError, Result};
use crate::partition::PartitionRecord;
use crate::sink::ImageSink;

/// Zero-filled buffer exactly the size of the main partition
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    partition: String,
    data: Vec<u8>,
}

impl ImageBuffer {
    pub fn new(main: &PartitionRecord) -> Result<Self> {
        let size = usize::try_from(main.size).map_err(|_| {
            PackError::Config(format!(
                "partition '{}' is too large to build in memory",
                main.name
            ))
        })?;

        Ok(ImageBuffer {
            partition: main.name.clone(),
            data: vec![0u8; size],
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ImageSink for ImageBuffer {
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let capacity = self.data.len() as u64;
        let end = offset.saturating_add(bytes.len() as u64);
        if end > capacity {
            return Err(PackError::PartitionOverflow {
                partition: self.partition.clone(),
                file: format!("<{} bytes at 0x{:x}>", bytes.len(), offset),
                capacity,
                overflow: end - capacity,
            });
        }

        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
