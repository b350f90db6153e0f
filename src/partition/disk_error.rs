//! Error types for partition table operations.

use std::io;
use thiserror;

/// Represents errors that can occur while locating a volume through the MBR.
#[derive(thiserror::Error, Debug)]
pub enum DiskError {
    /// Wraps an I/O error that occurred while reading the partition table.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The partition table entries are not in ascending order by starting sector.
    #[error("Partition table is not sorted")]
    PartitionTableNotSorted,
    /// Two or more partitions have overlapping sectors.
    #[error("Some partitions are overlapping")]
    OverlappingPartitions,
    /// The boot signature is not 0x55AA.
    #[error("Invalid signature: 0x{0:04X}")]
    InvalidSignature(u16),
    /// The requested partition does not exist.
    #[error("No partition #{0}: the disk has {1} partitions")]
    NoSuchPartition(u8, usize),
    /// The requested partition is not an LBA FAT32 partition.
    #[error("Partition #{0} is not a FAT32 partition: {1}")]
    NotFat32(u8, String),
}
