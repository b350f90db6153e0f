//! This module provides functionality for parsing the Master Boot Record (MBR)
//! of a whole-disk image, in order to locate a FAT32 volume inside it.
use getset::Getters;
use log::debug;
use std::fmt::{self, Display};
use std::io::{Read, Seek, SeekFrom};

use super::disk_error::DiskError;
use crate::utils;

/// The number of primary partitions supported by MBR.
pub const PART_CNT: usize = 4;

const PT_OFFSET: usize = 446;
const PT_ENTRY_SIZE: usize = 16;
const SIG_OFFSET: usize = 510;
/// The signature 0x55AA is stored on disk in little-endian byte order.
const MBR_SIGNATURE: u16 = 0xAA55;

/// Represents the type of a partition table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PTType {
    /// Logical Block Addressing (LBA) FAT32 partition type.
    LBAFat32,
    /// Unsupported partition type, encapsulating the raw type byte.
    Unsupported(u8),
}

impl Display for PTType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PTType::LBAFat32 => write!(f, "LBA FAT32"),
            PTType::Unsupported(b) => write!(f, "Unsupported: 0x{b:02X}"),
        }
    }
}

impl PTType {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0x0C => PTType::LBAFat32,
            _ => PTType::Unsupported(byte),
        }
    }
}

/// Represents a single partition table entry.
#[derive(Debug, Getters)]
pub struct PTEntry {
    /// The type of the partition.
    #[get = "pub"]
    pt_type: PTType,
    /// The starting Logical Block Address (LBA) of the partition.
    #[get = "pub"]
    lba_start: u32,
    /// The number of sectors in the partition.
    #[get = "pub"]
    sector_cnt: u32,
}

/// Partition table of a Master Boot Record.
#[derive(Debug)]
pub struct Mbr {
    pt_entries: [PTEntry; PART_CNT],
    sector_size: usize,
}

impl Mbr {
    /// Reads and validates the MBR in the first sector of a disk image.
    ///
    /// # Errors
    /// - `DiskError::Io` if the sector cannot be read
    /// - `DiskError::InvalidSignature`, `DiskError::PartitionTableNotSorted` or
    ///   `DiskError::OverlappingPartitions` if the partition table is invalid
    pub fn from<T: Read + Seek>(disk: &mut T, sector_size: usize) -> Result<Mbr, DiskError> {
        let mut buffer = vec![];
        utils::read_sector(disk, 0, sector_size, &mut buffer)?;

        let signature = utils::u16_at(&buffer, SIG_OFFSET);
        if signature != MBR_SIGNATURE {
            return Err(DiskError::InvalidSignature(signature));
        }

        let pt_entries: [PTEntry; PART_CNT] = core::array::from_fn(|i| {
            let offset = PT_OFFSET + i * PT_ENTRY_SIZE;
            PTEntry {
                pt_type: PTType::from_byte(buffer[offset + 0x04]),
                lba_start: utils::u32_at(&buffer, offset + 0x08),
                sector_cnt: utils::u32_at(&buffer, offset + 0x0C),
            }
        });

        let disk_sectors = disk.seek(SeekFrom::End(0))? / sector_size as u64;
        debug!("MBR read, disk holds {disk_sectors} sectors");

        Mbr {
            pt_entries,
            sector_size,
        }
        .validate()
    }

    /// Returns the non-empty partition table entries.
    pub fn pt_entries(&self) -> Vec<&PTEntry> {
        self.pt_entries
            .iter()
            .filter(|entry| entry.sector_cnt != 0)
            .collect()
    }

    /// Locates the FAT32 volume held by partition `part_nb` (1-based).
    ///
    /// # Returns
    /// - The byte offset of the volume on the disk and its size in sectors
    ///
    /// # Errors
    /// - `DiskError::NoSuchPartition` if there is no such non-empty partition
    /// - `DiskError::NotFat32` if the partition is not an LBA FAT32 partition
    pub fn fat32_volume(&self, part_nb: u8) -> Result<(u64, u64), DiskError> {
        let entries = self.pt_entries();
        let entry = (part_nb as usize)
            .checked_sub(1)
            .and_then(|idx| entries.get(idx))
            .ok_or(DiskError::NoSuchPartition(part_nb, entries.len()))?;

        match entry.pt_type {
            PTType::LBAFat32 => Ok((
                entry.lba_start as u64 * self.sector_size as u64,
                entry.sector_cnt as u64,
            )),
            other => Err(DiskError::NotFat32(part_nb, other.to_string())),
        }
    }

    fn validate(self) -> Result<Self, DiskError> {
        let entries = self.pt_entries();

        if !entries
            .windows(2)
            .all(|pair| pair[0].lba_start <= pair[1].lba_start)
        {
            return Err(DiskError::PartitionTableNotSorted);
        }

        if entries
            .windows(2)
            .any(|pair| pair[0].lba_start as u64 + pair[0].sector_cnt as u64 > pair[1].lba_start as u64)
        {
            return Err(DiskError::OverlappingPartitions);
        }

        Ok(self)
    }
}
