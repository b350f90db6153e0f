//! FAT variant detection.
//!
//! Only FAT32 volumes are mounted; the other variants exist so a boot sector can
//! be rejected with a meaningful message.

use std::fmt;

/// Represents the different types of FAT filesystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FATType {
    FAT12,
    FAT16,
    FAT32,
}

impl FATType {
    /// Classifies a volume by the number of clusters in its data region,
    /// following Microsoft's FAT specification:
    /// - `FAT12` if cluster count < 4085
    /// - `FAT16` if cluster count < 65525
    /// - `FAT32` otherwise
    pub fn from_cluster_count(clus_cnt: u32) -> Self {
        if clus_cnt < 4085 {
            FATType::FAT12
        } else if clus_cnt < 65525 {
            FATType::FAT16
        } else {
            FATType::FAT32
        }
    }
}

impl fmt::Display for FATType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FATType::FAT12 => "FAT12",
            FATType::FAT16 => "FAT16",
            FATType::FAT32 => "FAT32",
        };
        write!(f, "{s}")
    }
}
