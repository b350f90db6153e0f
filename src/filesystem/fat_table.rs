//! In-memory cache of the File Allocation Table.
//!
//! The first FAT copy is loaded once at mount time. Only non-free entries are
//! stored: a cluster missing from the map is FREE. Updates are applied to the
//! cache and mirrored to every FAT copy on disk, one copy after the other. A
//! failure while writing a later copy leaves the cache and the earlier copies
//! updated.

use std::collections::BTreeMap;

use log::{debug, warn};

use super::fat_error::FATError;
use super::geometry::Geometry;
use crate::traits::Device;
use crate::utils::{read_exact_at, write_all_at};

/// Value of a free cluster entry.
pub const FAT_FREE: u32 = 0x0000_0000;
/// Entries at or above this value terminate a cluster chain.
pub const FAT_EOF_MIN: u32 = 0x0FFF_FFF8;
/// End-of-chain value written when terminating a chain.
pub const FAT_EOF: u32 = 0x0FFF_FFFF;
/// The high 4 bits of a FAT32 entry are reserved.
pub const FAT_ENTRY_MASK: u32 = 0x0FFF_FFFF;

/// Returns `true` if the entry marks a free cluster.
pub fn is_free(entry: u32) -> bool {
    entry == FAT_FREE
}

/// Returns `true` if the entry terminates a cluster chain.
pub fn is_eof(entry: u32) -> bool {
    entry >= FAT_EOF_MIN
}

/// Sparse cache of the cluster chain map.
#[derive(Debug)]
pub struct FatTable {
    entries: BTreeMap<u32, u32>,
    geometry: Geometry,
    /// Byte offset of the volume on the device.
    base: u64,
}

impl FatTable {
    /// Loads the first FAT copy of the volume starting at byte `base` of the device.
    ///
    /// Entries for clusters `0 ..= total_clusters + 1` are read, masked to 28 bits,
    /// and kept when not free.
    ///
    /// # Errors
    /// - `FATError::IOError` if the FAT cannot be read in full
    pub fn load<D: Device>(device: &mut D, base: u64, geometry: Geometry) -> Result<Self, FATError> {
        let mut raw = vec![0u8; geometry.bytes_per_fat() as usize];
        read_exact_at(device, base + geometry.fat_offset(), &mut raw)
            .map_err(FATError::io("reading FAT table"))?;

        let count = (geometry.total_clusters() as usize + 2).min(raw.len() / 4);
        let entries: BTreeMap<u32, u32> = raw
            .chunks_exact(4)
            .take(count)
            .enumerate()
            .filter_map(|(cluster, word)| {
                let entry = u32::from_le_bytes([word[0], word[1], word[2], word[3]]) & FAT_ENTRY_MASK;
                (!is_free(entry)).then_some((cluster as u32, entry))
            })
            .collect();

        debug!(
            "FAT loaded: {} entries scanned, {} in use",
            count,
            entries.len()
        );

        Ok(FatTable {
            entries,
            geometry,
            base,
        })
    }

    /// Returns the successor of `cluster`, FREE if none is recorded.
    ///
    /// # Errors
    /// - `FATError::InvalidCluster` if `cluster` is outside `2..total_clusters`
    pub fn next(&self, cluster: u32) -> Result<u32, FATError> {
        if !self.geometry.is_valid_cluster(cluster) {
            return Err(FATError::InvalidCluster(cluster));
        }
        Ok(self.entries.get(&cluster).copied().unwrap_or(FAT_FREE))
    }

    /// Sets the successor of `cur` to `next` in the cache and in every FAT copy.
    ///
    /// Does nothing when `cur` is 0. Unless `next` ends the chain, both clusters
    /// must be valid data clusters.
    ///
    /// # Errors
    /// - `FATError::InvalidCluster` for out of range clusters
    /// - `FATError::IOError` if writing any FAT copy fails
    pub fn set_next<D: Device>(&mut self, device: &mut D, cur: u32, next: u32) -> Result<(), FATError> {
        if cur == 0 {
            return Ok(());
        }
        if !is_eof(next) {
            if !self.geometry.is_valid_cluster(cur) {
                return Err(FATError::InvalidCluster(cur));
            }
            if next >= self.geometry.total_clusters() {
                return Err(FATError::InvalidCluster(next));
            }
        }
        // The entry must at least lie inside the FAT.
        if cur as u64 * 4 + 4 > self.geometry.bytes_per_fat() {
            return Err(FATError::InvalidCluster(cur));
        }

        let value = next & FAT_ENTRY_MASK;
        if is_free(value) {
            self.entries.remove(&cur);
        } else {
            self.entries.insert(cur, value);
        }

        let bytes = value.to_le_bytes();
        for copy in 0..self.geometry.num_fats() {
            let offset = self.base + self.geometry.fat_entry_offset(copy, cur);
            write_all_at(device, offset, &bytes).map_err(|err| {
                if copy > 0 {
                    warn!("FAT copy #{copy} not updated for cluster {cur}, earlier copies were");
                }
                FATError::io("writing FAT table")(err)
            })?;
        }
        debug!("FAT[{cur}] = 0x{value:08X} ({} copies)", self.geometry.num_fats());

        Ok(())
    }

    /// Number of allocated data clusters.
    pub fn allocated(&self) -> u32 {
        (self.entries.len() as u32).saturating_sub(2)
    }

    /// Number of free data clusters.
    pub fn free(&self) -> u32 {
        self.geometry.total_clusters().saturating_sub(self.allocated())
    }
}
