//! Volume geometry.
//!
//! Sizes and byte offsets of the regions of a FAT32 volume, computed once from
//! the boot sector at mount time. Offsets are relative to the first byte of the volume.

use getset::CopyGetters;

use super::bpb::Bpb;
use super::fat_error::FATError;

/// Immutable layout of a mounted FAT32 volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Geometry {
    bytes_per_sector: u32,
    sectors_per_cluster: u32,
    bytes_per_cluster: u32,
    reserved_sectors: u32,
    num_fats: u32,
    fat_size_sectors: u32,
    bytes_per_fat: u64,
    fat_offset: u64,
    data_offset: u64,
    total_sectors: u32,
    total_clusters: u32,
    root_cluster: u32,
}

impl Geometry {
    /// Computes the geometry described by a boot sector.
    ///
    /// # Errors
    /// - `FATError::InvalidSecPerClus` if the sectors per cluster count is 0
    /// - `FATError::InvalidTotSec` if the reserved area and FATs exceed the volume
    pub fn from_bpb(bpb: &Bpb) -> Result<Self, FATError> {
        let bytes_per_sector = *bpb.bytes_per_sec() as u32;
        let sectors_per_cluster = *bpb.sec_per_clus() as u32;
        let reserved_sectors = *bpb.rsvd_sec_cnt() as u32;
        let num_fats = *bpb.num_fat() as u32;
        let fat_size_sectors = *bpb.fat_sz_32();

        if sectors_per_cluster == 0 {
            return Err(FATError::InvalidSecPerClus(0));
        }
        let total_clusters = bpb.cluster_count().ok_or_else(|| {
            FATError::InvalidTotSec(format!(
                "{} sectors cannot hold {} reserved sectors and {} FATs of {} sectors",
                bpb.tot_sec(),
                reserved_sectors,
                num_fats,
                fat_size_sectors
            ))
        })?;

        let bytes_per_fat = fat_size_sectors as u64 * bytes_per_sector as u64;
        let fat_offset = reserved_sectors as u64 * bytes_per_sector as u64;

        Ok(Geometry {
            bytes_per_sector,
            sectors_per_cluster,
            bytes_per_cluster: bytes_per_sector * sectors_per_cluster,
            reserved_sectors,
            num_fats,
            fat_size_sectors,
            bytes_per_fat,
            fat_offset,
            data_offset: fat_offset + num_fats as u64 * bytes_per_fat,
            total_sectors: bpb.tot_sec(),
            total_clusters,
            root_cluster: *bpb.root_clus(),
        })
    }

    /// Returns `true` if `cluster` indexes the data region (`2 <= cluster < total_clusters`).
    pub fn is_valid_cluster(&self, cluster: u32) -> bool {
        cluster >= 2 && cluster < self.total_clusters
    }

    /// Byte offset of a data cluster, relative to the start of the volume.
    ///
    /// # Errors
    /// - `FATError::InvalidCluster` if the cluster is out of range
    pub fn cluster_byte_offset(&self, cluster: u32) -> Result<u64, FATError> {
        if !self.is_valid_cluster(cluster) {
            return Err(FATError::InvalidCluster(cluster));
        }
        Ok(self.data_offset + self.bytes_per_cluster as u64 * (cluster as u64 - 2))
    }

    /// Byte offset of the FAT entry of `cluster` in the FAT copy `copy`.
    pub fn fat_entry_offset(&self, copy: u32, cluster: u32) -> u64 {
        self.fat_offset + copy as u64 * self.bytes_per_fat + cluster as u64 * 4
    }
}
