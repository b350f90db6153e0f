//! FAT Bpb structure.
//!
//! This module implements:
//! - BIOS Parameter Block (Bpb) parsing and validation
//! - FAT type detection (FAT12/16/32)
//! - Filesystem structure validation according to Microsoft's FAT specification

use binread::{BinRead, BinReaderExt};
use getset::Getters;
use std::io;

use super::fat_error::FATError;
use super::fat_type::FATType;
use crate::utils;

/// Size in bytes of the boot sector structure read from the volume.
pub const BOOT_SECTOR_SIZE: usize = 512;

/// BIOS Parameter Block structure for FAT filesystems.
///
/// All multi-byte fields are stored little-endian on disk and decoded as such,
/// whatever the host byte order.
#[derive(BinRead, Debug, Getters)]
#[br(little)]
pub struct Bpb {
    /// Jump instruction to boot code (must be 0xEB ?? 0x90 or 0xE9 ?? ??)
    jmp: [u8; 3],
    /// OEM identifier (e.g., "MSWIN4.1")
    _oem_name: [u8; 8],
    /// Number of bytes per sector (512, 1024, 2048, or 4096)
    #[get = "pub(super)"]
    bytes_per_sec: u16,
    /// Number of sectors per cluster (power of 2: 1, 2, 4, 8, 16, 32, 64, or 128)
    #[get = "pub(super)"]
    sec_per_clus: u8,
    /// Number of reserved sectors from start of volume
    #[get = "pub(super)"]
    rsvd_sec_cnt: u16,
    /// Number of FAT copies (typically 2 for redundancy)
    #[get = "pub(super)"]
    num_fat: u8,
    /// Maximum number of root directory entries (0 for FAT32)
    root_ent_cnt: u16,
    /// Total sectors for volumes < 32MB (0 for FAT32)
    tot_sec_16: u16,
    _media: u8,
    /// Sectors per FAT for FAT12/FAT16 (0 for FAT32)
    fat_sz_16: u16,
    _sec_per_trk: u16,
    _num_heads: u16,
    _hidd_sec: u32,
    /// Total sectors for volumes >= 32MB
    tot_sec_32: u32,

    // FAT32-specific fields
    /// Sectors per FAT
    #[get = "pub(super)"]
    fat_sz_32: u32,
    _ext_flags: u16,
    _fs_ver: u16,
    /// First cluster of root directory (typically 2)
    #[get = "pub(super)"]
    root_clus: u32,
    _fs_info: u16,
    _bk_boot_sec: u16,
    _reserved: [u8; 12],
    _drv_num: u8,
    _reserved_1: u8,
    _boot_sig: u8,
    _vol_id: u32,
    _vol_lab: [u8; 11],
    _fil_sys_type: [u8; 8],

    #[br(count = 420)]
    _boot_code: Vec<u8>,
    /// Boot sector signature (0x55 0xAA)
    sig: [u8; 2],
}

impl Bpb {
    /// Reads and optionally validates a Bpb located at byte `start` of the device.
    ///
    /// # Errors
    /// - `FATError::IOError` if the boot sector cannot be read in full
    /// - Various `FATError` validation variants if `validate` is true and a check fails
    pub fn from<T: io::Read + io::Seek>(
        device: &mut T,
        start: u64,
        validate: bool,
    ) -> Result<Bpb, FATError> {
        let mut buf = vec![0; BOOT_SECTOR_SIZE];
        utils::read_exact_at(device, start, &mut buf).map_err(FATError::io("reading BootSector"))?;

        let bpb: Bpb = io::Cursor::new(buf).read_le()?;

        if validate { bpb.validate() } else { Ok(bpb) }
    }

    /// Total count of sectors on the volume.
    ///
    /// At most one of the 16-bit and 32-bit fields is non-zero on a well-formed volume.
    pub fn tot_sec(&self) -> u32 {
        self.tot_sec_32.wrapping_add(self.tot_sec_16 as u32)
    }

    /// Determines the number of clusters in the data region.
    ///
    /// # Returns
    /// - `None` if the reserved area and FATs do not fit in the volume or if the
    ///   sector per cluster count is 0.
    pub fn cluster_count(&self) -> Option<u32> {
        let overhead =
            self.rsvd_sec_cnt as u64 + self.num_fat as u64 * self.fat_sz_32 as u64;
        let data_sec = (self.tot_sec() as u64).checked_sub(overhead)?;

        data_sec
            .checked_div(self.sec_per_clus as u64)
            .map(|count| count as u32)
    }

    /// Determines the FAT type based on the number of clusters in the filesystem.
    pub(super) fn fat_type(&self) -> FATType {
        FATType::from_cluster_count(self.cluster_count().unwrap_or(0))
    }

    /// Validates the Bpb structure according to FAT32 specification requirements.
    fn validate(self) -> Result<Self, FATError> {
        // General verification
        if !((self.jmp[0] == 0xEB && self.jmp[2] == 0x90) || self.jmp[0] == 0xE9) {
            return Err(FATError::InvalidJmp(format!(
                "0x{:02X}{:02X}{:02X}",
                self.jmp[0], self.jmp[1], self.jmp[2],
            )));
        }

        const VALID_BYTES_PER_SEC: [u16; 4] = [512, 1024, 2048, 4096];
        if !VALID_BYTES_PER_SEC.contains(&self.bytes_per_sec) {
            return Err(FATError::InvalidBytesPerSec(self.bytes_per_sec));
        }

        if !self.sec_per_clus.is_power_of_two() {
            return Err(FATError::InvalidSecPerClus(self.sec_per_clus));
        }

        let clus_sz = self.bytes_per_sec as u32 * self.sec_per_clus as u32;
        if clus_sz > 32 * 1024 {
            return Err(FATError::InvalidClusSz(clus_sz));
        }

        const SIG: [u8; 2] = [0x55, 0xAA];
        if self.sig != SIG {
            return Err(FATError::InvalidSignature(format!(
                "0x{:02X}{:02X}",
                self.sig[0], self.sig[1]
            )));
        }

        match self.fat_type() {
            FATType::FAT32 => self.validate_fat32(),
            fat_type => Err(FATError::UnsupportedFATType(fat_type.to_string())),
        }
    }

    /// Performs FAT32-specific validation checks.
    fn validate_fat32(self) -> Result<Self, FATError> {
        if self.rsvd_sec_cnt == 0 {
            return Err(FATError::InvalidRsvdSecCnt(self.rsvd_sec_cnt));
        }

        if self.num_fat == 0 {
            return Err(FATError::InvalidNumFat(self.num_fat));
        }

        if self.root_ent_cnt != 0 {
            return Err(FATError::InvalidRootEntCnt(self.root_ent_cnt));
        }

        if self.tot_sec_16 != 0 {
            return Err(FATError::InvalidTotSec(String::from(
                "BPB_TotSec16 should be 0 for a FAT32 volume.",
            )));
        }
        if self.tot_sec_32 == 0 {
            return Err(FATError::InvalidTotSec(String::from(
                "BPB_TotSec32 should be greater than 0 for a FAT32 volume.",
            )));
        }

        if self.fat_sz_16 != 0 {
            return Err(FATError::InvalidFatSz(String::from(
                "BPB_FATSz16 should be 0 for a FAT32 volume.",
            )));
        }
        if self.fat_sz_32 == 0 {
            return Err(FATError::InvalidFatSz(String::from(
                "BPB_FATSz32 should be greater than 0 for a FAT32 volume.",
            )));
        }

        if self.root_clus < 2 {
            return Err(FATError::InvalidRootClus(self.root_clus));
        }

        Ok(self)
    }
}
