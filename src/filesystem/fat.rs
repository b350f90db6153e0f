//! FAT volume structure and operations.
//!
//! This module implements the core functions to interact with a FAT32 volume, including:
//! - Mounting: decoding the BPB and loading the FAT
//! - Walking directories and rebuilding long file names, for live and deleted entries
//! - Reading and writing file data across cluster boundaries
//! - Displaying the volume layout

use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;

use log::{debug, trace};

use super::bpb::Bpb;
use super::dir_entry::{DIR_ENTRY_SIZE, DirSlot, LfnEntry, decode_long_name};
use super::fat_error::FATError;
use super::fat_table::{FatTable, is_eof, is_free};
use super::file_handler::FileHandler;
use super::geometry::Geometry;
use crate::traits::{Device, LayoutDisplay};
use crate::utils::{read_exact_at, write_all_at};

const SLOT_SIZE: u32 = DIR_ENTRY_SIZE as u32;

/// A mounted FAT32 volume.
///
/// The volume owns the device for its whole lifetime and assumes exclusive
/// access to it: the FAT is read once at mount time and only updated through
/// this structure afterwards.
pub struct FATVol<D: Device> {
    pub(super) device: D,
    /// Byte offset of the volume on the device.
    pub(super) start: u64,
    /// Size of the volume in sectors, as seen by the partition table if any.
    pub(super) vol_sectors: u64,
    pub(super) geometry: Geometry,
    pub(super) fat: FatTable,
}

/// Deletion status of the long name fragments gathered so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Undetermined,
    Live,
    Deleted,
}

impl RunState {
    /// Records the status of a new slot, dropping the pending fragments when it
    /// does not match theirs. A long name never mixes live and deleted slots.
    fn track(&mut self, deleted: bool, pending: &mut VecDeque<(LfnEntry, u32)>) {
        let now = if deleted {
            RunState::Deleted
        } else {
            RunState::Live
        };
        if *self != RunState::Undetermined && *self != now && !pending.is_empty() {
            trace!("dropping {} fragments of a {:?} run", pending.len(), self);
            pending.clear();
        }
        *self = now;
    }
}

impl<D: Device> FATVol<D> {
    /// Mounts the FAT32 volume starting at byte `start` of the device.
    ///
    /// # Parameters
    /// - `device`: The device or image holding the volume
    /// - `start`: Byte offset of the boot sector on the device
    /// - `validate`: Whether to perform validation checks on the Bpb
    ///
    /// # Errors
    /// - `FATError::IOError` if the boot sector or the FAT cannot be read
    /// - Various `FATError` variants if the boot sector is invalid
    pub fn open(mut device: D, start: u64, validate: bool) -> Result<FATVol<D>, FATError> {
        let bpb = Bpb::from(&mut device, start, validate)?;
        let geometry = Geometry::from_bpb(&bpb)?;
        debug!("Volume at 0x{start:X}: {geometry:?}");

        let fat = FatTable::load(&mut device, start, geometry)?;

        Ok(FATVol {
            device,
            start,
            vol_sectors: geometry.total_sectors() as u64,
            geometry,
            fat,
        })
    }

    /// Records the size of the partition holding the volume, for layout display.
    pub fn with_sector_count(mut self, sectors: u64) -> Self {
        self.vol_sectors = sectors;
        self
    }

    /// Releases the underlying device.
    pub fn into_inner(self) -> D {
        self.device
    }

    pub fn bytes_per_sector(&self) -> u32 {
        self.geometry.bytes_per_sector()
    }

    pub fn sectors_per_cluster(&self) -> u32 {
        self.geometry.sectors_per_cluster()
    }

    pub fn reserved_sectors(&self) -> u32 {
        self.geometry.reserved_sectors()
    }

    pub fn num_fats(&self) -> u32 {
        self.geometry.num_fats()
    }

    pub fn total_clusters(&self) -> u32 {
        self.geometry.total_clusters()
    }

    pub fn allocated_clusters(&self) -> u32 {
        self.fat.allocated()
    }

    pub fn free_clusters(&self) -> u32 {
        self.fat.free()
    }

    /// Returns a handle on the root directory, cursor at its first slot.
    pub fn root_handler(&self) -> FileHandler {
        FileHandler::root(self.geometry.root_cluster())
    }

    /// Reads the slot under the cursor of `dir` and moves the cursor past it.
    ///
    /// Returns `None` once the directory's cluster chain is exhausted.
    fn read_slot(&mut self, dir: &mut FileHandler) -> Result<Option<[u8; DIR_ENTRY_SIZE]>, FATError> {
        let offset = *dir.offset();
        if offset % SLOT_SIZE != 0 {
            return Err(FATError::MisalignedDirOffset(offset));
        }

        let bpc = self.geometry.bytes_per_cluster();
        let mut cluster = *dir.fst_clus();
        let mut intra = offset;
        while intra >= bpc {
            cluster = self.fat.next(cluster)?;
            if is_eof(cluster) {
                return Ok(None);
            }
            intra -= bpc;
        }
        // A directory cluster is always allocated.
        if is_free(self.fat.next(cluster)?) {
            return Err(FATError::InvalidCluster(cluster));
        }

        let pos = self.start + self.geometry.cluster_byte_offset(cluster)? + intra as u64;
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        read_exact_at(&mut self.device, pos, &mut raw).map_err(FATError::io("reading DirEntry"))?;
        dir.set_offset(offset + SLOT_SIZE);

        Ok(Some(raw))
    }

    /// Returns the next logical entry of the directory `dir`, live or deleted.
    ///
    /// Starting at the cursor of `dir`, slots are read until a short name record
    /// is found. The long name fragments immediately preceding the record, with
    /// the same deletion status, form its long name. Empty slots are skipped and
    /// drop any pending fragment.
    ///
    /// # Returns
    /// - `Ok(Some(handle))` for the next entry
    /// - `Ok(None)` once the directory's cluster chain is exhausted
    ///
    /// # Errors
    /// - `FATError::NotADirectory` if `dir` is not a live directory
    /// - `FATError::MisalignedDirOffset` if the cursor is not on a slot boundary
    /// - `FATError::InvalidCluster` if the directory's chain leaves the data region
    ///   or reaches a free cluster
    /// - `FATError::IOError` if a slot cannot be read
    pub fn next_entry(&mut self, dir: &mut FileHandler) -> Result<Option<FileHandler>, FATError> {
        if !dir.is_dir() || dir.is_deleted() {
            return Err(FATError::NotADirectory);
        }

        let mut run = RunState::Undetermined;
        let mut pending: VecDeque<(LfnEntry, u32)> = VecDeque::new();

        loop {
            let Some(raw) = self.read_slot(dir)? else {
                trace!("end of directory at cluster {}", dir.fst_clus());
                return Ok(None);
            };
            let slot_offset = *dir.offset() - SLOT_SIZE;

            match DirSlot::decode(&raw)? {
                DirSlot::Empty => {
                    pending.clear();
                    run = RunState::Undetermined;
                }
                DirSlot::LongName { deleted, entry } => {
                    run.track(deleted, &mut pending);
                    // Fragments are stored last piece first.
                    pending.push_front((entry, slot_offset));
                }
                DirSlot::ShortName { deleted, entry } => {
                    run.track(deleted, &mut pending);

                    let long_name = decode_long_name(pending.iter().map(|(lfn, _)| lfn));
                    let lfn_offsets: Vec<u32> = pending.iter().map(|&(_, off)| off).collect();

                    let handle = FileHandler::new(
                        entry.short_name(),
                        long_name,
                        deleted,
                        entry.is_dir(),
                        entry.cluster_number(),
                        *entry.file_size(),
                        *dir.fst_clus(),
                        slot_offset,
                        lfn_offsets,
                    );
                    debug!(
                        "{} entry at {}:{}: {handle}",
                        if deleted { "deleted" } else { "live" },
                        dir.fst_clus(),
                        slot_offset
                    );
                    return Ok(Some(handle));
                }
            }
        }
    }

    /// Iterates over the remaining entries of the directory `dir`.
    pub fn entries<'a>(&'a mut self, dir: &'a mut FileHandler) -> DirEntries<'a, D> {
        DirEntries { vol: self, dir }
    }

    /// Checks that the data of a deleted file can still be trusted.
    fn check_deleted_readable(&self, fh: &FileHandler) -> Result<(), FATError> {
        if *fh.size() > self.geometry.bytes_per_cluster() {
            debug!("{}: deleted file spans several clusters", fh.short_name());
            return Err(FATError::BrokenFATChain);
        }
        if !self.geometry.is_valid_cluster(*fh.fst_clus()) {
            debug!("{}: deleted file has no valid first cluster", fh.short_name());
            return Err(FATError::BrokenFATChain);
        }
        if !is_free(self.fat.next(*fh.fst_clus())?) {
            debug!("{}: deleted file has been overwritten", fh.short_name());
            return Err(FATError::ClusterOccupied);
        }
        Ok(())
    }

    /// Translates a byte offset within a chain into a (cluster, offset in cluster) pair.
    fn locate(&self, fst_clus: u32, offset: u32) -> Result<(u32, u32), FATError> {
        let bpc = self.geometry.bytes_per_cluster();
        let mut cluster = fst_clus;
        for _ in 0..offset / bpc {
            cluster = self.fat.next(cluster)?;
        }
        Ok((cluster, offset % bpc))
    }

    /// Reads up to `buf.len()` bytes of the file at the cursor of `fh`, and
    /// advances the cursor.
    ///
    /// A deleted file is only read when its data is still intact: it must fit in
    /// one cluster whose FAT entry is free.
    ///
    /// # Returns
    /// - The number of bytes read, 0 at end of file
    ///
    /// # Errors
    /// - `FATError::NotAFile` if `fh` is a directory
    /// - `FATError::BrokenFATChain` or `FATError::ClusterOccupied` for a deleted
    ///   file which cannot be trusted
    /// - `FATError::IOError` if the device fails
    pub fn read(&mut self, fh: &mut FileHandler, buf: &mut [u8]) -> Result<usize, FATError> {
        if fh.is_dir() {
            return Err(FATError::NotAFile);
        }

        let offset = *fh.offset();
        if offset >= *fh.size() {
            return Ok(0);
        }
        if fh.is_deleted() {
            self.check_deleted_readable(fh)?;
        }

        let count = buf.len().min((*fh.size() - offset) as usize);
        let bpc = self.geometry.bytes_per_cluster();
        let (mut cluster, mut intra) = self.locate(*fh.fst_clus(), offset)?;

        let mut done = 0;
        while done < count {
            if intra == bpc {
                cluster = self.fat.next(cluster)?;
                intra = 0;
            }
            let run = ((bpc - intra) as usize).min(count - done);
            let pos = self.start + self.geometry.cluster_byte_offset(cluster)? + intra as u64;
            read_exact_at(&mut self.device, pos, &mut buf[done..done + run])
                .map_err(FATError::io("f32read"))?;

            done += run;
            intra += run as u32;
        }

        fh.set_offset(offset + done as u32);
        Ok(done)
    }

    /// Reads the whole file behind `fh`, from its current cursor to its end.
    pub fn read_to_end(&mut self, fh: &mut FileHandler) -> Result<Vec<u8>, FATError> {
        let mut data = vec![0u8; fh.size().saturating_sub(*fh.offset()) as usize];
        let mut filled = 0;
        while filled < data.len() {
            match self.read(fh, &mut data[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        data.truncate(filled);
        Ok(data)
    }

    /// Writes `data` into the file at the cursor of `fh`, never past the file's
    /// size, and advances the cursor.
    ///
    /// # Returns
    /// - The number of bytes written, 0 at end of file
    ///
    /// # Errors
    /// - `FATError::NotAFile` if `fh` is a directory
    /// - `FATError::WriteToDeleted` if `fh` is deleted
    /// - `FATError::IOError` if the device fails
    pub fn write(&mut self, fh: &mut FileHandler, data: &[u8]) -> Result<usize, FATError> {
        if fh.is_dir() {
            return Err(FATError::NotAFile);
        }
        if data.is_empty() {
            return Ok(0);
        }
        if fh.is_deleted() {
            return Err(FATError::WriteToDeleted);
        }

        let offset = *fh.offset();
        if offset >= *fh.size() {
            return Ok(0);
        }
        let count = data.len().min((*fh.size() - offset) as usize);
        self.write_unclipped(fh, &data[..count])
    }

    /// Overwrites bytes of a directory at the cursor of the live directory handle
    /// `slot`, which is advanced.
    pub(super) fn patch_dir(&mut self, slot: &mut FileHandler, data: &[u8]) -> Result<usize, FATError> {
        if !slot.is_dir() || slot.is_deleted() {
            return Err(FATError::NotADirectory);
        }
        self.write_unclipped(slot, data)
    }

    fn write_unclipped(&mut self, fh: &mut FileHandler, data: &[u8]) -> Result<usize, FATError> {
        let offset = *fh.offset();
        let bpc = self.geometry.bytes_per_cluster();
        let (mut cluster, mut intra) = self.locate(*fh.fst_clus(), offset)?;

        let mut done = 0;
        while done < data.len() {
            if intra == bpc {
                cluster = self.fat.next(cluster)?;
                intra = 0;
            }
            let run = ((bpc - intra) as usize).min(data.len() - done);
            let pos = self.start + self.geometry.cluster_byte_offset(cluster)? + intra as u64;
            write_all_at(&mut self.device, pos, &data[done..done + run])
                .map_err(FATError::io("f32write"))?;

            done += run;
            intra += run as u32;
        }

        fh.set_offset(offset + done as u32);
        Ok(done)
    }

    /// Returns the starting sector of the volume on the device.
    fn rsvd_start(&self) -> u64 {
        self.start / self.geometry.bytes_per_sector() as u64
    }

    /// Returns the starting sector of the first FAT.
    fn fat_start(&self) -> u64 {
        self.rsvd_start() + self.geometry.reserved_sectors() as u64
    }

    /// Returns the starting sector of the data region.
    fn data_start(&self) -> u64 {
        self.fat_start() + self.geometry.num_fats() as u64 * self.geometry.fat_size_sectors() as u64
    }

    /// Returns the ending sector of the data region.
    fn data_end(&self) -> u64 {
        self.data_start()
            + self.geometry.total_clusters() as u64 * self.geometry.sectors_per_cluster() as u64
    }
}

/// Iterator over the entries of a directory, see [`FATVol::next_entry`].
pub struct DirEntries<'a, D: Device> {
    vol: &'a mut FATVol<D>,
    dir: &'a mut FileHandler,
}

impl<D: Device> Iterator for DirEntries<'_, D> {
    type Item = Result<FileHandler, FATError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.vol.next_entry(self.dir).transpose()
    }
}

/// Implements the LayoutDisplay trait for FATVol
impl<D: Device> LayoutDisplay for FATVol<D> {
    fn display_layout(&self, indent: u8) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        let indent = " ".repeat(indent.into());
        let end = self.rsvd_start() + self.vol_sectors;

        writeln!(out, "{}┌{:─^55}┐", indent, " FAT32 Volume Layout ")?;
        writeln!(
            out,
            "{}├{:^12}┬{:^12}┬{:^12}┬{:^16}┤",
            indent, "Region", "Start", "End", "Description"
        )?;
        writeln!(
            out,
            "{}├{:─<12}┼{:─<12}┼{:─<12}┼{:─<16}┤",
            indent, "", "", "", ""
        )?;

        let mut row = |region: &str, start: u64, end: u64, desc: &str| {
            writeln!(
                out,
                "{}│{:<12}│{:<12}│{:<12}│{:<16}│",
                indent, region, start, end, desc
            )
        };

        row("Reserved", self.rsvd_start(), self.fat_start(), "Boot + Reserved")?;
        let fat_sz = self.geometry.fat_size_sectors() as u64;
        for i in 0..self.geometry.num_fats() as u64 {
            let fat_i_start = self.fat_start() + i * fat_sz;
            row(&format!("FAT #{i}"), fat_i_start, fat_i_start + fat_sz, "FAT Tables")?;
        }
        row("Data", self.data_start(), self.data_end(), "Cluster Data")?;
        if self.data_end() < end {
            row("", self.data_end(), end, "Volume Slack")?;
        }

        writeln!(
            out,
            "{}└{:─<12}┴{:─<12}┴{:─<12}┴{:─<16}┘",
            indent, "", "", "", ""
        )?;

        Ok(out)
    }
}
