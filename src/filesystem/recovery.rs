//! Recovery of deleted files.
//!
//! Only files fitting in their first cluster are recovered. Their data is
//! trusted when that cluster has not been claimed by a newer chain.

use log::{debug, info};

use super::dir_entry::LFN_LAST_FRAGMENT;
use super::fat::FATVol;
use super::fat_error::FATError;
use super::fat_table::{FAT_EOF, is_free};
use super::file_handler::FileHandler;
use crate::traits::Device;

impl<D: Device> FATVol<D> {
    /// Restores the deleted file `fh` as a live single-cluster file.
    ///
    /// The status byte of its short name record is replaced by `first_char`
    /// (uppercased). When `restore_long_name` is set, the sequence numbers of its
    /// long name fragments are rewritten as well. Finally the first cluster is
    /// marked as the end of its chain.
    ///
    /// The writes are not atomic: an I/O failure between them leaves the entry
    /// partially restored.
    ///
    /// # Errors
    /// - `FATError::InvalidRecoveryChar` if `first_char` is not ASCII alphanumeric
    /// - `FATError::NotDeleted` or `FATError::RecoverDirectory` for an ineligible handle
    /// - `FATError::BrokenFATChain` if the file is larger than one cluster
    /// - `FATError::ClusterOccupied` if the file's cluster has been reused
    /// - `FATError::IOError` if the device fails
    pub fn recover(
        &mut self,
        fh: &FileHandler,
        first_char: char,
        restore_long_name: bool,
    ) -> Result<(), FATError> {
        if !first_char.is_ascii_alphanumeric() {
            return Err(FATError::InvalidRecoveryChar(first_char));
        }
        let status = first_char.to_ascii_uppercase() as u8;
        if !fh.is_deleted() {
            return Err(FATError::NotDeleted);
        }
        if fh.is_dir() {
            return Err(FATError::RecoverDirectory);
        }

        if *fh.size() > self.geometry.bytes_per_cluster() {
            debug!("{}: {} bytes do not fit in one cluster", fh.short_name(), fh.size());
            return Err(FATError::BrokenFATChain);
        }

        // An empty file owns no cluster. Otherwise the cluster's FAT entry must
        // still be free.
        let fst_clus = *fh.fst_clus();
        if !is_free(fst_clus) && !is_free(self.fat.next(fst_clus)?) {
            debug!("{}: cluster {fst_clus} is in use", fh.short_name());
            return Err(FATError::ClusterOccupied);
        }

        let mut record = FileHandler::raw_slot(*fh.dir_clus(), *fh.dir_offset());
        self.patch_dir(&mut record, &[status])?;

        if restore_long_name && !fh.lfn_offsets().is_empty() {
            // Offsets start with the fragment closest to the record, which is #1.
            let last = fh.lfn_offsets().len() - 1;
            for (i, &offset) in fh.lfn_offsets().iter().enumerate() {
                let mut ord = i as u8 + 1;
                if i == last {
                    ord |= LFN_LAST_FRAGMENT;
                }
                let mut fragment = FileHandler::raw_slot(*fh.dir_clus(), offset);
                self.patch_dir(&mut fragment, &[ord])?;
            }
        }

        self.fat.set_next(&mut self.device, fst_clus, FAT_EOF)?;

        info!(
            "recovered {} as {}{} (cluster {fst_clus}, {} bytes)",
            fh.short_name(),
            status as char,
            fh.short_name().chars().skip(1).collect::<String>(),
            fh.size()
        );
        Ok(())
    }
}
