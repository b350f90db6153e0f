//! Error types for FAT32 volume access and recovery.
//!
//! Errors fall in four groups:
//! - I/O errors: the device failed or ran out of data. Fatal to the current operation.
//! - Domain verification errors (`ClusterOccupied`, `BrokenFATChain`): a deleted file
//!   cannot be safely recovered. Callers may skip the candidate and move on.
//! - Precondition errors: the caller broke the contract of an operation
//!   (see [`FATError::is_precondition`]).
//! - Boot sector validation errors.
//!
//! End of a directory or of a file is not an error: scans return `Ok(None)` and
//! reads return `Ok(0)`.

use std::io;
use thiserror::Error;

/// Errors that can occur while accessing a FAT32 volume.
#[derive(Error, Debug)]
pub enum FATError {
    /// The first three bytes of a FAT volume must contain a valid x86 jump instruction.
    #[error("Invalid jump instruction `{0}`")]
    InvalidJmp(String),

    /// Bytes per sector must be 512, 1024, 2048 or 4096.
    #[error("Invalid count of bytes per sector: `{0}`. Legal values: 512, 1024, 2048 or 4096")]
    InvalidBytesPerSec(u16),

    /// Sectors per cluster must be a power of 2: 1, 2, 4, 8, 16, 32, 64, or 128.
    #[error(
        "Invalid number of sector per cluster: `{0}`. Legal values: 1, 2, 4, 8, 16, 32, 64, 128"
    )]
    InvalidSecPerClus(u8),

    /// Total cluster size (bytes per sector × sectors per cluster) must not exceed 32 KiB.
    #[error("Invalid cluster size: `{0}`. Any value greater than 32K is invalid.")]
    InvalidClusSz(u32),

    /// The count of reserved sectors must be greater than 0.
    #[error("Invalid count of reserved sectors: `{0}`. Any value greater than 0 is valid.")]
    InvalidRsvdSecCnt(u16),

    /// The number of File Allocation Tables must be greater than 0.
    #[error("Invalid number of FATs on this volume: `{0}`.")]
    InvalidNumFat(u8),

    /// For FAT32 volumes, the root directory entries count must be 0.
    #[error(
        "Invalid count of directory entries in the root directory: `{0}`. It should be 0 for a FAT32 volume. "
    )]
    InvalidRootEntCnt(u16),

    /// The total sector count must be valid for the volume size.
    #[error("Invalid total count of sectors on the volume: `{0}`")]
    InvalidTotSec(String),

    /// The FAT size in sectors must be valid and consistent with the volume layout.
    #[error("Invalid FAT size:`{0}`")]
    InvalidFatSz(String),

    /// The root directory's first cluster number must be at least 2.
    #[error(
        "Invalid cluster number of the first cluster of the root directory: `{0}`. This value should be at least 2."
    )]
    InvalidRootClus(u32),

    /// The boot sector signature must be 0x55AA.
    #[error("Invalid BPB signature: `{0}`. Expected signature: 0x55AA")]
    InvalidSignature(String),

    /// The detected FAT type is not supported (only FAT32 is supported).
    #[error("Unsupported FAT type: `{0}`")]
    UnsupportedFATType(String),

    /// Parsing error occured during structure initialization
    #[error("BinRead Error: `{0}`")]
    BinReadError(binread::Error),

    /// The device failed, or ended before the requested byte count was transferred.
    #[error("IO Error while {context}: `{source}`")]
    IOError { context: String, source: io::Error },

    /// The deleted file's cluster has been claimed by a newer allocation.
    #[error("cluster occupied")]
    ClusterOccupied,

    /// The deleted file spans several clusters whose chain cannot be trusted.
    #[error("broken FAT chain")]
    BrokenFATChain,

    /// A cluster index outside `2..total_clusters` was used.
    #[error("Cluster index `{0}` out of range")]
    InvalidCluster(u32),

    /// Writing through a handle flagged as deleted.
    #[error("Cannot write to a deleted file")]
    WriteToDeleted,

    /// The replacement first character of a recovered name must be alphanumeric.
    #[error("Invalid first character `{0}`: it should be alphanumeric")]
    InvalidRecoveryChar(char),

    /// Recovering an entry that is not deleted.
    #[error("Cannot recover an existing entry")]
    NotDeleted,

    /// Recovering a directory.
    #[error("Cannot recover a directory")]
    RecoverDirectory,

    /// Scanning a handle that is not a live directory.
    #[error("Handle is not a directory or is deleted")]
    NotADirectory,

    /// Reading file data through a directory handle.
    #[error("Cannot read a directory as a file")]
    NotAFile,

    /// A directory cursor must sit on a directory entry boundary.
    #[error("Invalid offset `{0}` for a directory entry")]
    MisalignedDirOffset(u32),
}

impl FATError {
    /// Builds a closure wrapping an `io::Error` with the name of the failing operation.
    ///
    /// An end-of-data condition is reported as an unexpected EOF of that operation.
    pub(crate) fn io(context: &str) -> impl FnOnce(io::Error) -> FATError + '_ {
        move |source| {
            let context = if source.kind() == io::ErrorKind::UnexpectedEof {
                format!("{context} (unexpected EOF)")
            } else {
                context.to_string()
            };
            FATError::IOError { context, source }
        }
    }

    /// Returns `true` for errors caused by a caller breaking an operation's contract.
    ///
    /// These are never retried.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            FATError::InvalidCluster(_)
                | FATError::WriteToDeleted
                | FATError::InvalidRecoveryChar(_)
                | FATError::NotDeleted
                | FATError::RecoverDirectory
                | FATError::NotADirectory
                | FATError::NotAFile
                | FATError::MisalignedDirOffset(_)
        )
    }

    /// Returns `true` for the recoverable verification failures of a deleted file.
    pub fn is_unrecoverable_file(&self) -> bool {
        matches!(self, FATError::ClusterOccupied | FATError::BrokenFATChain)
    }
}

/// Converts standard I/O errors into FATError.
impl From<io::Error> for FATError {
    fn from(err: io::Error) -> Self {
        FATError::io("accessing the device")(err)
    }
}

/// Converts BinRead errors into FATError.
impl From<binread::Error> for FATError {
    fn from(err: binread::Error) -> Self {
        match err {
            binread::Error::Io(err) => FATError::io("decoding an on-disk structure")(err),
            err => FATError::BinReadError(err),
        }
    }
}
