//!
//! fat_recovery: A library and CLI for recovering deleted files from FAT32 volumes.
//!
//! This crate provides tools for:
//! - Mounting a FAT32 volume held by an image, a device, or an MBR partition
//! - Walking directories, live and deleted entries alike, with their long names
//! - Reading and writing file data across cluster boundaries
//! - Restoring deleted single-cluster files in place
//!
//! # Re-exports
//! - [`FATVol`]: FAT volume abstraction
//! - [`FileHandler`]: Handle on a directory entry
//! - [`FATError`]: Errors raised by volume operations

pub mod actions;
pub mod commands;
pub mod filesystem;
pub mod partition;
pub mod traits;
pub mod utils;

/// FAT volume abstraction (see [`filesystem::fat::FATVol`]).
pub use crate::filesystem::fat::FATVol;
/// Errors raised by volume operations (see [`filesystem::fat_error::FATError`]).
pub use crate::filesystem::fat_error::FATError;
/// Handle on a directory entry (see [`filesystem::file_handler::FileHandler`]).
pub use crate::filesystem::file_handler::FileHandler;
