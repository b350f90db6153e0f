//! FAT32 data access: boot sector, FAT cache, directory entries, file data and recovery.

pub mod bpb;
pub mod dir_entry;
pub mod fat;
pub mod fat_error;
pub mod fat_table;
pub mod fat_type;
pub mod file_handler;
pub mod geometry;
pub mod recovery;
