//! Partition table support, used to find a FAT32 volume inside a whole-disk image.

pub mod disk_error;
pub mod mbr;
