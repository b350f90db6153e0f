//! Handle on a directory entry, live or deleted.

use getset::Getters;
use std::fmt;

/// Snapshot of one logical directory entry plus a read/write cursor.
///
/// Handles are produced by the directory walker. They are values: cloning one
/// yields an independent cursor, and on-disk changes made afterwards are not
/// reflected. The cursor is only advanced through `&mut` access by the volume.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct FileHandler {
    /// 8.3 name, `NAME.EXT`.
    #[get = "pub"]
    short_name: String,
    /// Long name, empty when the entry has none.
    #[get = "pub"]
    long_name: String,
    is_dir: bool,
    is_deleted: bool,
    /// First cluster of the entry's data.
    #[get = "pub"]
    fst_clus: u32,
    /// Size in bytes. Meaningless for directories.
    #[get = "pub"]
    size: u32,
    /// Cursor, relative to the start of the entry's data.
    #[get = "pub"]
    offset: u32,
    /// First cluster of the parent directory.
    #[get = "pub"]
    dir_clus: u32,
    /// Byte offset of the short name record within the parent directory.
    #[get = "pub"]
    dir_offset: u32,
    /// Byte offsets of the long name fragments within the parent directory,
    /// starting with the fragment closest to the record.
    #[get = "pub"]
    lfn_offsets: Vec<u32>,
}

impl FileHandler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        short_name: String,
        long_name: String,
        is_deleted: bool,
        is_dir: bool,
        fst_clus: u32,
        size: u32,
        dir_clus: u32,
        dir_offset: u32,
        lfn_offsets: Vec<u32>,
    ) -> Self {
        FileHandler {
            short_name,
            long_name,
            is_dir,
            is_deleted,
            fst_clus,
            size,
            offset: 0,
            dir_clus,
            dir_offset,
            lfn_offsets,
        }
    }

    /// Handle on the root directory, starting at `root_clus`.
    pub(crate) fn root(root_clus: u32) -> Self {
        FileHandler::new(
            String::new(),
            String::new(),
            false,
            true,
            root_clus,
            0,
            root_clus,
            0,
            vec![],
        )
    }

    /// Live directory handle positioned on the raw slot at `offset` of the
    /// directory starting at `dir_clus`.
    ///
    /// Used to patch directory entry bytes in place.
    pub(crate) fn raw_slot(dir_clus: u32, offset: u32) -> Self {
        let mut handle = FileHandler::root(dir_clus);
        handle.offset = offset;
        handle
    }

    pub fn has_long_name(&self) -> bool {
        !self.long_name.is_empty()
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Moves the cursor.
    pub fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }
}

/// `SHORT[/], LONG[/], size, cluster`, the long part being omitted when empty.
impl fmt::Display for FileHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir_mark = if self.is_dir { "/" } else { "" };

        write!(f, "{}{dir_mark}, ", self.short_name)?;
        if self.has_long_name() {
            write!(f, "{}{dir_mark}, ", self.long_name)?;
        }
        write!(f, "{}, {}", self.size, self.fst_clus)
    }
}
