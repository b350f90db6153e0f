//! FAT directory entry structures and parsing.
//!
//! A directory is an array of 32-byte slots. Each slot is one of:
//! - empty (never used),
//! - a short name (8.3) record holding the file metadata,
//! - a long name fragment holding up to 13 UTF-16 code units of the file's long name.
//!
//! Records and fragments may carry the delete marker in their first byte.
//! The kind of a slot only depends on its status byte (offset 0) and its
//! attribute byte (offset 11).

use binread::{BinRead, BinReaderExt};
use getset::Getters;
use std::io;

use super::fat_error::FATError;

/// Size in bytes of a directory slot.
pub const DIR_ENTRY_SIZE: usize = 32;
/// Attribute value identifying a long name fragment.
pub const ATTR_LONG_NAME: u8 = 0x0F;
/// Attribute bit of a directory.
pub const ATTR_DIRECTORY: u8 = 0x10;
/// Status byte of a deleted slot.
pub const DELETED_MARK: u8 = 0xE5;
/// Status byte of a slot that was never used.
pub const EMPTY_MARK: u8 = 0x00;
/// Sequence number bit flagging the last fragment of a long name.
pub const LFN_LAST_FRAGMENT: u8 = 0x40;

const SHORT_NAME_PAD: u8 = 0x20;
const LFN_TERMINATOR: u16 = 0x0000;

const STATUS_OFFSET: usize = 0;
const ATTR_OFFSET: usize = 11;

/// Short name (8.3) directory record.
#[derive(BinRead, Debug, Clone, Getters)]
#[br(little)]
pub struct DirEntry {
    /// Base name, padded with spaces. The first byte doubles as the status byte.
    name: [u8; 8],
    /// Extension, padded with spaces.
    ext: [u8; 3],
    /// File attributes byte
    #[get = "pub"]
    attr: u8,
    _nt_res: u8,
    _crt_time_tenth: u8,
    _crt_time: u16,
    _crt_date: u16,
    _lst_acc_date: u16,
    /// High 16 bits of first cluster number
    fst_clus_hi: u16,
    _wrt_time: u16,
    _wrt_date: u16,
    /// Low 16 bits of first cluster number
    fst_clus_lo: u16,
    /// File size in bytes (0 for directories)
    #[get = "pub"]
    file_size: u32,
}

impl DirEntry {
    /// Returns the 8.3 name as `NAME.EXT`, or `NAME` when the extension is blank.
    ///
    /// Each field ends at its first padding space. Bytes are mapped one to one to
    /// characters, so a deleted record starts with `'\u{E5}'`.
    pub fn short_name(&self) -> String {
        let field = |raw: &[u8]| -> String {
            raw.iter()
                .take_while(|&&b| b != SHORT_NAME_PAD)
                .map(|&b| b as char)
                .collect()
        };

        let name = field(&self.name);
        let ext = field(&self.ext);
        if ext.is_empty() {
            name
        } else {
            format!("{name}.{ext}")
        }
    }

    /// Returns the complete first cluster number for this entry:
    /// `(fst_clus_hi << 16) | fst_clus_lo`.
    pub fn cluster_number(&self) -> u32 {
        ((self.fst_clus_hi as u32) << 16) | self.fst_clus_lo as u32
    }

    /// Checks if the directory attribute bit (0x10) is set.
    pub fn is_dir(&self) -> bool {
        self.attr & ATTR_DIRECTORY != 0
    }
}

/// Long file name fragment.
#[derive(BinRead, Debug, Clone, Getters)]
#[br(little)]
pub struct LfnEntry {
    /// Sequence number, ORed with 0x40 on the last fragment of a name.
    #[get = "pub"]
    ord: u8,
    name1: [u16; 5],
    _attr: u8,
    _kind: u8,
    _checksum: u8,
    name2: [u16; 6],
    _fst_clus_lo: u16,
    name3: [u16; 2],
}

impl LfnEntry {
    /// Returns the UTF-16 code units carried by this fragment.
    ///
    /// The three name fields are read in order; the first NUL code unit ends the segment.
    pub fn name_units(&self) -> impl Iterator<Item = u16> + '_ {
        self.name1
            .iter()
            .chain(self.name2.iter())
            .chain(self.name3.iter())
            .copied()
            .take_while(|&unit| unit != LFN_TERMINATOR)
    }
}

/// Assembles a long name from its fragments, given in reading order.
///
/// The code units of all fragments are joined before decoding, as a
/// surrogate pair may be split between two fragments.
pub fn decode_long_name<'a>(fragments: impl IntoIterator<Item = &'a LfnEntry>) -> String {
    let units: Vec<u16> = fragments.into_iter().flat_map(LfnEntry::name_units).collect();
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Decoded view of one 32-byte directory slot.
#[derive(Debug, Clone)]
pub enum DirSlot {
    /// Never used.
    Empty,
    /// Long name fragment, possibly deleted.
    LongName { deleted: bool, entry: LfnEntry },
    /// Short name record, possibly deleted.
    ShortName { deleted: bool, entry: DirEntry },
}

impl DirSlot {
    /// Classifies and decodes a raw directory slot.
    ///
    /// # Errors
    /// - `FATError::BinReadError` if the slot cannot be decoded
    pub fn decode(raw: &[u8; DIR_ENTRY_SIZE]) -> Result<Self, FATError> {
        let status = raw[STATUS_OFFSET];
        if status == EMPTY_MARK {
            return Ok(DirSlot::Empty);
        }
        let deleted = status == DELETED_MARK;

        let mut reader = io::Cursor::new(&raw[..]);
        if raw[ATTR_OFFSET] == ATTR_LONG_NAME {
            Ok(DirSlot::LongName {
                deleted,
                entry: reader.read_le()?,
            })
        } else {
            Ok(DirSlot::ShortName {
                deleted,
                entry: reader.read_le()?,
            })
        }
    }
}
