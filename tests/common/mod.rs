//! Shared helpers for the integration tests.
//!
//! Every test image has the same geometry:
//!   512 bytes per sector, 1 sector per cluster, 32 reserved sectors,
//!   2 FATs of 1 sector, 134 sectors in total, hence 100 clusters.
//! The root directory is a single cluster, #2, unless a test chains more.

#![allow(dead_code)]

use std::cell::Cell;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use fat_recovery::FATVol;

pub const BPS: usize = 512;
pub const BPC: usize = 512;
pub const RESERVED: usize = 32;
pub const FAT_SECTORS: usize = 1;
pub const NUM_FATS: usize = 2;
pub const TOTAL_SECTORS: usize = 134;
pub const TOTAL_CLUSTERS: u32 = 100;
pub const ROOT: u32 = 2;
pub const EOF: u32 = 0x0FFF_FFFF;

pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const DELETED: u8 = 0xE5;

/// Byte offset of FAT copy `copy`.
pub fn fat_offset(copy: usize) -> usize {
    (RESERVED + copy * FAT_SECTORS) * BPS
}

/// Byte offset of the first byte of `cluster`.
pub fn cluster_offset(cluster: u32) -> usize {
    (RESERVED + NUM_FATS * FAT_SECTORS) * BPS + (cluster as usize - 2) * BPC
}

/// Reads the FAT entry of `cluster` in FAT copy `copy` of a raw image.
pub fn fat_entry(img: &[u8], copy: usize, cluster: u32) -> u32 {
    let off = fat_offset(copy) + cluster as usize * 4;
    u32::from_le_bytes(img[off..off + 4].try_into().unwrap())
}

/// Builds an 8.3 directory record.
pub fn sfn(name: &[u8; 11], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut raw = [0u8; 32];
    raw[0..11].copy_from_slice(name);
    raw[11] = attr;
    raw[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    raw[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    raw[28..32].copy_from_slice(&size.to_le_bytes());
    raw
}

/// Builds a deleted 8.3 directory record.
pub fn deleted_sfn(name: &[u8; 11], cluster: u32, size: u32) -> [u8; 32] {
    let mut raw = sfn(name, ATTR_ARCHIVE, cluster, size);
    raw[0] = DELETED;
    raw
}

/// Builds a long name fragment holding up to 13 characters of `segment`.
pub fn lfn(ord: u8, segment: &str) -> [u8; 32] {
    let units: Vec<u16> = segment.encode_utf16().collect();
    lfn_units(ord, &units)
}

/// Builds a long name fragment from raw UTF-16 code units.
pub fn lfn_units(ord: u8, units: &[u16]) -> [u8; 32] {
    assert!(units.len() <= 13, "segment too long: {units:?}");
    let mut units = units.to_vec();
    if units.len() < 13 {
        units.push(0x0000);
    }
    units.resize(13, 0xFFFF);

    let mut raw = [0u8; 32];
    raw[0] = ord;
    raw[11] = 0x0F;
    let positions = (1..11)
        .step_by(2)
        .chain((14..26).step_by(2))
        .chain((28..32).step_by(2));
    for (pos, unit) in positions.zip(units) {
        raw[pos..pos + 2].copy_from_slice(&unit.to_le_bytes());
    }
    raw
}

/// Builds a deleted long name fragment.
pub fn deleted_lfn(segment: &str) -> [u8; 32] {
    lfn(DELETED, segment)
}

/// Splits `name` into long name fragments, in on-disk order, the last piece first.
///
/// Pieces are cut every 13 code units, even inside a surrogate pair.
pub fn lfn_run(name: &str, deleted: bool) -> Vec<[u8; 32]> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let pieces: Vec<&[u16]> = units.chunks(13).collect();
    let count = pieces.len();
    pieces
        .iter()
        .enumerate()
        .rev()
        .map(|(i, piece)| {
            let mut ord = i as u8 + 1;
            if i + 1 == count {
                ord |= 0x40;
            }
            lfn_units(if deleted { DELETED } else { ord }, piece)
        })
        .collect()
}

/// In-memory FAT32 image under construction.
pub struct ImageBuilder {
    img: Vec<u8>,
}

impl ImageBuilder {
    /// An empty volume: both FATs hold the media and EOF markers plus the root cluster.
    pub fn new() -> Self {
        let mut img = vec![0u8; TOTAL_SECTORS * BPS];

        img[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
        img[3..11].copy_from_slice(b"MSWIN4.1");
        img[11..13].copy_from_slice(&(BPS as u16).to_le_bytes());
        img[13] = (BPC / BPS) as u8;
        img[14..16].copy_from_slice(&(RESERVED as u16).to_le_bytes());
        img[16] = NUM_FATS as u8;
        img[21] = 0xF8;
        img[32..36].copy_from_slice(&(TOTAL_SECTORS as u32).to_le_bytes());
        img[36..40].copy_from_slice(&(FAT_SECTORS as u32).to_le_bytes());
        img[44..48].copy_from_slice(&ROOT.to_le_bytes());
        img[66] = 0x29;
        img[82..90].copy_from_slice(b"FAT32   ");
        img[510] = 0x55;
        img[511] = 0xAA;

        ImageBuilder { img }
            .fat(0, 0x0FFF_FFF8)
            .fat(1, EOF)
            .fat(ROOT, EOF)
    }

    /// Sets the FAT entry of `cluster` in every copy.
    pub fn fat(mut self, cluster: u32, value: u32) -> Self {
        for copy in 0..NUM_FATS {
            let off = fat_offset(copy) + cluster as usize * 4;
            self.img[off..off + 4].copy_from_slice(&value.to_le_bytes());
        }
        self
    }

    /// Links `clusters` into one chain ending with EOF.
    pub fn chain(mut self, clusters: &[u32]) -> Self {
        for pair in clusters.windows(2) {
            self = self.fat(pair[0], pair[1]);
        }
        match clusters.last() {
            Some(&last) => self.fat(last, EOF),
            None => self,
        }
    }

    /// Writes a raw directory slot at index `index` of `cluster`.
    pub fn slot(mut self, cluster: u32, index: usize, raw: [u8; 32]) -> Self {
        let off = cluster_offset(cluster) + index * 32;
        self.img[off..off + 32].copy_from_slice(&raw);
        self
    }

    /// Writes consecutive slots of the root directory, starting at its first slot.
    pub fn root(mut self, slots: &[[u8; 32]]) -> Self {
        for (index, raw) in slots.iter().enumerate() {
            self = self.slot(ROOT, index, *raw);
        }
        self
    }

    /// Writes `data` starting at the first byte of `cluster`, spilling into the
    /// following clusters on the image.
    pub fn data(mut self, cluster: u32, data: &[u8]) -> Self {
        let off = cluster_offset(cluster);
        self.img[off..off + data.len()].copy_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.img
    }

    pub fn device(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.img)
    }

    /// Mounts the image, without validation since the volume is too small for FAT32.
    pub fn mount(self) -> FATVol<Cursor<Vec<u8>>> {
        FATVol::open(self.device(), 0, false).unwrap()
    }
}

/// Wraps a device and counts the seeks performed on it.
pub struct CountingDevice<D> {
    inner: D,
    seeks: Rc<Cell<usize>>,
}

impl<D> CountingDevice<D> {
    /// Returns the wrapper and a shared view on its seek counter.
    pub fn new(inner: D) -> (Self, Rc<Cell<usize>>) {
        let seeks = Rc::new(Cell::new(0));
        (
            CountingDevice {
                inner,
                seeks: seeks.clone(),
            },
            seeks,
        )
    }
}

impl<D: Read> Read for CountingDevice<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<D: Write> Write for CountingDevice<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<D: Seek> Seek for CountingDevice<D> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seeks.set(self.seeks.get() + 1);
        self.inner.seek(pos)
    }
}
