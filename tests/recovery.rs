//! Restoring deleted files in place.

mod common;

use std::io::Cursor;

use common::*;
use fat_recovery::{FATError, FATVol, FileHandler};

fn root_entries(vol: &mut FATVol<Cursor<Vec<u8>>>) -> Vec<FileHandler> {
    let mut root = vol.root_handler();
    let entries = vol.entries(&mut root).collect::<Result<_, _>>();
    entries.unwrap()
}

/// Runs a recovery expected to fail and checks that the image is left untouched.
fn assert_untouched(builder: ImageBuilder, first_char: char, expected: fn(&FATError) -> bool) {
    let before = builder.build();
    let mut vol = FATVol::open(Cursor::new(before.clone()), 0, false).unwrap();
    let fh = root_entries(&mut vol).remove(0);

    let err = vol.recover(&fh, first_char, true).unwrap_err();
    assert!(expected(&err), "unexpected error: {err:?}");
    assert_eq!(vol.into_inner().into_inner(), before);
}

// ============================================================================
// Restored files
// ============================================================================

#[test]
fn test_recover_single_cluster_file() {
    let mut vol = ImageBuilder::new()
        .root(&[deleted_sfn(b"FILE    TXT", 5, 100)])
        .data(5, &[7u8; 100])
        .mount();
    let fh = root_entries(&mut vol).remove(0);
    let allocated = vol.allocated_clusters();

    vol.recover(&fh, 'f', false).unwrap();
    assert_eq!(vol.allocated_clusters(), allocated + 1);

    let img = vol.into_inner().into_inner();
    assert_eq!(img[cluster_offset(ROOT)], b'F');
    assert_eq!(fat_entry(&img, 0, 5), EOF);
    assert_eq!(fat_entry(&img, 1, 5), EOF);

    // A fresh mount sees the file as live, with its data.
    let mut vol = FATVol::open(Cursor::new(img), 0, false).unwrap();
    let mut fh = root_entries(&mut vol).remove(0);
    assert!(!fh.is_deleted());
    assert_eq!(fh.short_name(), "FILE.TXT");
    assert_eq!(*fh.size(), 100);
    assert_eq!(*fh.fst_clus(), 5);
    assert_eq!(vol.read_to_end(&mut fh).unwrap(), vec![7u8; 100]);
}

#[test]
fn test_recover_empty_file() {
    let mut vol = ImageBuilder::new()
        .root(&[deleted_sfn(b"EMPTY   TXT", 0, 0)])
        .mount();
    let fh = root_entries(&mut vol).remove(0);

    vol.recover(&fh, 'E', false).unwrap();
    let img = vol.into_inner().into_inner();
    assert_eq!(img[cluster_offset(ROOT)], b'E');
}

#[test]
fn test_recover_restores_long_name_fragments() {
    let mut vol = ImageBuilder::new()
        .root(&[
            deleted_lfn("name.txt"),
            deleted_lfn("a very long "),
            deleted_sfn(b"AVERYL~1TXT", 9, 20),
        ])
        .mount();
    let fh = root_entries(&mut vol).remove(0);
    assert_eq!(fh.long_name(), "a very long name.txt");

    vol.recover(&fh, 'a', true).unwrap();
    let img = vol.into_inner().into_inner();
    let root = cluster_offset(ROOT);
    assert_eq!(img[root], 0x42);
    assert_eq!(img[root + 32], 0x01);
    assert_eq!(img[root + 64], b'A');

    let mut vol = FATVol::open(Cursor::new(img), 0, false).unwrap();
    let fh = root_entries(&mut vol).remove(0);
    assert!(!fh.is_deleted());
    assert_eq!(fh.short_name(), "AVERYL~1.TXT");
    assert_eq!(fh.long_name(), "a very long name.txt");
}

#[test]
fn test_recover_without_long_name_leaves_fragments_deleted() {
    let mut vol = ImageBuilder::new()
        .root(&[deleted_lfn("x.txt"), deleted_sfn(b"X       TXT", 9, 20)])
        .mount();
    let fh = root_entries(&mut vol).remove(0);

    vol.recover(&fh, 'X', false).unwrap();
    let img = vol.into_inner().into_inner();
    assert_eq!(img[cluster_offset(ROOT)], DELETED);
    assert_eq!(img[cluster_offset(ROOT) + 32], b'X');
}

// ============================================================================
// Refused recoveries
// ============================================================================

#[test]
fn test_multi_cluster_file_is_not_recovered() {
    assert_untouched(
        ImageBuilder::new().root(&[deleted_sfn(b"BIG     BIN", 5, 513)]),
        'B',
        |e| matches!(e, FATError::BrokenFATChain),
    );
}

#[test]
fn test_reused_cluster_is_not_recovered() {
    assert_untouched(
        ImageBuilder::new()
            .root(&[deleted_sfn(b"OLD     TXT", 5, 100)])
            .chain(&[5, 6]),
        'O',
        |e| matches!(e, FATError::ClusterOccupied),
    );
}

#[test]
fn test_invalid_replacement_char() {
    assert_untouched(
        ImageBuilder::new().root(&[deleted_sfn(b"FILE    TXT", 5, 100)]),
        '_',
        |e| matches!(e, FATError::InvalidRecoveryChar('_')),
    );
}

#[test]
fn test_live_file_is_not_recovered() {
    assert_untouched(
        ImageBuilder::new()
            .root(&[sfn(b"LIVE    TXT", ATTR_ARCHIVE, 5, 100)])
            .fat(5, EOF),
        'L',
        |e| matches!(e, FATError::NotDeleted),
    );
}

#[test]
fn test_deleted_directory_is_not_recovered() {
    let mut dir = sfn(b"SUB        ", ATTR_DIRECTORY, 5, 0);
    dir[0] = DELETED;
    assert_untouched(ImageBuilder::new().root(&[dir]), 'S', |e| {
        matches!(e, FATError::RecoverDirectory) && e.is_precondition()
    });
}
