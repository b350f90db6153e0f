//! Reading and writing file data, on live and deleted files.

mod common;

use std::io::{Cursor, Write};

use common::*;
use fat_recovery::{FATError, FATVol, FileHandler};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn first_entry<D: fat_recovery::traits::Device>(vol: &mut FATVol<D>) -> FileHandler {
    let mut root = vol.root_handler();
    vol.next_entry(&mut root).unwrap().unwrap()
}

/// A live 700-byte file in clusters 3 -> 4.
fn two_cluster_file() -> ImageBuilder {
    ImageBuilder::new()
        .root(&[sfn(b"BIG     BIN", ATTR_ARCHIVE, 3, 700)])
        .chain(&[3, 4])
        .data(3, &pattern(700))
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_read_follows_the_chain() {
    let mut vol = two_cluster_file().mount();
    let mut fh = first_entry(&mut vol);

    assert_eq!(vol.read_to_end(&mut fh).unwrap(), pattern(700));
    assert_eq!(*fh.offset(), 700);

    let mut buf = [0u8; 16];
    assert_eq!(vol.read(&mut fh, &mut buf).unwrap(), 0);
}

#[test]
fn test_read_is_clipped_to_the_file_size() {
    let mut vol = two_cluster_file().mount();
    let mut fh = first_entry(&mut vol);
    fh.set_offset(650);

    let mut buf = [0u8; 100];
    assert_eq!(vol.read(&mut fh, &mut buf).unwrap(), 50);
    assert_eq!(&buf[..50], &pattern(700)[650..]);
}

#[test]
fn test_one_device_access_per_cluster_run() {
    let (dev, seeks) = CountingDevice::new(two_cluster_file().device());
    let mut vol = FATVol::open(dev, 0, false).unwrap();
    let mut fh = first_entry(&mut vol);
    let mut buf = [0u8; 300];

    // Inside one cluster.
    seeks.set(0);
    assert_eq!(vol.read(&mut fh, &mut buf[..100]).unwrap(), 100);
    assert_eq!(seeks.get(), 1);

    // Across the boundary between clusters 3 and 4.
    fh.set_offset(400);
    seeks.set(0);
    assert_eq!(vol.read(&mut fh, &mut buf).unwrap(), 300);
    assert_eq!(seeks.get(), 2);
    assert_eq!(&buf[..], &pattern(700)[400..700]);

    // Ending exactly on the boundary does not touch the next cluster.
    fh.set_offset(412);
    seeks.set(0);
    assert_eq!(vol.read(&mut fh, &mut buf[..100]).unwrap(), 100);
    assert_eq!(seeks.get(), 1);
}

#[test]
fn test_reading_a_directory_is_rejected() {
    let mut vol = ImageBuilder::new()
        .root(&[sfn(b"SUB        ", ATTR_DIRECTORY, 3, 0)])
        .fat(3, EOF)
        .mount();
    let mut dir = first_entry(&mut vol);
    let mut buf = [0u8; 4];
    assert!(matches!(vol.read(&mut dir, &mut buf), Err(FATError::NotAFile)));
}

// ============================================================================
// Deleted files
// ============================================================================

#[test]
fn test_read_deleted_single_cluster_file() {
    let mut vol = ImageBuilder::new()
        .root(&[deleted_sfn(b"HELLO   TXT", 5, 12)])
        .data(5, b"hello world!")
        .mount();
    let mut fh = first_entry(&mut vol);
    assert_eq!(vol.read_to_end(&mut fh).unwrap(), b"hello world!");
}

#[test]
fn test_read_deleted_multi_cluster_file_fails() {
    let mut vol = ImageBuilder::new()
        .root(&[deleted_sfn(b"BIG     BIN", 5, 600)])
        .mount();
    let mut fh = first_entry(&mut vol);
    let err = vol.read_to_end(&mut fh).unwrap_err();
    assert!(matches!(err, FATError::BrokenFATChain));
    assert!(err.is_unrecoverable_file());
}

#[test]
fn test_read_deleted_file_in_reused_cluster_fails() {
    let mut vol = ImageBuilder::new()
        .root(&[deleted_sfn(b"OLD     TXT", 5, 12)])
        .fat(5, EOF)
        .mount();
    let mut fh = first_entry(&mut vol);
    let mut buf = [0u8; 12];
    assert!(matches!(
        vol.read(&mut fh, &mut buf),
        Err(FATError::ClusterOccupied)
    ));
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn test_write_across_clusters_and_read_back() {
    let mut vol = two_cluster_file().mount();
    let mut fh = first_entry(&mut vol);
    let data = vec![0xAB; 200];

    fh.set_offset(450);
    assert_eq!(vol.write(&mut fh, &data).unwrap(), 200);
    assert_eq!(*fh.offset(), 650);

    let img = vol.into_inner().into_inner();
    assert_eq!(&img[cluster_offset(3) + 450..cluster_offset(3) + 512], &data[..62]);
    assert_eq!(&img[cluster_offset(4)..cluster_offset(4) + 138], &data[62..]);
    // Untouched bytes around the write.
    assert_eq!(img[cluster_offset(3) + 449], pattern(700)[449]);
    assert_eq!(img[cluster_offset(4) + 138], pattern(700)[650]);
}

#[test]
fn test_one_device_access_per_cluster_run_on_write() {
    let (dev, seeks) = CountingDevice::new(two_cluster_file().device());
    let mut vol = FATVol::open(dev, 0, false).unwrap();
    let mut fh = first_entry(&mut vol);

    // Inside one cluster.
    seeks.set(0);
    assert_eq!(vol.write(&mut fh, &[0x11; 100]).unwrap(), 100);
    assert_eq!(seeks.get(), 1);

    // Across the boundary between clusters 3 and 4.
    fh.set_offset(400);
    seeks.set(0);
    assert_eq!(vol.write(&mut fh, &[0x22; 300]).unwrap(), 300);
    assert_eq!(seeks.get(), 2);

    let mut expected = vec![0x11; 100];
    expected.extend_from_slice(&pattern(700)[100..400]);
    expected.extend_from_slice(&[0x22; 300]);
    fh.set_offset(0);
    assert_eq!(vol.read_to_end(&mut fh).unwrap(), expected);
}

#[test]
fn test_write_never_grows_the_file() {
    let mut vol = two_cluster_file().mount();
    let mut fh = first_entry(&mut vol);

    fh.set_offset(690);
    assert_eq!(vol.write(&mut fh, &[1u8; 50]).unwrap(), 10);
    assert_eq!(vol.write(&mut fh, &[1u8; 50]).unwrap(), 0);
    assert_eq!(vol.write(&mut fh, &[]).unwrap(), 0);
}

#[test]
fn test_write_to_deleted_file_is_rejected() {
    let mut vol = ImageBuilder::new()
        .root(&[deleted_sfn(b"HELLO   TXT", 5, 12)])
        .mount();
    let mut fh = first_entry(&mut vol);
    let err = vol.write(&mut fh, b"x").unwrap_err();
    assert!(matches!(err, FATError::WriteToDeleted));
    assert!(err.is_precondition());
}

// ============================================================================
// Real files
// ============================================================================

#[test]
fn test_mount_image_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&two_cluster_file().build()).unwrap();
    file.flush().unwrap();

    let device = std::fs::File::options()
        .read(true)
        .write(true)
        .open(file.path())
        .unwrap();
    let mut vol = FATVol::open(device, 0, false).unwrap();
    assert_eq!(vol.total_clusters(), TOTAL_CLUSTERS);

    let mut fh = first_entry(&mut vol);
    assert_eq!(fh.short_name(), "BIG.BIN");
    assert_eq!(vol.read_to_end(&mut fh).unwrap(), pattern(700));
}

#[test]
fn test_truncated_image_reports_unexpected_eof() {
    let mut img = two_cluster_file().build();
    img.truncate(cluster_offset(3) + 100);
    let mut vol = FATVol::open(Cursor::new(img), 0, false).unwrap();
    let mut fh = first_entry(&mut vol);

    match vol.read_to_end(&mut fh) {
        Err(FATError::IOError { context, .. }) => assert!(context.contains("unexpected EOF")),
        other => panic!("unexpected result: {other:?}"),
    }
}
