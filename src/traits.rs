//! Declaration of traits reused across the code.

use std::io::{Read, Seek, Write};

/// A raw block device or image file the volume lives on.
///
/// Implemented for anything that can be read, written and seeked, so that a
/// `std::fs::File` and an in-memory `std::io::Cursor<Vec<u8>>` are interchangeable.
pub trait Device: Read + Write + Seek {}

impl<T: Read + Write + Seek> Device for T {}

/// Implementation of the LayoutDisplay trait.
/// It is used to display the layout of a given structure such as a disk or partition.
pub trait LayoutDisplay {
    fn display_layout(&self, indent: u8) -> Result<String, std::fmt::Error>;
}
