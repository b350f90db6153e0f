use std::io::{self, Read, Seek, SeekFrom, Write};

/// Reads exactly `buf.len()` bytes from `device` starting at byte `offset`.
///
/// This is the positional read every on-disk structure goes through. Partial
/// reads are retried by [`Read::read_exact`] until the buffer is full.
///
/// # Errors
///
/// - `io::ErrorKind::UnexpectedEof` if the device runs out of data before the
///   buffer is filled (end-of-data).
/// - Any other `io::Error` reported by the device.
pub fn read_exact_at<T: Read + Seek>(device: &mut T, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    log::trace!("pread {} bytes at 0x{offset:X}", buf.len());
    device.seek(SeekFrom::Start(offset))?;
    device.read_exact(buf)
}

/// Writes all of `data` to `device` starting at byte `offset`.
///
/// # Arguments
///
/// - `device`: A mutable reference to the device to write to.
/// - `offset`: The offset in bytes where the data will be written.
/// - `data`: The bytes to write.
pub fn write_all_at<T: Write + Seek>(device: &mut T, offset: u64, data: &[u8]) -> io::Result<()> {
    log::trace!("pwrite {} bytes at 0x{offset:X}", data.len());
    device.seek(SeekFrom::Start(offset))?;
    device.write_all(data)
}

/// Reads a specific sector from a device into a buffer.
///
/// # Arguments
///
/// - `device`: A mutable reference to the device to read from.
/// - `sector`: The sector number to read.
/// - `sector_size`: The size in bytes of a sector.
/// - `buffer`: A mutable reference to a vector where the sector data will be stored.
///
/// The buffer will be resized to match the sector size.
///
/// # Errors
///
/// Returns an `io::Error` if the sector cannot be read.
pub fn read_sector<T: Read + Seek>(
    device: &mut T,
    sector: u64,
    sector_size: usize,
    buffer: &mut Vec<u8>,
) -> io::Result<()> {
    buffer.resize(sector_size, 0);

    read_exact_at(device, sector_size as u64 * sector, buffer).map_err(|err| {
        io::Error::new(err.kind(), format!("Failed to read sector {sector}: {err}"))
    })
}

/// Extracts a 32-bit little-endian unsigned integer from a buffer at a given offset.
///
/// # Panics
///
/// Panics if the slice does not contain enough bytes starting from the offset.
pub fn u32_at(buffer: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(
        buffer[offset..offset + 4]
            .try_into()
            .expect("invalid slice"),
    )
}

/// Extracts a 16-bit little-endian unsigned integer from a buffer at a given offset.
///
/// # Panics
///
/// Panics if the slice does not contain enough bytes starting from the offset.
pub fn u16_at(buffer: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(
        buffer[offset..offset + 2]
            .try_into()
            .expect("invalid slice"),
    )
}
