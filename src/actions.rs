//! The actions run by the CLI on a mounted volume.
//!
//! All actions work on the root directory. Their results are written to `out`;
//! failures to recover a file are returned as `ActionError`.

use std::io::{self, Write};

use log::{debug, info};
use md5::{Digest, Md5};
use thiserror::Error;

use crate::filesystem::fat::FATVol;
use crate::filesystem::fat_error::FATError;
use crate::filesystem::file_handler::FileHandler;
use crate::traits::{Device, LayoutDisplay};

/// Errors reported by the actions.
///
/// Every variant but `Fatal` and `Output` is a clean failure, printed to the
/// user as `<name>: error - <reason>`.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{0}: error - file not found")]
    FileNotFound(String),
    #[error("{0}: error - fail to recover")]
    FailToRecover(String),
    #[error("{0}: error - ambiguous")]
    Ambiguous(String),
    #[error("{name}: error - {source}")]
    Precondition {
        name: String,
        #[source]
        source: FATError,
    },
    /// The volume can no longer be trusted, usually because of an I/O failure.
    #[error(transparent)]
    Fatal(#[from] FATError),
    #[error("Writing the output failed: {0}")]
    Output(#[from] io::Error),
}

impl ActionError {
    /// Returns `true` when the run must abort.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::Fatal(_) | ActionError::Output(_))
    }

    /// Sorts an error raised while recovering `name`.
    fn classify(name: &str, err: FATError) -> Self {
        if err.is_unrecoverable_file() {
            ActionError::FailToRecover(name.to_string())
        } else if err.is_precondition() {
            ActionError::Precondition {
                name: name.to_string(),
                source: err,
            }
        } else {
            ActionError::Fatal(err)
        }
    }
}

/// Collects every entry of the root directory.
fn root_entries<D: Device>(vol: &mut FATVol<D>) -> Result<Vec<FileHandler>, FATError> {
    let mut root = vol.root_handler();
    let entries = vol.entries(&mut root).collect();
    entries
}

/// Prints the boot sector information and the cluster usage.
pub fn print_info<D: Device>(vol: &FATVol<D>, out: &mut impl Write) -> Result<(), ActionError> {
    writeln!(out, "Number of FATs = {}", vol.num_fats())?;
    writeln!(out, "Number of bytes per sector = {}", vol.bytes_per_sector())?;
    writeln!(out, "Number of sectors per cluster = {}", vol.sectors_per_cluster())?;
    writeln!(out, "Number of reserved sectors = {}", vol.reserved_sectors())?;
    writeln!(out, "Number of allocated clusters = {}", vol.allocated_clusters())?;
    writeln!(out, "Number of free clusters = {}", vol.free_clusters())?;
    Ok(())
}

/// Reverse video, used to set deleted entries apart in listings.
pub const HIGHLIGHT_ON: &str = "\x1b[7m";
pub const HIGHLIGHT_OFF: &str = "\x1b[0m";

/// Lists the entries of the root directory.
///
/// Live entries are numbered from 1. Deleted entries are highlighted and
/// carry the number of the last live entry.
pub fn list_root<D: Device>(vol: &mut FATVol<D>, out: &mut impl Write) -> Result<(), ActionError> {
    let mut index = 0;
    for fh in root_entries(vol)? {
        if fh.is_deleted() {
            writeln!(out, "{HIGHLIGHT_ON}{index}, {fh}{HIGHLIGHT_OFF}")?;
            continue;
        }
        index += 1;
        writeln!(out, "{index}, {fh}")?;
    }
    Ok(())
}

/// Prints the layout of the volume.
pub fn print_layout<D: Device>(vol: &FATVol<D>, out: &mut impl Write) -> Result<(), ActionError> {
    let layout = vol
        .display_layout(3)
        .map_err(|e| io::Error::other(e.to_string()))?;
    write!(out, "{layout}")?;
    Ok(())
}

/// Deleted entries whose short name matches `name` but for its first character,
/// which the deletion overwrote.
fn short_name_candidates<D: Device>(
    vol: &mut FATVol<D>,
    name: &str,
) -> Result<Vec<FileHandler>, FATError> {
    let tail: String = name.chars().skip(1).collect();
    Ok(root_entries(vol)?
        .into_iter()
        .filter(|fh| fh.is_deleted() && !fh.is_dir())
        .filter(|fh| fh.short_name().chars().skip(1).collect::<String>() == tail)
        .collect())
}

/// Recovers the only candidate, or explains why it cannot.
fn recover_unique<D: Device>(
    vol: &mut FATVol<D>,
    name: &str,
    candidates: &[FileHandler],
    restore_long_name: bool,
    out: &mut impl Write,
) -> Result<(), ActionError> {
    let fh = match candidates {
        [] => return Err(ActionError::FileNotFound(name.to_string())),
        [fh] => fh,
        _ => {
            debug!("{name}: {} candidates", candidates.len());
            return Err(ActionError::Ambiguous(name.to_string()));
        }
    };
    let first_char = name.chars().next().unwrap_or_default();

    vol.recover(fh, first_char, restore_long_name)
        .map_err(|e| ActionError::classify(name, e))?;
    writeln!(out, "{name}: recovered")?;
    Ok(())
}

/// Recovers the deleted file whose 8.3 name is `name`.
pub fn recover_short<D: Device>(
    vol: &mut FATVol<D>,
    name: &str,
    out: &mut impl Write,
) -> Result<(), ActionError> {
    if name.is_empty() {
        return Err(ActionError::FileNotFound(name.to_string()));
    }
    let candidates = short_name_candidates(vol, name)?;
    recover_unique(vol, name, &candidates, false, out)
}

/// Recovers the deleted file whose 8.3 name is `name` and whose content has
/// the MD5 digest `md5` (hexadecimal).
///
/// Candidates spanning several clusters are skipped.
pub fn recover_short_with_digest<D: Device>(
    vol: &mut FATVol<D>,
    name: &str,
    md5: &str,
    out: &mut impl Write,
) -> Result<(), ActionError> {
    if name.is_empty() {
        return Err(ActionError::FileNotFound(name.to_string()));
    }
    let expected = md5.to_ascii_lowercase();

    for mut fh in short_name_candidates(vol, name)? {
        let data = match vol.read_to_end(&mut fh) {
            Ok(data) => data,
            Err(FATError::BrokenFATChain) => {
                debug!("{name}: skipping candidate at offset {}", fh.dir_offset());
                continue;
            }
            Err(e) => return Err(ActionError::classify(name, e)),
        };

        let digest = format!("{:x}", Md5::digest(&data));
        debug!("{name}: candidate at offset {} hashes to {digest}", fh.dir_offset());
        if digest != expected {
            continue;
        }

        let first_char = name.chars().next().unwrap_or_default();
        vol.recover(&fh, first_char, false)
            .map_err(|e| ActionError::classify(name, e))?;
        info!("{name}: content matched {digest}");
        writeln!(out, "{name}: recovered with MD5")?;
        return Ok(());
    }

    Err(ActionError::FileNotFound(name.to_string()))
}

/// Recovers the deleted file whose long name is `name`, together with its long name.
pub fn recover_long<D: Device>(
    vol: &mut FATVol<D>,
    name: &str,
    out: &mut impl Write,
) -> Result<(), ActionError> {
    if name.is_empty() {
        return Err(ActionError::FileNotFound(name.to_string()));
    }
    let candidates: Vec<FileHandler> = root_entries(vol)?
        .into_iter()
        .filter(|fh| fh.is_deleted() && !fh.is_dir() && fh.long_name() == name)
        .collect();
    recover_unique(vol, name, &candidates, true, out)
}
