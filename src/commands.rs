//! This module defines the `Command` enum and the `Config` it is carried in,
//! parsed from the process arguments.
//!
//! ```text
//! fat_recovery -d <device> [-p <partition>] [-s] [-v]... [-q] <action>
//! ```

use thiserror::Error;

/// Usage text printed when the arguments cannot be parsed.
pub const USAGE: &str = "\
Usage: fat_recovery -d [device filename] [other arguments]
-i                    Print boot sector information
-l                    List all the directory entries
-L                    Print the volume layout
-r filename [-m md5]  File recovery with 8.3 filename
-R filename           File recovery with long filename
-p number             Use partition <number> of the disk's MBR
-s                    Skip the boot sector validation
-v                    Increase log verbosity (repeatable)
-q                    Silence logging";

/// Represents the action requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print boot sector information.
    Info,
    /// List the root directory.
    List,
    /// Print the volume layout.
    Layout,
    /// Recover a deleted file by its 8.3 name.
    Recover(String),
    /// Recover a deleted file by its 8.3 name, picking the candidate whose content
    /// has the given MD5 digest.
    RecoverWithDigest(String, String),
    /// Recover a deleted file by its long name.
    RecoverLong(String),
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path to the device or image file.
    pub device: String,
    /// Partition of the MBR holding the volume, 1-based. `None` when the device is the volume.
    pub partition: Option<u8>,
    /// Enable the validation of the boot sector.
    pub validate: bool,
    /// Log verbosity, as understood by stderrlog.
    pub verbosity: usize,
    /// Silence logging.
    pub quiet: bool,
    pub command: Command,
}

/// Errors raised while parsing the arguments.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArgError {
    #[error("Invalid Argument: around {0}")]
    Misplaced(String),
    #[error("Invalid Argument: {0} expects a value")]
    MissingValue(String),
    #[error("Invalid Argument: -p expects a partition number, got `{0}`")]
    InvalidPartition(String),
    #[error("Invalid Argument: Invalid option: {0}")]
    UnknownOption(String),
    #[error("Invalid Argument: Device or action not specified")]
    Incomplete,
}

impl Config {
    /// Parses the arguments following the program name.
    ///
    /// # Errors
    /// - `ArgError` if an option is unknown, repeated, lacks its value, or
    ///   conflicts with the selected action, or if the device or action is missing
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ArgError> {
        let mut device: Option<String> = None;
        let mut partition: Option<u8> = None;
        let mut validate = true;
        let mut verbosity = 1;
        let mut quiet = false;
        let mut action: Option<Command> = None;
        let mut digest: Option<String> = None;

        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .map(str::to_string)
                    .ok_or_else(|| ArgError::MissingValue(arg.to_string()))
            };

            match arg {
                "-d" if device.is_none() => device = Some(value()?),
                "-p" if partition.is_none() => {
                    let raw = value()?;
                    partition = Some(raw.parse().map_err(|_| ArgError::InvalidPartition(raw))?);
                }
                "-s" => validate = false,
                "-v" => verbosity += 1,
                "-q" => quiet = true,
                "-i" if action.is_none() && digest.is_none() => action = Some(Command::Info),
                "-l" if action.is_none() && digest.is_none() => action = Some(Command::List),
                "-L" if action.is_none() && digest.is_none() => action = Some(Command::Layout),
                "-r" if action.is_none() => action = Some(Command::Recover(value()?)),
                "-R" if action.is_none() && digest.is_none() => {
                    action = Some(Command::RecoverLong(value()?))
                }
                "-m" if digest.is_none()
                    && matches!(action, None | Some(Command::Recover(_))) =>
                {
                    digest = Some(value()?)
                }
                "-d" | "-p" | "-i" | "-l" | "-L" | "-r" | "-R" | "-m" => {
                    return Err(ArgError::Misplaced(arg.to_string()));
                }
                other => return Err(ArgError::UnknownOption(other.to_string())),
            }
        }

        let command = match (action, digest) {
            (Some(Command::Recover(name)), Some(digest)) => Command::RecoverWithDigest(name, digest),
            (Some(command), None) => command,
            (None, Some(_)) => return Err(ArgError::Misplaced("-m".to_string())),
            _ => return Err(ArgError::Incomplete),
        };

        Ok(Config {
            device: device.ok_or(ArgError::Incomplete)?,
            partition,
            validate,
            verbosity,
            quiet,
            command,
        })
    }
}
