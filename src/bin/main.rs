//! This is the main entry point for the FAT32 recovery tool.
//!
//! The program mounts the FAT32 volume held by an image or a device, possibly
//! through its MBR, and runs one action on it: print its information, list its
//! root directory, print its layout, or recover a deleted file.

use std::{env, fs::File, io, process};

use fat_recovery::FATVol;
use fat_recovery::actions::{self, ActionError};
use fat_recovery::commands::{Command, Config, USAGE};
use fat_recovery::partition::mbr::Mbr;
use fat_recovery::traits::Device;
use log::{debug, error};

/// The size of a sector on the disks holding an MBR.
const SECTOR_SIZE: usize = 512;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(err) => {
            println!("{err}");
            println!("{USAGE}");
            process::exit(1);
        }
    };

    if let Err(err) = stderrlog::new()
        .module(module_path!())
        .quiet(config.quiet)
        .verbosity(config.verbosity)
        .init()
    {
        eprintln!("Logger initialization failed: {err}");
    }

    let writable = matches!(
        config.command,
        Command::Recover(_) | Command::RecoverWithDigest(..) | Command::RecoverLong(_)
    );
    let file = match File::options().read(true).write(writable).open(&config.device) {
        Ok(file) => file,
        Err(err) => {
            error!("Can't open {}: {err}", config.device);
            process::exit(1);
        }
    };

    let mut vol = match mount(file, &config) {
        Ok(vol) => vol,
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let res = match &config.command {
        Command::Info => actions::print_info(&vol, &mut out),
        Command::List => actions::list_root(&mut vol, &mut out),
        Command::Layout => actions::print_layout(&vol, &mut out),
        Command::Recover(name) => actions::recover_short(&mut vol, name, &mut out),
        Command::RecoverWithDigest(name, digest) => {
            actions::recover_short_with_digest(&mut vol, name, digest, &mut out)
        }
        Command::RecoverLong(name) => actions::recover_long(&mut vol, name, &mut out),
    };

    match res {
        Ok(()) => {}
        Err(err) if err.is_fatal() => {
            error!("{err}");
            process::exit(1);
        }
        Err(err @ ActionError::Precondition { .. }) => {
            println!("{err}");
            debug!("{err:?}");
        }
        Err(err) => println!("{err}"),
    }
}

/// Mounts the volume held by the device, or by one of its partitions when
/// the configuration names one.
fn mount<D: Device>(mut device: D, config: &Config) -> Result<FATVol<D>, String> {
    let Some(part_nb) = config.partition else {
        return FATVol::open(device, 0, config.validate).map_err(|e| e.to_string());
    };

    let mbr = Mbr::from(&mut device, SECTOR_SIZE).map_err(|e| format!("Reading the MBR failed: {e}"))?;
    let (start, sectors) = mbr.fat32_volume(part_nb).map_err(|e| e.to_string())?;
    debug!("Partition #{part_nb} starts at byte 0x{start:X}");

    Ok(FATVol::open(device, start, config.validate)
        .map_err(|e| e.to_string())?
        .with_sector_count(sectors))
}
