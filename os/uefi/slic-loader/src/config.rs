//! Compile-time configuration of the loader.

use acpi_tables::{InsertMode, PatchOptions};
use log::LevelFilter;
use uefi::{CStr16, cstr16};

/// The SLIC image to install, on the volume the loader was started from.
pub const PAYLOAD_PATH: &CStr16 = cstr16!("\\EFI\\SLIC\\slic.bin");

/// The boot manager started once patching is done.
#[cfg(feature = "chainload")]
pub const NEXT_STAGE_PATH: &CStr16 = cstr16!("\\EFI\\Microsoft\\Boot\\bootmgfw.efi");

pub const fn log_level() -> LevelFilter {
    if cfg!(feature = "verbose") {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    }
}

pub fn patch_options() -> PatchOptions {
    PatchOptions {
        insert: if cfg!(feature = "register") {
            InsertMode::Register
        } else {
            InsertMode::GrowTables
        },
        strict_checksums: cfg!(feature = "strict"),
        ..PatchOptions::default()
    }
}
