//! # SLIC Loader
//!
//! A UEFI application that runs before the operating system boot manager,
//! installs a SLIC (Software Licensing Information Table) into the ACPI
//! tables the firmware publishes, and then chain-loads the boot manager.
//!
//! ```text
//! UEFI Firmware Boot
//!         ↓
//! ┌─────────────────────────────────────────────┐
//! │              SLIC Loader                    │
//! ├─────────────────────────────────────────────┤
//! │  1. Environment Setup                       │
//! │     • Initialize logging and allocator      │
//! │  2. Payload                                 │
//! │     • Read \EFI\SLIC\slic.bin               │
//! │  3. ACPI Patching                           │
//! │     • Locate the RSDP                       │
//! │     • Discover RSDT/XSDT tables             │
//! │     • Replace or insert the SLIC            │
//! │  4. Handoff                                 │
//! │     • Start \EFI\Microsoft\Boot\bootmgfw.efi │
//! └─────────────────────────────────────────────┘
//!         ↓
//! OS Boot Manager
//! ```
//!
//! Patching is best effort: a missing payload or a failed patch is logged
//! and the boot continues with the firmware's tables untouched.
//!
//! ## Features
//!
//! * `chainload` (default): start the next stage after patching.
//! * `register`: hand a new table to `EFI_ACPI_TABLE_PROTOCOL` instead of
//!   growing the RSDT/XSDT when no SLIC is present yet.
//! * `strict`: refuse to patch when a firmware checksum is invalid.
//! * `verbose`: log at trace level.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![no_main]
extern crate alloc;

mod acpi_protocol;
#[cfg(feature = "chainload")]
mod chainload;
mod config;
mod file_system;
mod firmware;
mod logger;
mod rsdp;

use crate::file_system::load_file;
use crate::firmware::UefiFirmware;
use crate::logger::UefiLogger;
use crate::rsdp::find_rsdp_addr;
use log::{error, info, warn};
use uefi::prelude::*;

#[entry]
fn efi_main() -> Status {
    // Initialize logging and allocator helpers
    if uefi::helpers::init().is_err() {
        return Status::UNSUPPORTED;
    }
    if UefiLogger::new(config::log_level()).init().is_err() {
        return Status::ALREADY_STARTED;
    }

    info!("SLIC loader starting");
    let status = install_slic();

    #[cfg(feature = "chainload")]
    let status = {
        if status.is_error() {
            warn!("Continuing boot without SLIC ({status})");
        }
        chainload::chainload(config::NEXT_STAGE_PATH)
    };

    status
}

/// Load the payload and patch it into the firmware's ACPI tables.
fn install_slic() -> Status {
    let payload = match load_file(config::PAYLOAD_PATH) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("No SLIC payload at {}: {e}", config::PAYLOAD_PATH);
            return e.into();
        }
    };
    info!("Loaded {} byte SLIC payload", payload.len());

    let mut firmware = UefiFirmware::new(find_rsdp_addr());
    match acpi_tables::patch_tables(&mut firmware, &payload, &config::patch_options()) {
        Ok(report) => {
            info!(
                "SLIC active at {:#x}, replacing {:x?}",
                report.table_address, report.replaced
            );
            Status::SUCCESS
        }
        Err(e) => {
            error!("Leaving ACPI tables unpatched: {e}");
            e.into()
        }
    }
}
