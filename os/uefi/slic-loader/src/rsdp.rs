//! # Root System Description Pointer lookup

use uefi::prelude::*;
use uefi::table::cfg::{ACPI_GUID, ACPI2_GUID};

/// Physical address of the RSDP published in the configuration table, if any.
///
/// The ACPI 2.0 entry is preferred; the ACPI 1.0 entry is the fallback.
pub fn find_rsdp_addr() -> Option<u64> {
    system::with_config_table(|table| {
        let find = |guid| {
            table
                .iter()
                .find(|entry| entry.guid == guid)
                .map(|entry| entry.address as usize as u64)
        };
        find(ACPI2_GUID).or_else(|| find(ACPI_GUID))
    })
}
