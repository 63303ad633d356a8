//! # `EFI_ACPI_TABLE_PROTOCOL`
//!
//! Firmware service that copies a table into ACPI memory and links it into
//! the RSDT and XSDT, fixing up every checksum on the way.

use core::ffi::c_void;
use uefi::proto::unsafe_protocol;
use uefi::{Status, StatusExt, boot};

#[repr(C)]
#[unsafe_protocol("ffe06bdd-6107-46a6-7bb2-5a9c7ec5275c")]
pub struct AcpiTableProtocol {
    install_acpi_table: unsafe extern "efiapi" fn(
        this: *const Self,
        table: *const c_void,
        table_size: usize,
        table_key: *mut usize,
    ) -> Status,
    #[allow(dead_code)]
    uninstall_acpi_table: unsafe extern "efiapi" fn(this: *const Self, table_key: usize) -> Status,
}

impl AcpiTableProtocol {
    /// Hand `table` to the firmware, returning the key it was installed under.
    ///
    /// # Errors
    /// The status the firmware reports, e.g. `OUT_OF_RESOURCES`.
    pub fn install(&self, table: &[u8]) -> uefi::Result<usize> {
        let mut key = 0usize;
        // SAFETY: `table` is valid for `table.len()` bytes for the duration of
        // the call; the firmware copies it.
        let status = unsafe {
            (self.install_acpi_table)(
                core::ptr::from_ref(self),
                table.as_ptr().cast(),
                table.len(),
                &raw mut key,
            )
        };
        status.to_result_with_val(|| key)
    }
}

/// Install `table` through the first handle exposing the protocol.
///
/// # Errors
/// `NOT_FOUND` if the firmware lacks the protocol, or the install status.
pub fn install_table(table: &[u8]) -> uefi::Result<usize> {
    let handle = boot::get_handle_for_protocol::<AcpiTableProtocol>()?;
    let protocol = boot::open_protocol_exclusive::<AcpiTableProtocol>(handle)?;
    protocol.install(table)
}
